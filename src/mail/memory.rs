//! In-memory transport for tests.
//!
//! Records every accepted message and supports failure injection:
//! `fail_next` makes calls error like a network fault, `reject_next` makes
//! the provider answer with a refusal.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::transport::{MailError, MailTransport, OutgoingEmail};

#[derive(Default)]
pub struct MemoryTransport {
    sent: Mutex<Vec<OutgoingEmail>>,
    calls: Mutex<Vec<Instant>>,
    send_count: AtomicUsize,
    fail_remaining: AtomicU32,
    fail_message: Mutex<String>,
    reject_remaining: AtomicU32,
    latency: Option<Duration>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every delivery by `latency` (tokio time).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the next `count` calls fail with a transport error.
    pub fn fail_next(&self, count: u32, message: impl Into<String>) {
        if let Ok(mut guard) = self.fail_message.lock() {
            *guard = message.into();
        }
        self.fail_remaining.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` calls return "not accepted".
    pub fn reject_next(&self, count: u32) {
        self.reject_remaining.store(count, Ordering::SeqCst);
    }

    /// Number of `deliver` calls, successful or not.
    pub fn send_count(&self) -> usize {
        self.send_count.load(Ordering::SeqCst)
    }

    /// Messages the transport accepted.
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Instants at which `deliver` was entered.
    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl MailTransport for MemoryTransport {
    async fn deliver(&self, email: &OutgoingEmail) -> Result<bool, MailError> {
        self.send_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(Instant::now());
        }

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if Self::take(&self.fail_remaining) {
            let message = self
                .fail_message
                .lock()
                .map(|m| m.clone())
                .unwrap_or_default();
            return Err(MailError::Transport(message));
        }

        if Self::take(&self.reject_remaining) {
            return Ok(false);
        }

        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
