//! In-memory task queue.
//!
//! Eligibility is tracked with `tokio::time` instants so paused-clock tests
//! can fast-forward through backoff delays. Not durable across restarts.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use super::backend::{
    DeadLetter, QueueError, QueueStats, QueuedTask, TaskId, TaskQueue, DEAD_LETTER_LIMIT,
};
use crate::error::ErrorClass;
use crate::metrics::TaskMetrics;

struct Entry {
    task: QueuedTask,
    eligible_at: Instant,
    seq: u64,
    running: bool,
}

/// Recent enqueues kept for `enqueue_count`.
pub const ENQUEUE_HISTORY_LIMIT: usize = 1024;

#[derive(Default)]
struct State {
    tasks: HashMap<TaskId, Entry>,
    /// Oldest at the front; trimmed to `DEAD_LETTER_LIMIT`
    dead: VecDeque<DeadLetter>,
    recent: VecDeque<(String, serde_json::Value)>,
    enqueued: usize,
    next_seq: u64,
    completed: u64,
}

pub struct MemoryTaskQueue {
    state: Mutex<State>,
    notify: Arc<Notify>,
}

impl MemoryTaskQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            notify: Arc::new(Notify::new()),
        }
    }

    /// How many of the last `ENQUEUE_HISTORY_LIMIT` enqueues were `task_name`
    /// with exactly `args`.
    pub async fn enqueue_count(&self, task_name: &str, args: &serde_json::Value) -> usize {
        let state = self.state.lock().await;
        state
            .recent
            .iter()
            .filter(|(name, a)| name == task_name && a == args)
            .count()
    }

    /// Total enqueues across all tasks.
    pub async fn total_enqueued(&self) -> usize {
        self.state.lock().await.enqueued
    }

    /// Enqueues currently held for `enqueue_count`.
    pub async fn history_len(&self) -> usize {
        self.state.lock().await.recent.len()
    }

    /// True when no task is pending or running.
    pub async fn is_idle(&self) -> bool {
        self.state.lock().await.tasks.is_empty()
    }
}

impl Default for MemoryTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskQueue for MemoryTaskQueue {
    async fn enqueue(
        &self,
        task_name: &str,
        args: serde_json::Value,
    ) -> Result<TaskId, QueueError> {
        let id = TaskId::new();
        let now = Utc::now();

        {
            let mut state = self.state.lock().await;
            let seq = state.next_seq;
            state.next_seq += 1;
            state.enqueued += 1;
            if state.recent.len() == ENQUEUE_HISTORY_LIMIT {
                state.recent.pop_front();
            }
            state.recent.push_back((task_name.to_string(), args.clone()));
            state.tasks.insert(
                id,
                Entry {
                    task: QueuedTask {
                        id,
                        task_name: task_name.to_string(),
                        args,
                        enqueued_at: now,
                        attempts: 0,
                        next_eligible_at: now,
                        last_error: None,
                    },
                    eligible_at: Instant::now(),
                    seq,
                    running: false,
                },
            );
        }

        TaskMetrics::record_enqueued(task_name);
        self.notify.notify_waiters();

        tracing::trace!(task_id = %id, task = %task_name, "Task enqueued in memory");
        Ok(id)
    }

    async fn reserve(&self) -> Result<QueuedTask, QueueError> {
        loop {
            // Register interest before inspecting state so a concurrent
            // enqueue between the check and the wait is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next_wake = {
                let mut state = self.state.lock().await;
                let now = Instant::now();

                let candidate = state
                    .tasks
                    .values()
                    .filter(|e| !e.running && e.eligible_at <= now)
                    .min_by_key(|e| (e.eligible_at, e.seq))
                    .map(|e| e.task.id);

                if let Some(id) = candidate {
                    if let Some(entry) = state.tasks.get_mut(&id) {
                        entry.running = true;
                        entry.task.attempts += 1;
                        return Ok(entry.task.clone());
                    }
                }

                state
                    .tasks
                    .values()
                    .filter(|e| !e.running)
                    .map(|e| e.eligible_at)
                    .min()
            };

            match next_wake {
                Some(at) => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = tokio::time::sleep_until(at) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    async fn complete(&self, id: TaskId) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        match state.tasks.get(&id) {
            Some(entry) if entry.running => {
                state.tasks.remove(&id);
                state.completed += 1;
                Ok(())
            }
            _ => Err(QueueError::NotReserved(id)),
        }
    }

    async fn schedule_retry(
        &self,
        id: TaskId,
        delay: Duration,
        error: &str,
    ) -> Result<(), QueueError> {
        {
            let mut state = self.state.lock().await;
            let entry = match state.tasks.get_mut(&id) {
                Some(entry) if entry.running => entry,
                _ => return Err(QueueError::NotReserved(id)),
            };

            entry.running = false;
            entry.eligible_at = Instant::now() + delay;
            entry.task.last_error = Some(error.to_string());
            entry.task.next_eligible_at = Utc::now()
                + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        }

        self.notify.notify_waiters();
        Ok(())
    }

    async fn dead_letter(
        &self,
        id: TaskId,
        class: ErrorClass,
        error: &str,
    ) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let entry = match state.tasks.remove(&id) {
            Some(entry) if entry.running => entry,
            Some(entry) => {
                state.tasks.insert(id, entry);
                return Err(QueueError::NotReserved(id));
            }
            None => return Err(QueueError::NotReserved(id)),
        };

        if state.dead.len() == DEAD_LETTER_LIMIT {
            if let Some(oldest) = state.dead.pop_front() {
                tracing::debug!(task_id = %oldest.task_id, "Oldest dead letter evicted");
            }
        }
        state.dead.push_back(DeadLetter {
            task_id: id,
            task_name: entry.task.task_name,
            args: entry.task.args,
            attempts: entry.task.attempts,
            error_class: class.as_str().to_string(),
            last_error: error.to_string(),
            dead_lettered_at: Utc::now(),
        });
        Ok(())
    }

    async fn dead_letters(&self) -> Result<Vec<DeadLetter>, QueueError> {
        let state = self.state.lock().await;
        Ok(state.dead.iter().rev().cloned().collect())
    }

    async fn stats(&self) -> Result<QueueStats, QueueError> {
        let state = self.state.lock().await;
        let running = state.tasks.values().filter(|e| e.running).count();

        Ok(QueueStats {
            backend: self.backend_name().to_string(),
            pending: state.tasks.len() - running,
            running,
            dead_lettered: state.dead.len(),
            completed: state.completed,
        })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
