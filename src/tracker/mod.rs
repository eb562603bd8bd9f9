//! Delivery Tracker.
//!
//! Stamps documents as notified through a point update on the store, and
//! keeps an in-process audit of documents still in flight or failed
//! permanently. A record is dropped once its document is notified, since the
//! row then carries the outcome. The audit is advisory and lost on restart.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::document::{DocumentId, DocumentStore, StoreError};
use crate::error::ErrorClass;
use crate::metrics::NotificationMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Enqueued,
    FailedPermanent,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryRecord {
    pub state: DeliveryState,
    pub enqueued_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub last_error_class: Option<ErrorClass>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryRecord {
    fn new(state: DeliveryState) -> Self {
        Self {
            state,
            enqueued_at: None,
            attempts: 0,
            last_error_class: None,
            updated_at: Utc::now(),
        }
    }
}

pub struct DeliveryTracker {
    store: Arc<dyn DocumentStore>,
    records: DashMap<DocumentId, DeliveryRecord>,
}

impl DeliveryTracker {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            records: DashMap::new(),
        }
    }

    pub fn record_enqueued(&self, id: DocumentId) {
        let now = Utc::now();
        let mut record = self
            .records
            .entry(id)
            .or_insert_with(|| DeliveryRecord::new(DeliveryState::Enqueued));
        record.state = DeliveryState::Enqueued;
        record.enqueued_at = Some(now);
        record.updated_at = now;
    }

    /// Stamp `notification_sent=true` and `notification_sent_at=now`.
    ///
    /// Only those two columns are written. Returns true when this call made
    /// the transition; repeated calls are no-ops returning false.
    pub async fn mark_notified(&self, id: DocumentId) -> Result<bool, StoreError> {
        let now = Utc::now();
        let transitioned = self.store.mark_notified(id, now).await?;

        if transitioned {
            NotificationMetrics::record_sent();
            self.records.remove(&id);
            tracing::debug!(document_id = id, "Document stamped as notified");
        } else {
            tracing::debug!(document_id = id, "Document already notified, stamp skipped");
        }

        Ok(transitioned)
    }

    /// Record a permanent failure. The document row is left untouched.
    pub fn record_dead_letter(&self, id: DocumentId, attempts: u32, class: ErrorClass) {
        let mut record = self
            .records
            .entry(id)
            .or_insert_with(|| DeliveryRecord::new(DeliveryState::FailedPermanent));
        record.state = DeliveryState::FailedPermanent;
        record.attempts = attempts;
        record.last_error_class = Some(class);
        record.updated_at = Utc::now();
    }

    /// Audit record of a document not yet notified; `None` once it is.
    pub fn state(&self, id: DocumentId) -> Option<DeliveryRecord> {
        self.records.get(&id).map(|r| r.value().clone())
    }

    /// Documents currently tracked (in flight or failed).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Documents whose notification failed permanently, oldest first.
    pub fn failed(&self) -> Vec<DocumentId> {
        let mut failed: Vec<(DateTime<Utc>, DocumentId)> = self
            .records
            .iter()
            .filter(|r| r.state == DeliveryState::FailedPermanent)
            .map(|r| (r.updated_at, *r.key()))
            .collect();
        failed.sort();
        failed.into_iter().map(|(_, id)| id).collect()
    }
}
