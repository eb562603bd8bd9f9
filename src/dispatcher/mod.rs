//! Event Dispatcher.
//!
//! Translates a durable document insert into exactly one enqueued
//! `send_document_notification` task. Called by the write path after the
//! insert has committed; never fails the caller.

use std::sync::Arc;

use crate::document::{Client, ClientDocument, DocumentEvent};
use crate::metrics::NotificationMetrics;
use crate::queue::{TaskId, TaskQueue};
use crate::tasks::{document_notification_args, SEND_DOCUMENT_NOTIFICATION};
use crate::tracker::DeliveryTracker;

/// What the dispatcher did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Event came from an update, not an insert
    SkippedUpdate,
    /// Snapshot already carries `notification_sent=true`
    AlreadyNotified,
    /// Recipient has no e-mail address; left for manual re-dispatch
    MissingEmail,
    Enqueued(TaskId),
    /// The queue refused the task; the document row is unaffected
    EnqueueFailed,
}

impl DispatchOutcome {
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            DispatchOutcome::Enqueued(id) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct EventDispatcher {
    queue: Arc<dyn TaskQueue>,
    tracker: Arc<DeliveryTracker>,
}

impl EventDispatcher {
    pub fn new(queue: Arc<dyn TaskQueue>, tracker: Arc<DeliveryTracker>) -> Self {
        Self { queue, tracker }
    }

    /// Handle a post-save event of a client document.
    pub async fn on_document_saved(&self, event: &DocumentEvent) -> DispatchOutcome {
        let document_id = event.document_id();

        if !event.created {
            tracing::debug!(document_id, "Document updated, notification not dispatched");
            NotificationMetrics::record_skipped("update");
            return DispatchOutcome::SkippedUpdate;
        }

        if event.document.notification_sent {
            tracing::info!(document_id, "Document already notified, ignoring");
            NotificationMetrics::record_skipped("already_notified");
            return DispatchOutcome::AlreadyNotified;
        }

        if !event.recipient.has_email() {
            tracing::warn!(
                document_id,
                client_id = event.recipient.id,
                username = %event.recipient.username,
                "Client has no e-mail address; document notification not dispatched"
            );
            NotificationMetrics::record_skipped("missing_email");
            return DispatchOutcome::MissingEmail;
        }

        match self
            .queue
            .enqueue(
                SEND_DOCUMENT_NOTIFICATION,
                document_notification_args(document_id),
            )
            .await
        {
            Ok(task_id) => {
                self.tracker.record_enqueued(document_id);
                tracing::info!(
                    document_id,
                    task_id = %task_id,
                    to = %event.recipient.email,
                    "Document notification enqueued"
                );
                DispatchOutcome::Enqueued(task_id)
            }
            Err(e) => {
                tracing::error!(
                    document_id,
                    error = %e,
                    "Failed to enqueue document notification"
                );
                DispatchOutcome::EnqueueFailed
            }
        }
    }

    /// Narrow entry point for write paths that only ever insert.
    pub async fn on_document_created(
        &self,
        document: ClientDocument,
        recipient: Client,
    ) -> DispatchOutcome {
        self.on_document_saved(&DocumentEvent::created(document, recipient))
            .await
    }
}
