//! `send_document_notification`: the end-to-end notification send.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::document::{DocumentId, DocumentStore};
use crate::error::PipelineError;
use crate::mail::MailGateway;
use crate::metrics::NotificationMetrics;
use crate::notification::NotificationBuilder;
use crate::queue::{QueuedTask, RetryPolicy};
use crate::tracker::DeliveryTracker;
use crate::worker::{TaskHandler, TaskOutcome};

pub const SEND_DOCUMENT_NOTIFICATION: &str = "send_document_notification";

/// Task payload: the document id and nothing else.
pub fn document_notification_args(id: DocumentId) -> Value {
    json!({ "document_id": id })
}

fn document_id_from(args: &Value) -> Option<DocumentId> {
    args.get("document_id").and_then(Value::as_i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOutcome {
    Sent,
    /// Another attempt already stamped the document
    AlreadyNotified,
    /// Document row is gone; the task is obsolete
    DocumentMissing,
    /// Recipient has no e-mail address at execution time
    RecipientUnaddressable,
}

impl NotificationOutcome {
    fn into_task_outcome(self) -> TaskOutcome {
        match self {
            NotificationOutcome::Sent => TaskOutcome::Completed,
            NotificationOutcome::AlreadyNotified => TaskOutcome::Discarded("already_notified"),
            NotificationOutcome::DocumentMissing => TaskOutcome::Discarded("document_missing"),
            NotificationOutcome::RecipientUnaddressable => {
                TaskOutcome::Discarded("missing_email")
            }
        }
    }
}

pub struct DocumentNotificationTask {
    store: Arc<dyn DocumentStore>,
    builder: NotificationBuilder,
    gateway: MailGateway,
    tracker: Arc<DeliveryTracker>,
    policy: RetryPolicy,
    /// Serialises executions of the same document within this process
    in_flight: DashMap<DocumentId, Arc<Mutex<()>>>,
}

impl DocumentNotificationTask {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        builder: NotificationBuilder,
        gateway: MailGateway,
        tracker: Arc<DeliveryTracker>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            builder,
            gateway,
            tracker,
            policy,
            in_flight: DashMap::new(),
        }
    }

    /// Load, compose, send and stamp one document notification.
    ///
    /// Only the final success path writes to the document row.
    pub async fn execute(&self, id: DocumentId) -> Result<NotificationOutcome, PipelineError> {
        let slot = self
            .in_flight
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = slot.lock().await;
            self.send_once(id).await
        };

        drop(slot);
        self.in_flight
            .remove_if(&id, |_, slot| Arc::strong_count(slot) == 1);

        result
    }

    async fn send_once(&self, id: DocumentId) -> Result<NotificationOutcome, PipelineError> {
        let Some((document, recipient)) = self.store.load_for_notification(id).await? else {
            tracing::info!(document_id = id, "Document not found, notification task obsolete");
            NotificationMetrics::record_skipped("document_missing");
            return Ok(NotificationOutcome::DocumentMissing);
        };

        if document.notification_sent {
            tracing::info!(
                document_id = id,
                "Document already notified, skipping send"
            );
            NotificationMetrics::record_skipped("already_notified");
            return Ok(NotificationOutcome::AlreadyNotified);
        }

        if !recipient.has_email() {
            tracing::warn!(
                document_id = id,
                client_id = recipient.id,
                "Client has no e-mail address, notification not sent"
            );
            NotificationMetrics::record_skipped("missing_email");
            return Ok(NotificationOutcome::RecipientUnaddressable);
        }

        let request = self.builder.build(&document, &recipient);
        let accepted = self
            .gateway
            .send_templated(
                &request.recipient_email,
                &request.subject,
                &request.template,
                &request.context,
            )
            .await?;

        if !accepted {
            return Err(PipelineError::MailRejected);
        }

        if let Err(e) = self.tracker.mark_notified(id).await {
            tracing::error!(
                document_id = id,
                error = %e,
                "Email sent but document could not be stamped as notified"
            );
            return Err(e.into());
        }

        tracing::info!(
            document_id = id,
            to = %request.recipient_email,
            kind = %document.kind,
            "Document notification sent"
        );
        Ok(NotificationOutcome::Sent)
    }
}

#[async_trait]
impl TaskHandler for DocumentNotificationTask {
    fn name(&self) -> &'static str {
        SEND_DOCUMENT_NOTIFICATION
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.policy.clone()
    }

    async fn handle(&self, args: &Value) -> Result<TaskOutcome, PipelineError> {
        let id = document_id_from(args).ok_or_else(|| {
            PipelineError::InvalidPayload(format!("expected {{\"document_id\": int}}, got {}", args))
        })?;

        Ok(self.execute(id).await?.into_task_outcome())
    }

    fn on_exhausted(&self, task: &QueuedTask, error: &PipelineError) {
        let class = error.class();
        match document_id_from(&task.args) {
            Some(id) => {
                tracing::error!(
                    document_id = id,
                    task_id = %task.id,
                    attempts = task.attempts,
                    error_class = %class,
                    error = %error,
                    "Document notification exhausted, document left un-notified"
                );
                self.tracker.record_dead_letter(id, task.attempts, class);
            }
            None => {
                tracing::error!(
                    task_id = %task.id,
                    args = %task.args,
                    error_class = %class,
                    "Document notification exhausted with malformed payload"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MailConfig, PortalConfig};
    use crate::document::{Client, DocumentKind, MemoryDocumentStore, NewDocument};
    use crate::mail::MemoryTransport;
    use crate::template::TemplateRenderer;
    use crate::tracker::DeliveryState;
    use std::time::Duration;

    struct Fixture {
        task: Arc<DocumentNotificationTask>,
        store: Arc<MemoryDocumentStore>,
        transport: Arc<MemoryTransport>,
        tracker: Arc<DeliveryTracker>,
    }

    fn fixture_with(transport: MemoryTransport, sender: &str) -> Fixture {
        let store = Arc::new(MemoryDocumentStore::new());
        store.upsert_client(Client::new(42, "ana", "ana@example.com").with_full_name("Ana Costa"));
        store.upsert_client(Client::new(99, "sem_email", ""));

        let transport = Arc::new(transport);
        let mail = MailConfig {
            sender_address: sender.to_string(),
            ..Default::default()
        };
        let gateway = MailGateway::new(transport.clone(), TemplateRenderer::default(), &mail);
        let tracker = Arc::new(DeliveryTracker::new(store.clone()));
        let task = Arc::new(DocumentNotificationTask::new(
            store.clone(),
            NotificationBuilder::new(PortalConfig::with_base_url("https://portal.example")),
            gateway,
            tracker.clone(),
            RetryPolicy::default(),
        ));

        Fixture {
            task,
            store,
            transport,
            tracker,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MemoryTransport::new(), "noreply@vetorial.example")
    }

    fn new_document(client_id: i64) -> NewDocument {
        NewDocument::new(client_id, DocumentKind::TaxGuide, "DARF dezembro", "darf.pdf")
    }

    #[tokio::test]
    async fn test_sends_and_stamps() {
        let f = fixture();
        let doc = f.store.insert_document(new_document(42)).await.unwrap();

        let outcome = f.task.execute(doc.id).await.unwrap();
        assert_eq!(outcome, NotificationOutcome::Sent);

        let sent = f.transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ana@example.com");
        assert!(sent[0].subject.contains("Guia de Impostos"));

        let stored = f.store.get_document(doc.id).await.unwrap().unwrap();
        assert!(stored.notification_sent);
        assert!(stored.notification_sent_at.is_some());
        assert!(f.tracker.state(doc.id).is_none());
    }

    #[tokio::test]
    async fn test_second_execution_does_not_resend() {
        let f = fixture();
        let doc = f.store.insert_document(new_document(42)).await.unwrap();

        f.task.execute(doc.id).await.unwrap();
        let outcome = f.task.execute(doc.id).await.unwrap();

        assert_eq!(outcome, NotificationOutcome::AlreadyNotified);
        assert_eq!(f.transport.send_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_document_is_obsolete() {
        let f = fixture();
        assert_eq!(
            f.task.execute(404).await.unwrap(),
            NotificationOutcome::DocumentMissing
        );
        assert_eq!(f.transport.send_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_email_never_calls_gateway() {
        let f = fixture();
        let doc = f.store.insert_document(new_document(99)).await.unwrap();

        let outcome = f.task.handle(&document_notification_args(doc.id)).await.unwrap();
        assert_eq!(outcome, TaskOutcome::Discarded("missing_email"));
        assert_eq!(f.transport.send_count(), 0);

        let stored = f.store.get_document(doc.id).await.unwrap().unwrap();
        assert!(!stored.notification_sent);
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_flag_false() {
        let f = fixture();
        f.transport.fail_next(1, "connection reset");
        let doc = f.store.insert_document(new_document(42)).await.unwrap();

        let err = f.task.execute(doc.id).await.unwrap_err();
        assert!(err.is_retryable());

        let stored = f.store.get_document(doc.id).await.unwrap().unwrap();
        assert!(!stored.notification_sent);
    }

    #[tokio::test]
    async fn test_rejection_is_an_error() {
        let f = fixture();
        f.transport.reject_next(1);
        let doc = f.store.insert_document(new_document(42)).await.unwrap();

        let err = f.task.execute(doc.id).await.unwrap_err();
        assert!(matches!(err, PipelineError::MailRejected));
    }

    #[tokio::test]
    async fn test_storage_failure_is_retryable() {
        let f = fixture();
        let doc = f.store.insert_document(new_document(42)).await.unwrap();
        f.store.fail_next_loads(1);

        let err = f.task.execute(doc.id).await.unwrap_err();
        assert_eq!(err.class(), crate::error::ErrorClass::TransientStorage);
        assert_eq!(f.transport.send_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_sender_is_fatal_configuration() {
        let f = fixture_with(MemoryTransport::new(), "");
        let doc = f.store.insert_document(new_document(42)).await.unwrap();

        let err = f.task.execute(doc.id).await.unwrap_err();
        assert_eq!(err.class(), crate::error::ErrorClass::FatalConfiguration);
    }

    #[tokio::test]
    async fn test_invalid_payload() {
        let f = fixture();
        let err = f.task.handle(&json!({"id": 7})).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidPayload(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_executions_send_once() {
        let f = fixture_with(
            MemoryTransport::new().with_latency(Duration::from_millis(200)),
            "noreply@vetorial.example",
        );
        let doc = f.store.insert_document(new_document(42)).await.unwrap();

        let (a, b) = tokio::join!(f.task.execute(doc.id), f.task.execute(doc.id));
        let mut outcomes = vec![a.unwrap(), b.unwrap()];
        outcomes.sort_by_key(|o| *o != NotificationOutcome::Sent);

        assert_eq!(
            outcomes,
            vec![NotificationOutcome::Sent, NotificationOutcome::AlreadyNotified]
        );
        assert_eq!(f.transport.send_count(), 1);
        assert!(f.task.in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_exhaustion_recorded_by_tracker() {
        let f = fixture();
        let task = QueuedTask {
            id: crate::queue::TaskId::new(),
            task_name: SEND_DOCUMENT_NOTIFICATION.to_string(),
            args: document_notification_args(7),
            enqueued_at: chrono::Utc::now(),
            attempts: 3,
            next_eligible_at: chrono::Utc::now(),
            last_error: None,
        };

        f.task.on_exhausted(&task, &PipelineError::MailRejected);

        let record = f.tracker.state(7).unwrap();
        assert_eq!(record.state, DeliveryState::FailedPermanent);
        assert_eq!(record.attempts, 3);
    }
}
