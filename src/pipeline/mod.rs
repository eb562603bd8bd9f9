//! Pipeline wiring.
//!
//! Builds every component from `Settings` and exposes the operator tools:
//! manual re-dispatch of a single document and a sweep over documents still
//! waiting for their notification.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;

use crate::config::Settings;
use crate::dispatcher::{DispatchOutcome, EventDispatcher};
use crate::document::{
    DocumentId, DocumentService, DocumentStore, MemoryDocumentStore, PostgresDocumentStore,
    StoreError,
};
use crate::mail::{create_mail_transport, MailError, MailGateway, MailTransport};
use crate::notification::NotificationBuilder;
use crate::postgres::{PostgresPool, PostgresPoolError};
use crate::queue::{create_task_queue, QueueError, RetryPolicy, TaskId, TaskQueue};
use crate::tasks::{DocumentNotificationTask, SendSimpleEmailTask, SimpleEmailArgs, SEND_SIMPLE_EMAIL};
use crate::template::TemplateRenderer;
use crate::tracker::DeliveryTracker;
use crate::worker::{HandlerRegistry, WorkerPool};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Mail transport error: {0}")]
    Mail(#[from] MailError),

    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] PostgresPoolError),
}

/// Storage and delivery backends the pipeline runs on.
pub struct Backends {
    pub store: Arc<dyn DocumentStore>,
    pub queue: Arc<dyn TaskQueue>,
    pub transport: Arc<dyn MailTransport>,
}

pub struct Pipeline {
    store: Arc<dyn DocumentStore>,
    queue: Arc<dyn TaskQueue>,
    tracker: Arc<DeliveryTracker>,
    dispatcher: EventDispatcher,
    documents: DocumentService,
    gateway: MailGateway,
    notifier: Arc<DocumentNotificationTask>,
    workers: WorkerPool,
    postgres: Option<PostgresPool>,
}

impl Pipeline {
    /// Assemble the pipeline over explicit backends.
    pub fn new(settings: &Settings, backends: Backends) -> Self {
        let Backends {
            store,
            queue,
            transport,
        } = backends;

        let tracker = Arc::new(DeliveryTracker::new(store.clone()));
        let dispatcher = EventDispatcher::new(queue.clone(), tracker.clone());
        let documents = DocumentService::new(store.clone(), dispatcher.clone());
        let gateway = MailGateway::new(transport, TemplateRenderer::default(), &settings.mail);

        let notifier = Arc::new(DocumentNotificationTask::new(
            store.clone(),
            NotificationBuilder::new(settings.portal.clone()),
            gateway.clone(),
            tracker.clone(),
            RetryPolicy::from_config(&settings.task),
        ));

        let registry = HandlerRegistry::new()
            .with(notifier.clone())
            .with(Arc::new(SendSimpleEmailTask::new(gateway.clone())));

        let workers = WorkerPool::new(
            queue.clone(),
            registry,
            settings.worker.concurrency,
            Duration::from_secs(settings.task.soft_timeout_seconds),
        );

        Self {
            store,
            queue,
            tracker,
            dispatcher,
            documents,
            gateway,
            notifier,
            workers,
            postgres: None,
        }
    }

    /// Build from configuration, connecting to PostgreSQL when `database.url` is set.
    pub async fn from_settings(settings: &Settings) -> Result<Self, BootstrapError> {
        let postgres = match settings.database.url {
            Some(_) => {
                let pool = PostgresPool::new(&settings.database).await?;
                pool.ensure_schema().await?;
                Some(pool)
            }
            None => None,
        };

        let store: Arc<dyn DocumentStore> = match &postgres {
            Some(pool) => {
                tracing::info!(backend = "postgres", "Creating PostgreSQL document store");
                Arc::new(PostgresDocumentStore::new(pool.pool().clone()))
            }
            None => {
                tracing::warn!("No database configured, documents are kept in memory");
                Arc::new(MemoryDocumentStore::new())
            }
        };

        let queue = create_task_queue(settings, postgres.as_ref());
        let transport = create_mail_transport(&settings.mail)?;

        if settings.mail.sender_address.trim().is_empty() {
            tracing::warn!("mail.sender_address is not set; every send will fail and dead-letter");
        }

        let mut pipeline = Self::new(
            settings,
            Backends {
                store,
                queue,
                transport,
            },
        );
        pipeline.postgres = postgres;
        Ok(pipeline)
    }

    pub fn documents(&self) -> &DocumentService {
        &self.documents
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn queue(&self) -> &Arc<dyn TaskQueue> {
        &self.queue
    }

    pub fn tracker(&self) -> &Arc<DeliveryTracker> {
        &self.tracker
    }

    pub fn gateway(&self) -> &MailGateway {
        &self.gateway
    }

    pub fn notifier(&self) -> &Arc<DocumentNotificationTask> {
        &self.notifier
    }

    pub fn workers(&self) -> &WorkerPool {
        &self.workers
    }

    pub fn postgres(&self) -> Option<&PostgresPool> {
        self.postgres.as_ref()
    }

    /// Run the worker pool until `shutdown` fires.
    pub async fn run_workers(&self, shutdown: broadcast::Sender<()>) {
        self.workers.run(shutdown).await;
    }

    /// Queue a generic e-mail for asynchronous delivery.
    pub async fn send_simple_email(&self, args: &SimpleEmailArgs) -> Result<TaskId, QueueError> {
        let id = self.queue.enqueue(SEND_SIMPLE_EMAIL, args.to_args()).await?;
        tracing::info!(task_id = %id, to = %args.to, "Simple email enqueued");
        Ok(id)
    }

    /// Re-enqueue the notification of one document.
    ///
    /// Runs the dispatcher rules against the current row, so a document
    /// already notified or still without a recipient address is not queued.
    /// Returns `None` when the document does not exist.
    pub async fn redispatch(&self, id: DocumentId) -> Result<Option<DispatchOutcome>, StoreError> {
        let Some((document, recipient)) = self.store.load_for_notification(id).await? else {
            tracing::info!(document_id = id, "Re-dispatch requested for unknown document");
            return Ok(None);
        };

        tracing::info!(document_id = id, "Manual re-dispatch requested");
        Ok(Some(
            self.dispatcher.on_document_created(document, recipient).await,
        ))
    }

    /// Re-dispatch up to `limit` un-notified documents whose recipient has an address.
    pub async fn redispatch_pending(
        &self,
        limit: usize,
    ) -> Result<Vec<(DocumentId, DispatchOutcome)>, StoreError> {
        let pending = self.store.pending_notifications(limit).await?;
        let mut outcomes = Vec::with_capacity(pending.len());

        for id in pending {
            if let Some(outcome) = self.redispatch(id).await? {
                outcomes.push((id, outcome));
            }
        }

        tracing::info!(count = outcomes.len(), "Pending notifications re-dispatched");
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Client, DocumentKind, NewDocument};
    use crate::mail::MemoryTransport;
    use crate::queue::MemoryTaskQueue;
    use crate::tasks::SEND_DOCUMENT_NOTIFICATION;
    use serde_json::json;

    struct Harness {
        pipeline: Pipeline,
        store: Arc<MemoryDocumentStore>,
        queue: Arc<MemoryTaskQueue>,
        transport: Arc<MemoryTransport>,
    }

    fn harness() -> Harness {
        let mut settings = Settings::with_portal("https://portal.example");
        settings.mail.sender_address = "noreply@vetorial.example".to_string();

        let store = Arc::new(MemoryDocumentStore::new());
        let queue = Arc::new(MemoryTaskQueue::new());
        let transport = Arc::new(MemoryTransport::new());
        let pipeline = Pipeline::new(
            &settings,
            Backends {
                store: store.clone(),
                queue: queue.clone(),
                transport: transport.clone(),
            },
        );

        Harness {
            pipeline,
            store,
            queue,
            transport,
        }
    }

    #[tokio::test]
    async fn test_redispatch_after_email_added() {
        let h = harness();
        h.store.upsert_client(Client::new(99, "sem_email", ""));
        let (doc, outcome) = h
            .pipeline
            .documents()
            .upload(NewDocument::new(99, DocumentKind::Permit, "Alvará", "a.pdf"))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::MissingEmail);

        h.store.upsert_client(Client::new(99, "sem_email", "agora@example.com"));
        let outcomes = h.pipeline.redispatch_pending(10).await.unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].0, doc.id);
        assert!(outcomes[0].1.task_id().is_some());
        assert_eq!(
            h.queue
                .enqueue_count(SEND_DOCUMENT_NOTIFICATION, &json!({"document_id": doc.id}))
                .await,
            1
        );
    }

    #[tokio::test]
    async fn test_redispatch_unknown_document() {
        let h = harness();
        assert!(h.pipeline.redispatch(404).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_redispatch_skips_notified_document() {
        let h = harness();
        h.store.upsert_client(Client::new(42, "ana", "ana@example.com"));
        let (doc, _) = h
            .pipeline
            .documents()
            .upload(NewDocument::new(42, DocumentKind::Payroll, "Folha", "f.pdf"))
            .await
            .unwrap();

        h.pipeline.workers().run_once().await.unwrap();
        assert_eq!(h.transport.send_count(), 1);

        assert_eq!(
            h.pipeline.redispatch(doc.id).await.unwrap(),
            Some(DispatchOutcome::AlreadyNotified)
        );
    }

    #[tokio::test]
    async fn test_simple_email_through_workers() {
        let h = harness();
        h.pipeline
            .send_simple_email(&SimpleEmailArgs::new("bruno@example.com", "Oi", "Olá"))
            .await
            .unwrap();

        h.pipeline.workers().run_once().await.unwrap();
        assert_eq!(h.transport.sent()[0].to, "bruno@example.com");
    }
}
