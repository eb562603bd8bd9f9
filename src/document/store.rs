//! Storage abstraction for client documents.
//!
//! The pipeline only reads document and recipient fields, and writes the
//! notification flags through point updates. Everything else about the row
//! belongs to the data layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::types::{Client, ClientDocument, ClientId, DocumentId, DocumentUpdate, NewDocument};

/// Errors that can occur during document store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Referenced client does not exist
    #[error("Client not found: {0}")]
    ClientNotFound(ClientId),

    /// Stored row could not be mapped back into a document
    #[error("Corrupt row for document {id}: {reason}")]
    CorruptRow { id: DocumentId, reason: String },

    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Store is temporarily unavailable
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document. Returns the durable row.
    async fn insert_document(&self, new: NewDocument) -> Result<ClientDocument, StoreError>;

    async fn get_document(&self, id: DocumentId) -> Result<Option<ClientDocument>, StoreError>;

    async fn get_client(&self, id: ClientId) -> Result<Option<Client>, StoreError>;

    /// Load a document together with its recipient.
    ///
    /// A document whose recipient row vanished is reported as absent.
    async fn load_for_notification(
        &self,
        id: DocumentId,
    ) -> Result<Option<(ClientDocument, Client)>, StoreError> {
        let Some(document) = self.get_document(id).await? else {
            return Ok(None);
        };
        let Some(client) = self.get_client(document.client_id).await? else {
            return Ok(None);
        };
        Ok(Some((document, client)))
    }

    /// Update descriptive fields. Never touches notification or view flags.
    async fn update_details(
        &self,
        id: DocumentId,
        update: &DocumentUpdate,
    ) -> Result<Option<ClientDocument>, StoreError>;

    /// Set `viewed`/`viewed_at` if not yet set. Returns true on the first view.
    async fn mark_viewed(&self, id: DocumentId, at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Set `notification_sent`/`notification_sent_at` if not yet set.
    ///
    /// Writes only those two fields. Returns true when this call performed
    /// the transition, false when the document was already notified or is
    /// missing.
    async fn mark_notified(&self, id: DocumentId, at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Documents still waiting for a notification whose recipient has an
    /// email address, oldest first.
    async fn pending_notifications(&self, limit: usize) -> Result<Vec<DocumentId>, StoreError>;

    fn backend_name(&self) -> &'static str;
}
