//! Write path for client documents.
//!
//! Every insert goes through `upload`, so the dispatcher sees each durable
//! insert exactly once, after it has committed.

use std::sync::Arc;

use chrono::Utc;

use super::store::{DocumentStore, StoreError};
use super::types::{ClientDocument, DocumentEvent, DocumentId, DocumentUpdate, NewDocument};
use crate::dispatcher::{DispatchOutcome, EventDispatcher};

#[derive(Clone)]
pub struct DocumentService {
    store: Arc<dyn DocumentStore>,
    dispatcher: EventDispatcher,
}

impl DocumentService {
    pub fn new(store: Arc<dyn DocumentStore>, dispatcher: EventDispatcher) -> Self {
        Self { store, dispatcher }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Persist a staff upload, then hand the committed row to the dispatcher.
    ///
    /// The recipient is resolved before the insert, so an `Err` always means
    /// nothing was written. Once the row is committed the upload succeeds;
    /// dispatch problems show up in the returned outcome and in the logs.
    pub async fn upload(
        &self,
        new: NewDocument,
    ) -> Result<(ClientDocument, DispatchOutcome), StoreError> {
        let client_id = new.client_id;
        let recipient = self
            .store
            .get_client(client_id)
            .await?
            .ok_or(StoreError::ClientNotFound(client_id))?;

        let document = self.store.insert_document(new).await?;

        tracing::info!(
            document_id = document.id,
            client_id,
            kind = %document.kind,
            "Document uploaded"
        );

        let outcome = self
            .dispatcher
            .on_document_saved(&DocumentEvent::created(document.clone(), recipient))
            .await;

        Ok((document, outcome))
    }

    /// Edit descriptive fields. Produces an update event, which never notifies.
    pub async fn update_details(
        &self,
        id: DocumentId,
        update: &DocumentUpdate,
    ) -> Result<Option<ClientDocument>, StoreError> {
        let Some(document) = self.store.update_details(id, update).await? else {
            return Ok(None);
        };

        if let Some(recipient) = self.store.get_client(document.client_id).await? {
            self.dispatcher
                .on_document_saved(&DocumentEvent::updated(document.clone(), recipient))
                .await;
        }

        Ok(Some(document))
    }

    /// Record that the client opened the document in the portal.
    pub async fn mark_viewed(&self, id: DocumentId) -> Result<bool, StoreError> {
        let first_view = self.store.mark_viewed(id, Utc::now()).await?;
        if first_view {
            tracing::debug!(document_id = id, "Document viewed for the first time");
        }
        Ok(first_view)
    }
}
