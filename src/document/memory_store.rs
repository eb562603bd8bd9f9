//! In-memory document store using DashMap.
//!
//! Rows live in memory and are lost on restart. Used for development and as
//! the data-layer fake in tests, including transient-failure injection.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::store::{DocumentStore, StoreError};
use super::types::{Client, ClientDocument, ClientId, DocumentId, DocumentUpdate, NewDocument};

pub struct MemoryDocumentStore {
    documents: DashMap<DocumentId, ClientDocument>,
    clients: DashMap<ClientId, Client>,
    next_id: AtomicI64,
    /// Remaining loads that fail with `Unavailable`
    fail_loads: AtomicU32,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
            clients: DashMap::new(),
            next_id: AtomicI64::new(1),
            fail_loads: AtomicU32::new(0),
        }
    }

    /// Insert or replace a client row.
    pub fn upsert_client(&self, client: Client) {
        self.clients.insert(client.id, client);
    }

    /// Insert a document with a caller-chosen id, bypassing the id sequence.
    pub fn insert_with_id(
        &self,
        id: DocumentId,
        new: NewDocument,
    ) -> Result<ClientDocument, StoreError> {
        if !self.clients.contains_key(&new.client_id) {
            return Err(StoreError::ClientNotFound(new.client_id));
        }

        let document = build_document(id, new);
        self.documents.insert(id, document.clone());
        self.next_id.fetch_max(id + 1, Ordering::SeqCst);
        Ok(document)
    }

    /// Make the next `count` document loads fail as a storage outage.
    pub fn fail_next_loads(&self, count: u32) {
        self.fail_loads.store(count, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn take_injected_failure(&self) -> Result<(), StoreError> {
        let consumed = self
            .fail_loads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match consumed {
            Ok(_) => Err(StoreError::Unavailable("injected load failure".to_string())),
            Err(_) => Ok(()),
        }
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

fn build_document(id: DocumentId, new: NewDocument) -> ClientDocument {
    ClientDocument {
        id,
        client_id: new.client_id,
        uploaded_by: new.uploaded_by,
        kind: new.kind,
        title: new.title,
        description: new.description,
        file_ref: new.file_ref,
        created_at: new.created_at.unwrap_or_else(Utc::now),
        notification_sent: false,
        notification_sent_at: None,
        viewed: false,
        viewed_at: None,
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert_document(&self, new: NewDocument) -> Result<ClientDocument, StoreError> {
        if !self.clients.contains_key(&new.client_id) {
            return Err(StoreError::ClientNotFound(new.client_id));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let document = build_document(id, new);
        self.documents.insert(id, document.clone());

        tracing::trace!(document_id = id, "Document inserted into memory store");

        Ok(document)
    }

    async fn get_document(&self, id: DocumentId) -> Result<Option<ClientDocument>, StoreError> {
        self.take_injected_failure()?;
        Ok(self.documents.get(&id).map(|d| d.value().clone()))
    }

    async fn get_client(&self, id: ClientId) -> Result<Option<Client>, StoreError> {
        Ok(self.clients.get(&id).map(|c| c.value().clone()))
    }

    async fn update_details(
        &self,
        id: DocumentId,
        update: &DocumentUpdate,
    ) -> Result<Option<ClientDocument>, StoreError> {
        let Some(mut document) = self.documents.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(title) = &update.title {
            document.title = title.clone();
        }
        if let Some(description) = &update.description {
            document.description = description.clone();
        }
        if let Some(kind) = update.kind {
            document.kind = kind;
        }

        Ok(Some(document.clone()))
    }

    async fn mark_viewed(&self, id: DocumentId, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let Some(mut document) = self.documents.get_mut(&id) else {
            return Ok(false);
        };

        if document.viewed {
            return Ok(false);
        }

        document.viewed = true;
        document.viewed_at = Some(at);
        Ok(true)
    }

    async fn mark_notified(&self, id: DocumentId, at: DateTime<Utc>) -> Result<bool, StoreError> {
        // The shard write lock makes check-and-set atomic per row.
        let Some(mut document) = self.documents.get_mut(&id) else {
            return Ok(false);
        };

        if document.notification_sent {
            return Ok(false);
        }

        document.notification_sent = true;
        document.notification_sent_at = Some(at);
        Ok(true)
    }

    async fn pending_notifications(&self, limit: usize) -> Result<Vec<DocumentId>, StoreError> {
        let mut pending: Vec<(DateTime<Utc>, DocumentId)> = self
            .documents
            .iter()
            .filter(|d| !d.notification_sent)
            .filter(|d| {
                self.clients
                    .get(&d.client_id)
                    .map(|c| c.has_email())
                    .unwrap_or(false)
            })
            .map(|d| (d.created_at, d.id))
            .collect();

        pending.sort();
        Ok(pending.into_iter().take(limit).map(|(_, id)| id).collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentKind;

    fn store_with_client() -> MemoryDocumentStore {
        let store = MemoryDocumentStore::new();
        store.upsert_client(Client::new(42, "ana", "ana@example.com").with_full_name("Ana Costa"));
        store
    }

    fn new_doc() -> NewDocument {
        NewDocument::new(42, DocumentKind::TaxGuide, "DARF Mensal", "docs/42/darf.pdf")
    }

    #[tokio::test]
    async fn test_insert_starts_unnotified() {
        let store = store_with_client();
        let doc = store.insert_document(new_doc()).await.unwrap();

        assert!(!doc.notification_sent);
        assert!(doc.notification_sent_at.is_none());
        assert!(!doc.viewed);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_insert_requires_client() {
        let store = MemoryDocumentStore::new();
        let result = store.insert_document(new_doc()).await;
        assert!(matches!(result, Err(StoreError::ClientNotFound(42))));
    }

    #[tokio::test]
    async fn test_mark_notified_is_idempotent() {
        let store = store_with_client();
        let doc = store.insert_document(new_doc()).await.unwrap();

        let first_at = Utc::now();
        assert!(store.mark_notified(doc.id, first_at).await.unwrap());
        assert!(!store.mark_notified(doc.id, Utc::now()).await.unwrap());

        let stored = store.get_document(doc.id).await.unwrap().unwrap();
        assert!(stored.notification_sent);
        assert_eq!(stored.notification_sent_at, Some(first_at));
    }

    #[tokio::test]
    async fn test_mark_notified_missing_document() {
        let store = store_with_client();
        assert!(!store.mark_notified(999, Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_view_and_notification_flags_are_independent() {
        let store = store_with_client();
        let doc = store.insert_document(new_doc()).await.unwrap();

        assert!(store.mark_viewed(doc.id, Utc::now()).await.unwrap());
        assert!(!store.mark_viewed(doc.id, Utc::now()).await.unwrap());

        let stored = store.get_document(doc.id).await.unwrap().unwrap();
        assert!(stored.viewed);
        assert!(!stored.notification_sent);

        assert!(store.mark_notified(doc.id, Utc::now()).await.unwrap());
        let stored = store.get_document(doc.id).await.unwrap().unwrap();
        assert!(stored.viewed);
        assert!(stored.notification_sent);
    }

    #[tokio::test]
    async fn test_update_details_keeps_flags() {
        let store = store_with_client();
        let doc = store.insert_document(new_doc()).await.unwrap();
        store.mark_notified(doc.id, Utc::now()).await.unwrap();

        let update = DocumentUpdate {
            title: Some("DARF Retificado".to_string()),
            ..Default::default()
        };
        let updated = store.update_details(doc.id, &update).await.unwrap().unwrap();

        assert_eq!(updated.title, "DARF Retificado");
        assert!(updated.notification_sent);
    }

    #[tokio::test]
    async fn test_injected_load_failures() {
        let store = store_with_client();
        let doc = store.insert_document(new_doc()).await.unwrap();

        store.fail_next_loads(2);
        assert!(store.get_document(doc.id).await.is_err());
        assert!(store.get_document(doc.id).await.is_err());
        assert!(store.get_document(doc.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_pending_notifications_skips_unaddressable() {
        let store = store_with_client();
        store.upsert_client(Client::new(99, "sem_email", ""));

        let a = store.insert_document(new_doc()).await.unwrap();
        let b = store.insert_document(new_doc()).await.unwrap();
        store
            .insert_document(NewDocument::new(99, DocumentKind::Other, "x", "docs/99/x.pdf"))
            .await
            .unwrap();
        store.mark_notified(a.id, Utc::now()).await.unwrap();

        let pending = store.pending_notifications(10).await.unwrap();
        assert_eq!(pending, vec![b.id]);
    }

    #[tokio::test]
    async fn test_insert_with_id_advances_sequence() {
        let store = store_with_client();
        store.insert_with_id(7, new_doc()).unwrap();

        let next = store.insert_document(new_doc()).await.unwrap();
        assert_eq!(next.id, 8);
    }
}
