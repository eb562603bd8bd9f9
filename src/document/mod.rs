//! Client documents and their recipients.
//!
//! - `types`: document, client and save-event types
//! - `store`: storage trait with memory and PostgreSQL backends
//! - `service`: write path that feeds the event dispatcher

mod memory_store;
mod postgres_store;
mod service;
mod store;
mod types;

pub use memory_store::MemoryDocumentStore;
pub use postgres_store::PostgresDocumentStore;
pub use service::DocumentService;
pub use store::{DocumentStore, StoreError};
pub use types::{
    Client, ClientDocument, ClientId, DocumentEvent, DocumentId, DocumentKind, DocumentUpdate,
    NewDocument, UnknownDocumentKind,
};
