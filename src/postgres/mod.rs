//! PostgreSQL persistence module.
//!
//! Provides connection pooling and schema bootstrap for the Postgres-backed
//! document store and task queue.

pub mod pool;

pub use pool::{mask_database_url, PostgresPool, PostgresPoolError};
