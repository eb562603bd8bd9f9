//! Backend trait for the task queue.
//!
//! This module defines the abstraction layer the worker runtime consumes,
//! allowing different storage implementations (memory, PostgreSQL) to be
//! used interchangeably.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::ErrorClass;

/// Most dead letters a backend retains or lists, newest first.
pub const DEAD_LETTER_LIMIT: usize = 1000;

/// Errors that can occur during queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Task is not known to the queue or is not currently reserved
    #[error("Task {0} is not reserved")]
    NotReserved(TaskId),

    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend is temporarily unavailable
    #[error("Queue unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A task handed to a worker by `reserve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedTask {
    pub id: TaskId,

    /// Name of the registered handler
    pub task_name: String,

    /// Handler payload. For notifications only `{"document_id": ..}`.
    pub args: serde_json::Value,

    pub enqueued_at: DateTime<Utc>,

    /// Attempts started so far, including the current one
    pub attempts: u32,

    /// When the task became eligible for this attempt
    pub next_eligible_at: DateTime<Utc>,

    /// Error of the previous attempt, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// A task that exhausted its attempts or can never succeed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    pub task_id: TaskId,
    pub task_name: String,
    pub args: serde_json::Value,
    pub attempts: u32,
    pub error_class: String,
    pub last_error: String,
    pub dead_lettered_at: DateTime<Utc>,
}

/// Queue occupancy snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub backend: String,
    /// Waiting tasks, including ones scheduled for a later retry
    pub pending: usize,
    pub running: usize,
    pub dead_lettered: usize,
    /// Tasks completed since this process started
    pub completed: u64,
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Add a task, eligible immediately.
    async fn enqueue(&self, task_name: &str, args: serde_json::Value)
        -> Result<TaskId, QueueError>;

    /// Wait for the next eligible task and mark it running.
    ///
    /// Increments `attempts` on the returned task. Dropping the future
    /// before it resolves reserves nothing.
    async fn reserve(&self) -> Result<QueuedTask, QueueError>;

    /// Remove a finished task.
    async fn complete(&self, id: TaskId) -> Result<(), QueueError>;

    /// Release a failed task so it becomes eligible again after `delay`.
    async fn schedule_retry(
        &self,
        id: TaskId,
        delay: Duration,
        error: &str,
    ) -> Result<(), QueueError>;

    /// Move a task to the dead-letter sink. It is never retried again.
    async fn dead_letter(
        &self,
        id: TaskId,
        class: ErrorClass,
        error: &str,
    ) -> Result<(), QueueError>;

    /// Dead letters, most recent first.
    async fn dead_letters(&self) -> Result<Vec<DeadLetter>, QueueError>;

    async fn stats(&self) -> Result<QueueStats, QueueError>;

    fn backend_name(&self) -> &'static str;
}
