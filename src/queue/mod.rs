//! Task queue for asynchronous notification work.
//!
//! At-least-once execution of named tasks with per-task retry policies,
//! exponential backoff with jitter and a dead-letter sink. Two backends:
//! - `memory`: single process, tokio timers (development and tests)
//! - `postgres`: durable `notification_tasks` table shared by many workers

mod backend;
mod factory;
mod memory_backend;
mod postgres_backend;
mod retry;

pub use backend::{
    DeadLetter, QueueError, QueueStats, QueuedTask, TaskId, TaskQueue, DEAD_LETTER_LIMIT,
};
pub use factory::create_task_queue;
pub use memory_backend::MemoryTaskQueue;
pub use postgres_backend::PostgresTaskQueue;
pub use retry::{RetryPolicy, JITTER_FACTOR};
