//! Worker runtime.
//!
//! A fixed pool of tokio tasks reserves work from the `TaskQueue`, runs the
//! registered handler under a soft timeout and settles the task:
//! complete, retry with the handler's policy, or dead-letter.

mod handler;
mod pool;

pub use handler::{HandlerRegistry, TaskHandler, TaskOutcome};
pub use pool::{AttemptReport, WorkerPool};
