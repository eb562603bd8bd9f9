use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::PipelineError;
use crate::queue::{QueuedTask, RetryPolicy};

/// Result of a successful handler run. Either way the queue discards the task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The handler performed its work
    Completed,
    /// Nothing left to do (obsolete input, unaddressable recipient, ...)
    Discarded(&'static str),
}

/// A named unit of work executed by the worker pool.
///
/// Handlers only see the task payload and must re-read authoritative state
/// on every attempt. Returning `Err` fails the attempt; retry and
/// dead-letter decisions belong to the pool.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn retry_policy(&self) -> RetryPolicy;

    async fn handle(&self, args: &Value) -> Result<TaskOutcome, PipelineError>;

    /// Called once when the task is dead-lettered.
    fn on_exhausted(&self, _task: &QueuedTask, _error: &PipelineError) {}
}

/// Handlers keyed by task name.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own name, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) {
        let name = handler.name();
        if self.handlers.insert(name, handler).is_some() {
            tracing::warn!(task = name, "Task handler replaced");
        }
    }

    pub fn with(mut self, handler: Arc<dyn TaskHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
