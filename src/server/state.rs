use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Settings;
use crate::pipeline::Pipeline;

/// Shared state handed to every operations handler.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub pipeline: Arc<Pipeline>,
    started: Instant,
}

impl AppState {
    pub fn new(settings: Settings, pipeline: Arc<Pipeline>) -> Self {
        Self {
            settings: Arc::new(settings),
            pipeline,
            started: Instant::now(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}
