// Infrastructure (shared components)
pub mod config;
pub mod error;
pub mod metrics;
pub mod postgres;
pub mod telemetry;

// Domain
pub mod document;
pub mod mail;
pub mod notification;
pub mod queue;
pub mod template;
pub mod tracker;

// Pipeline stages
pub mod dispatcher;
pub mod pipeline;
pub mod tasks;
pub mod worker;

// Application layer
pub mod api;
pub mod server;
pub mod shutdown;
