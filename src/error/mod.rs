use std::fmt;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::document::StoreError;
use crate::mail::MailError;
use crate::queue::QueueError;
use crate::template::TemplateError;

/// Failure classes surfaced in dead-letter logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    ObsoleteInput,
    PermanentUnaddressable,
    TransientProvider,
    TransientStorage,
    FatalConfiguration,
    Timeout,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::ObsoleteInput => "obsolete_input",
            ErrorClass::PermanentUnaddressable => "permanent_unaddressable",
            ErrorClass::TransientProvider => "transient_provider",
            ErrorClass::TransientStorage => "transient_storage",
            ErrorClass::FatalConfiguration => "fatal_configuration",
            ErrorClass::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by task handlers. Any `Err` is a failed attempt.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Document store error: {0}")]
    Store(#[from] StoreError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Provider answered but did not accept the message
    #[error("Mail provider did not accept the message")]
    MailRejected,

    #[error("Task timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid task payload: {0}")]
    InvalidPayload(String),

    #[error("No handler registered for task: {0}")]
    UnknownTask(String),
}

impl PipelineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            PipelineError::Store(_) | PipelineError::Queue(_) => ErrorClass::TransientStorage,
            PipelineError::Mail(e) => match e {
                MailError::Config(_) | MailError::Template(_) => ErrorClass::FatalConfiguration,
                MailError::InvalidMessage(_) => ErrorClass::PermanentUnaddressable,
                MailError::Transport(_) => ErrorClass::TransientProvider,
                MailError::Timeout(_) => ErrorClass::Timeout,
            },
            PipelineError::MailRejected => ErrorClass::TransientProvider,
            PipelineError::Timeout(_) => ErrorClass::Timeout,
            PipelineError::InvalidPayload(_) | PipelineError::UnknownTask(_) => {
                ErrorClass::FatalConfiguration
            }
        }
    }

    /// False for failures no retry can fix; the worker dead-letters them at once.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            PipelineError::InvalidPayload(_) | PipelineError::UnknownTask(_)
        )
    }
}

impl From<TemplateError> for PipelineError {
    fn from(err: TemplateError) -> Self {
        PipelineError::Mail(MailError::Template(err))
    }
}

/// Errors returned by the operations API.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, log_message) = match &self {
            AppError::Config(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                e.to_string(),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Pipeline(e) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "PIPELINE_ERROR",
                e.to_string(),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
        };

        let client_message = if is_production() && status.is_server_error() {
            "Internal server error".to_string()
        } else {
            log_message.clone()
        };

        // Always log the detailed error server-side
        tracing::error!(
            code = %code,
            status = %status.as_u16(),
            message = %log_message,
            "API error"
        );

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: client_message,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
