//! Operator endpoints: manual re-dispatch and dead-letter inspection.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::dispatcher::DispatchOutcome;
use crate::document::DocumentId;
use crate::error::{AppError, PipelineError, Result};
use crate::queue::DeadLetter;
use crate::server::AppState;

const DEFAULT_SWEEP_LIMIT: usize = 100;
const MAX_SWEEP_LIMIT: usize = 1000;

#[derive(Debug, Serialize)]
pub struct RedispatchResponse {
    pub document_id: DocumentId,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

impl RedispatchResponse {
    fn new(document_id: DocumentId, outcome: &DispatchOutcome) -> Self {
        let label = match outcome {
            DispatchOutcome::SkippedUpdate => "skipped_update",
            DispatchOutcome::AlreadyNotified => "already_notified",
            DispatchOutcome::MissingEmail => "missing_email",
            DispatchOutcome::Enqueued(_) => "enqueued",
            DispatchOutcome::EnqueueFailed => "enqueue_failed",
        };
        Self {
            document_id,
            outcome: label.to_string(),
            task_id: outcome.task_id().map(|id| id.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SweepQuery {
    pub limit: Option<usize>,
}

/// POST /api/v1/documents/{id}/redispatch
pub async fn redispatch_document(
    State(state): State<AppState>,
    Path(id): Path<DocumentId>,
) -> Result<Json<RedispatchResponse>> {
    let outcome = state
        .pipeline
        .redispatch(id)
        .await
        .map_err(PipelineError::from)?
        .ok_or_else(|| AppError::NotFound(format!("document {}", id)))?;

    Ok(Json(RedispatchResponse::new(id, &outcome)))
}

/// POST /api/v1/documents/redispatch-pending?limit=N
pub async fn redispatch_pending(
    State(state): State<AppState>,
    Query(query): Query<SweepQuery>,
) -> Result<Json<Vec<RedispatchResponse>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_SWEEP_LIMIT)
        .clamp(1, MAX_SWEEP_LIMIT);

    let outcomes = state
        .pipeline
        .redispatch_pending(limit)
        .await
        .map_err(PipelineError::from)?;

    Ok(Json(
        outcomes
            .iter()
            .map(|(id, outcome)| RedispatchResponse::new(*id, outcome))
            .collect(),
    ))
}

/// GET /api/v1/dead-letters
pub async fn dead_letters(State(state): State<AppState>) -> Result<Json<Vec<DeadLetter>>> {
    let dead = state
        .pipeline
        .queue()
        .dead_letters()
        .await
        .map_err(PipelineError::from)?;
    Ok(Json(dead))
}
