//! Emit Route
//!
//! - POST /api/emit - Broadcast an event to every connected client

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::{EmitRequest, EmitResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;

/// POST /api/emit
pub async fn emit_event(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EmitRequest>,
) -> ApiResult<(StatusCode, Json<EmitResponse>)> {
    if req.event.trim().is_empty() {
        return Err(ApiError::Validation("event name must not be empty".to_string()));
    }

    let delivered = state.hub.emit(&req.event, req.data);
    tracing::debug!(event = %req.event, clients = delivered, "Emitted event");

    Ok((
        StatusCode::ACCEPTED,
        Json(EmitResponse {
            status: "accepted".to_string(),
            delivered,
        }),
    ))
}
