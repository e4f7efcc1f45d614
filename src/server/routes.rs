//! Intake and status HTTP routes.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use crate::pipeline::{Pipeline, PipelineError};

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub state: &'static str,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn required_id(query: &IdQuery) -> Result<&str, Response> {
    match query.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(error_response(
            StatusCode::BAD_REQUEST,
            "missing query parameter: id",
        )),
    }
}

/// GET /api/download?id=
async fn start_download(
    State(pipeline): State<Arc<Pipeline>>,
    Query(query): Query<IdQuery>,
) -> Response {
    let id = match required_id(&query) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match pipeline.submit(id) {
        Ok(()) => Json(AckResponse { state: "ACK" }).into_response(),
        Err(e @ PipelineError::QueueFull) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
        Err(e @ PipelineError::InvalidIdentifier(_)) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => {
            warn!("Unexpected intake error for {}: {}", id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /api/status?id=
async fn get_status(
    State(pipeline): State<Arc<Pipeline>>,
    Query(query): Query<IdQuery>,
) -> Response {
    let id = match required_id(&query) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match pipeline.status(id).await {
        Ok(Some(status)) => Json(status).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("unknown id: {}", id)),
        Err(e) => {
            warn!("Failed to read status of {}: {}", id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to read status")
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

pub fn make_routes(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/api/download", get(start_download))
        .route("/api/status", get(get_status))
        .route("/health", get(health))
        .with_state(pipeline)
}
