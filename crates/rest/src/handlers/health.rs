//! Health check endpoint handlers.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ledgerdesk_persistence::core::TransactionProvider;
use tracing::debug;

use crate::error::RestResult;
use crate::state::AppState;

/// Handler for the health check endpoint.
///
/// Checks out a connection and runs a trivial query. No tenant is needed.
///
/// # HTTP Request
///
/// `GET /health`
///
/// # Response
///
/// - `200 OK` - The database answered
/// - `503 Service Unavailable` - The database could not be reached
pub async fn health_handler(State(state): State<AppState>) -> RestResult<Response> {
    debug!("Processing health check request");

    state.backend().health_check().await?;

    let health_response = serde_json::json!({
        "status": "healthy",
        "backend": state.backend().backend_name(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    });

    Ok((StatusCode::OK, Json(health_response)).into_response())
}

/// Handler for the liveness probe; never touches the database.
///
/// # HTTP Request
///
/// `GET /_liveness`
pub async fn liveness_handler() -> impl IntoResponse {
    StatusCode::OK
}
