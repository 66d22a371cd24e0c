//! API routes for the analysis server.

pub mod procedures;
pub mod projects;
mod routes;

use axum::{http::StatusCode, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    routes::create_router()
}

/// Error response shape shared by all handlers.
pub type ApiError = (StatusCode, Json<Value>);

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

/// Log a persistence failure and hide its details from the client.
pub(crate) fn internal_error(context: &str, err: anyhow::Error) -> ApiError {
    tracing::error!("{}: {}", context, err);
    api_error(StatusCode::INTERNAL_SERVER_ERROR, context)
}
