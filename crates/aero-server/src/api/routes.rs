//! REST API routes.

use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::{procedures, projects};
use crate::state::AppState;

/// Create the API router.
pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/v1/projects", post(projects::create_project))
        .route("/v1/projects", get(projects::list_projects))
        .route("/v1/projects/:id", get(projects::get_project))
        .route("/v1/projects/:id/submit", post(projects::submit_project))
        .route("/v1/projects/:id/geometries", get(projects::get_project_geometries))
        .route("/v1/projects/:id/conflicts", get(projects::list_project_conflicts))
        .route("/v1/projects/:id/analysis", get(projects::get_last_analysis))
        .route("/v1/procedures", post(procedures::create_procedure))
        .route("/v1/procedures", get(procedures::list_procedures))
        .route("/v1/procedures/:id/active", put(procedures::set_procedure_active))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "analysis_workers": state.config().analysis_workers,
    }))
}
