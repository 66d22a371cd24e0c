//! Project API endpoints.
//!
//! Project submission merges the submitted GeoJSON into the project's stored
//! collection, moves the project to `pending` and queues a background
//! conflict analysis. The request never waits for the analysis.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use aero_core::models::{Conflict, CreateProjectRequest, Project, ProjectStatus};

use crate::analysis::{AnalysisReport, QueueError};
use crate::api::{api_error, internal_error, ApiError};
use crate::persistence::{conflicts as conflicts_db, projects as projects_db};
use crate::state::AppState;

const GEOMETRY_TYPES: &[&str] = &[
    "Point",
    "LineString",
    "Polygon",
    "MultiPoint",
    "MultiLineString",
    "MultiPolygon",
    "GeometryCollection",
];

/// Create a new project.
pub async fn create_project(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    if req.title.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Project title is required"));
    }

    let project = projects_db::create_project(state.db().pool(), &req)
        .await
        .map_err(|err| internal_error("Failed to create project", err))?;
    tracing::info!("Created project {} ({})", project.project_code, project.id);

    Ok((StatusCode::CREATED, Json(project)))
}

/// List all projects.
pub async fn list_projects(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Project>>, ApiError> {
    projects_db::load_all_projects(state.db().pool())
        .await
        .map(Json)
        .map_err(|err| internal_error("Failed to load projects", err))
}

/// Get a specific project by ID.
pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Project>, ApiError> {
    load_project(&state, id).await.map(Json)
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitProjectRequest {
    #[serde(default)]
    pub geometry: Option<Value>,
}

/// Submit a project for review and queue its conflict analysis.
pub async fn submit_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<SubmitProjectRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let pool = state.db().pool();
    let mut project = load_project(&state, id).await?;

    if let Some(geometry) = req.geometry.as_ref().filter(|g| !g.is_null()) {
        validate_geojson(geometry).map_err(|reason| {
            api_error(StatusCode::BAD_REQUEST, format!("Invalid GeoJSON: {}", reason))
        })?;
        projects_db::merge_project_geometry(pool, id, geometry)
            .await
            .map_err(|err| internal_error("Failed to save project geometry", err))?;
    }

    let updated = projects_db::update_project_status(pool, id, ProjectStatus::Pending)
        .await
        .map_err(|err| internal_error("Failed to submit project", err))?;
    if !updated {
        return Err(api_error(StatusCode::NOT_FOUND, "Project not found"));
    }
    project.status = ProjectStatus::Pending;

    tracing::info!("Launching background conflict analysis for project {}", id);
    if let Err(err) = state.analysis_queue().enqueue(id) {
        tracing::warn!("Could not queue analysis for project {}: {}", id, err);
        let message = match err {
            QueueError::Full => "Conflict analysis is busy, submit again later",
            QueueError::Closed => "Conflict analysis is shutting down",
        };
        return Err(api_error(StatusCode::SERVICE_UNAVAILABLE, message));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Project submission accepted. Analysis is in progress.",
            "data": project,
        })),
    ))
}

/// Get the aggregated geometry collection of a project.
pub async fn get_project_geometries(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    load_project(&state, id).await?;
    let stored = projects_db::find_project_geometry(state.db().pool(), id)
        .await
        .map_err(|err| internal_error("Failed to load project geometry", err))?;

    let collection = match stored {
        Some(text) => serde_json::from_str(&text)
            .map_err(|err| internal_error("Stored project geometry is corrupt", err.into()))?,
        None => json!({ "type": "FeatureCollection", "features": [] }),
    };
    Ok(Json(collection))
}

/// List the conflicts found by the latest analysis of a project.
pub async fn list_project_conflicts(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Conflict>>, ApiError> {
    load_project(&state, id).await?;
    conflicts_db::load_conflicts_for_project(state.db().pool(), id)
        .await
        .map(Json)
        .map_err(|err| internal_error("Failed to load conflicts", err))
}

/// Report of the last analysis run of a project since the server started.
pub async fn get_last_analysis(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<AnalysisReport>, ApiError> {
    state
        .analysis_queue()
        .last_report(id)
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "No analysis has run for this project"))
}

async fn load_project(state: &AppState, id: i64) -> Result<Project, ApiError> {
    projects_db::find_project(state.db().pool(), id)
        .await
        .map_err(|err| internal_error("Failed to load project", err))?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Project not found"))
}

/// Structural GeoJSON check done before anything is stored.
pub fn validate_geojson(geojson: &Value) -> Result<(), String> {
    let kind = geojson
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| "GeoJSON must have a 'type' field".to_string())?;

    match kind {
        "Feature" => {
            let geometry = geojson
                .get("geometry")
                .ok_or_else(|| "Feature must have a 'geometry' field".to_string())?;
            validate_geometry(geometry)
        }
        "FeatureCollection" => {
            let features = geojson
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| "FeatureCollection must have a 'features' array".to_string())?;
            features.iter().try_for_each(validate_geojson)
        }
        _ => validate_geometry(geojson),
    }
}

fn validate_geometry(geometry: &Value) -> Result<(), String> {
    let kind = geometry
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| "Geometry must have a 'type' field".to_string())?;
    if !GEOMETRY_TYPES.contains(&kind) {
        return Err(format!("Invalid geometry type: {}", kind));
    }

    if kind == "GeometryCollection" {
        let members = geometry
            .get("geometries")
            .and_then(Value::as_array)
            .ok_or_else(|| "GeometryCollection must have a 'geometries' array".to_string())?;
        return members.iter().try_for_each(validate_geometry);
    }

    match geometry.get("coordinates") {
        Some(Value::Array(_)) => Ok(()),
        _ => Err("Geometry must have a 'coordinates' array".to_string()),
    }
}
