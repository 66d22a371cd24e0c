//! Flight procedure API endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use aero_core::models::{CreateProcedureRequest, FlightProcedure};

use crate::api::projects::validate_geojson;
use crate::api::{api_error, internal_error, ApiError};
use crate::persistence::procedures as procedures_db;
use crate::state::AppState;

/// Create a flight procedure with its protection area.
pub async fn create_procedure(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateProcedureRequest>,
) -> Result<(StatusCode, Json<FlightProcedure>), ApiError> {
    if req.procedure_code.trim().is_empty() || req.airport_icao.trim().is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Procedure code and airport ICAO are required",
        ));
    }
    if let Some(geometry) = req.protection_geometry.as_ref().filter(|g| !g.is_null()) {
        validate_geojson(geometry).map_err(|reason| {
            api_error(
                StatusCode::BAD_REQUEST,
                format!("Invalid protection GeoJSON: {}", reason),
            )
        })?;
    }

    let procedure = procedures_db::create_procedure(state.db().pool(), &req)
        .await
        .map_err(|err| internal_error("Failed to create procedure", err))?;
    tracing::info!(
        "Created procedure {} ({}) at {}",
        procedure.procedure_code,
        procedure.id,
        procedure.airport_icao
    );

    Ok((StatusCode::CREATED, Json(procedure)))
}

/// List all flight procedures.
pub async fn list_procedures(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FlightProcedure>>, ApiError> {
    procedures_db::load_all_procedures(state.db().pool())
        .await
        .map(Json)
        .map_err(|err| internal_error("Failed to load procedures", err))
}

#[derive(Debug, serde::Deserialize)]
pub struct ProcedureActivation {
    pub is_active: bool,
}

/// Include or exclude a procedure's protection area from future analyses.
pub async fn set_procedure_active(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<ProcedureActivation>,
) -> Result<StatusCode, ApiError> {
    let updated = procedures_db::set_procedure_active(state.db().pool(), id, req.is_active)
        .await
        .map_err(|err| internal_error("Failed to update procedure", err))?;
    if !updated {
        return Err(api_error(StatusCode::NOT_FOUND, "Procedure not found"));
    }
    tracing::info!("Procedure {} active = {}", id, req.is_active);
    Ok(StatusCode::NO_CONTENT)
}
