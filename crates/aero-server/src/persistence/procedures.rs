//! Flight procedure and protection-zone persistence operations.

use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

use aero_core::models::{
    ConflictSeverity, CreateProcedureRequest, FlightProcedure, ProtectionType, ProtectionZone,
};

use super::db::{format_timestamp, parse_timestamp};

const DEFAULT_ANALYSIS_PRIORITY: i32 = 50;

/// Insert a flight procedure with its protection area.
pub async fn create_procedure(
    pool: &SqlitePool,
    req: &CreateProcedureRequest,
) -> Result<FlightProcedure> {
    let now = Utc::now();
    let protection_type = req.protection_type.unwrap_or_default();
    let conflict_severity = req.conflict_severity.unwrap_or_default();
    let analysis_priority = req.analysis_priority.unwrap_or(DEFAULT_ANALYSIS_PRIORITY);
    let is_active = req.is_active.unwrap_or(true);
    let protection_json = req
        .protection_geometry
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let result = sqlx::query(
        r#"
        INSERT INTO flight_procedures (
            procedure_code, name, procedure_type, airport_icao, runway,
            protection_name, protection_type, conflict_severity, analysis_priority,
            protection_geometry, is_active, created_at, updated_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
        "#,
    )
    .bind(&req.procedure_code)
    .bind(&req.name)
    .bind(req.procedure_type.as_str())
    .bind(&req.airport_icao)
    .bind(&req.runway)
    .bind(&req.protection_name)
    .bind(protection_type.as_str())
    .bind(conflict_severity.as_str())
    .bind(analysis_priority)
    .bind(&protection_json)
    .bind(is_active)
    .bind(format_timestamp(now))
    .execute(pool)
    .await?;

    Ok(FlightProcedure {
        id: result.last_insert_rowid(),
        procedure_code: req.procedure_code.clone(),
        name: req.name.clone(),
        procedure_type: req.procedure_type,
        airport_icao: req.airport_icao.clone(),
        runway: req.runway.clone(),
        protection_name: req.protection_name.clone(),
        protection_type,
        conflict_severity,
        analysis_priority,
        protection_geometry: req.protection_geometry.clone(),
        is_active,
        created_at: now,
        updated_at: now,
    })
}

/// Load all flight procedures.
pub async fn load_all_procedures(pool: &SqlitePool) -> Result<Vec<FlightProcedure>> {
    let rows = sqlx::query_as::<_, ProcedureRow>(
        r#"
        SELECT id, procedure_code, name, procedure_type, airport_icao, runway,
               protection_name, protection_type, conflict_severity, analysis_priority,
               protection_geometry, is_active, created_at, updated_at
        FROM flight_procedures
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(FlightProcedure::try_from).collect()
}

/// Set whether a procedure's protection area takes part in analysis.
pub async fn set_procedure_active(pool: &SqlitePool, id: i64, active: bool) -> Result<bool> {
    let result =
        sqlx::query("UPDATE flight_procedures SET is_active = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(active)
            .bind(format_timestamp(Utc::now()))
            .bind(id)
            .execute(pool)
            .await?;

    Ok(result.rows_affected() > 0)
}

/// Load every active protection zone with a non-empty geometry, by procedure ID.
pub async fn load_active_protection_zones(pool: &SqlitePool) -> Result<Vec<ProtectionZone>> {
    let rows = sqlx::query_as::<_, ProtectionZoneRow>(
        r#"
        SELECT id, procedure_code, name, protection_name, protection_type,
               conflict_severity, analysis_priority, protection_geometry
        FROM flight_procedures
        WHERE is_active = 1 AND protection_geometry IS NOT NULL AND protection_geometry != ''
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ProtectionZone::from).collect())
}

// Internal row types for SQLx
#[derive(sqlx::FromRow)]
struct ProcedureRow {
    id: i64,
    procedure_code: String,
    name: String,
    procedure_type: String,
    airport_icao: String,
    runway: Option<String>,
    protection_name: Option<String>,
    protection_type: String,
    conflict_severity: String,
    analysis_priority: i32,
    protection_geometry: Option<String>,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ProcedureRow> for FlightProcedure {
    type Error = anyhow::Error;

    fn try_from(row: ProcedureRow) -> Result<Self> {
        let protection_geometry = match row.protection_geometry.as_deref() {
            Some(text) if !text.is_empty() => Some(serde_json::from_str(text)?),
            _ => None,
        };

        Ok(FlightProcedure {
            id: row.id,
            procedure_code: row.procedure_code,
            name: row.name,
            procedure_type: row.procedure_type.parse()?,
            airport_icao: row.airport_icao,
            runway: row.runway,
            protection_name: row.protection_name,
            protection_type: row.protection_type.parse().unwrap_or_default(),
            conflict_severity: row.conflict_severity.parse().unwrap_or_default(),
            analysis_priority: row.analysis_priority,
            protection_geometry,
            is_active: row.is_active,
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProtectionZoneRow {
    id: i64,
    procedure_code: String,
    name: String,
    protection_name: Option<String>,
    protection_type: String,
    conflict_severity: String,
    analysis_priority: i32,
    protection_geometry: String,
}

impl From<ProtectionZoneRow> for ProtectionZone {
    fn from(row: ProtectionZoneRow) -> Self {
        ProtectionZone {
            procedure_id: row.id,
            procedure_code: row.procedure_code,
            name: row.protection_name.unwrap_or(row.name),
            protection_type: row
                .protection_type
                .parse::<ProtectionType>()
                .unwrap_or_default(),
            severity: row
                .conflict_severity
                .parse::<ConflictSeverity>()
                .unwrap_or_default(),
            analysis_priority: row.analysis_priority,
            geometry: row.protection_geometry,
        }
    }
}
