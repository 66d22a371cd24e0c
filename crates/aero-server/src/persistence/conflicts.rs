//! Conflict persistence operations.

use anyhow::Result;
use sqlx::SqlitePool;

use aero_core::models::{Conflict, NewConflict};

use super::db::{format_timestamp, parse_timestamp};

/// Delete every conflict of a project. Returns the number of removed rows.
pub async fn delete_conflicts_for_project(pool: &SqlitePool, project_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM conflicts WHERE project_id = ?1")
        .bind(project_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Insert a single conflict and return its ID.
pub async fn insert_conflict(pool: &SqlitePool, conflict: &NewConflict) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO conflicts (project_id, flight_procedure_id, description, conflicting_geometry, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(conflict.project_id)
    .bind(conflict.flight_procedure_id)
    .bind(&conflict.description)
    .bind(&conflict.conflicting_geometry)
    .bind(format_timestamp(conflict.created_at))
    .bind(format_timestamp(conflict.updated_at))
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Load the conflicts of a project in insertion order.
pub async fn load_conflicts_for_project(pool: &SqlitePool, project_id: i64) -> Result<Vec<Conflict>> {
    let rows = sqlx::query_as::<_, ConflictRow>(
        r#"
        SELECT id, project_id, flight_procedure_id, description, conflicting_geometry, created_at, updated_at
        FROM conflicts
        WHERE project_id = ?1
        ORDER BY id
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Conflict::from).collect())
}

// Internal row type for SQLx
#[derive(sqlx::FromRow)]
struct ConflictRow {
    id: i64,
    project_id: i64,
    flight_procedure_id: i64,
    description: String,
    conflicting_geometry: String,
    created_at: String,
    updated_at: String,
}

impl From<ConflictRow> for Conflict {
    fn from(row: ConflictRow) -> Self {
        Conflict {
            id: row.id,
            project_id: row.project_id,
            flight_procedure_id: row.flight_procedure_id,
            description: row.description,
            conflicting_geometry: row.conflicting_geometry,
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
        }
    }
}
