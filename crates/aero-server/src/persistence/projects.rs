//! Project and project-geometry persistence operations.

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::SqlitePool;

use aero_core::models::{CreateProjectRequest, Project, ProjectStatus};

use super::db::{format_timestamp, parse_timestamp};

const AGGREGATED_GEOMETRY_NAME: &str = "Aggregated Project Geometry";

/// Insert a new project in `created` status.
pub async fn create_project(pool: &SqlitePool, req: &CreateProjectRequest) -> Result<Project> {
    let now = Utc::now();
    let project_code = req
        .project_code
        .clone()
        .unwrap_or_else(|| generate_project_code(now));

    let result = sqlx::query(
        r#"
        INSERT INTO projects (project_code, title, description, status, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?5)
        "#,
    )
    .bind(&project_code)
    .bind(&req.title)
    .bind(&req.description)
    .bind(ProjectStatus::Created.as_str())
    .bind(format_timestamp(now))
    .execute(pool)
    .await?;

    Ok(Project {
        id: result.last_insert_rowid(),
        project_code,
        title: req.title.clone(),
        description: req.description.clone(),
        status: ProjectStatus::Created,
        created_at: now,
        updated_at: now,
    })
}

fn generate_project_code(now: chrono::DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("PRJ-{}-{}", now.format("%Y"), &suffix[..8].to_uppercase())
}

/// Load a project by ID.
pub async fn find_project(pool: &SqlitePool, id: i64) -> Result<Option<Project>> {
    let row = sqlx::query_as::<_, ProjectRow>(
        "SELECT id, project_code, title, description, status, created_at, updated_at FROM projects WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(Project::try_from).transpose()
}

/// Load all projects, newest first.
pub async fn load_all_projects(pool: &SqlitePool) -> Result<Vec<Project>> {
    let rows = sqlx::query_as::<_, ProjectRow>(
        "SELECT id, project_code, title, description, status, created_at, updated_at FROM projects ORDER BY id DESC",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Project::try_from).collect()
}

/// Read only the status of a project.
pub async fn find_project_status(pool: &SqlitePool, id: i64) -> Result<Option<ProjectStatus>> {
    let status: Option<(String,)> = sqlx::query_as("SELECT status FROM projects WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    status
        .map(|(label,)| label.parse::<ProjectStatus>().map_err(anyhow::Error::from))
        .transpose()
}

/// Set the status of a project. Returns false when the project does not exist.
pub async fn update_project_status(
    pool: &SqlitePool,
    id: i64,
    status: ProjectStatus,
) -> Result<bool> {
    let result = sqlx::query("UPDATE projects SET status = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(status.as_str())
        .bind(format_timestamp(Utc::now()))
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Load the aggregated geometry collection of a project as GeoJSON text.
pub async fn find_project_geometry(pool: &SqlitePool, project_id: i64) -> Result<Option<String>> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT geometry_data FROM project_geometries WHERE project_id = ?1")
            .bind(project_id)
            .fetch_optional(pool)
            .await?;

    Ok(row.map(|(geometry,)| geometry))
}

/// Append the features of `incoming` to the project's stored FeatureCollection.
///
/// A `Feature` is appended as-is and a bare geometry is wrapped in a Feature.
/// Returns the number of appended features.
pub async fn merge_project_geometry(
    pool: &SqlitePool,
    project_id: i64,
    incoming: &Value,
) -> Result<usize> {
    let mut tx = pool.begin().await?;

    let existing: Option<(String,)> =
        sqlx::query_as("SELECT geometry_data FROM project_geometries WHERE project_id = ?1")
            .bind(project_id)
            .fetch_optional(&mut *tx)
            .await?;

    let mut collection = match existing {
        Some((text,)) => serde_json::from_str::<Value>(&text).with_context(|| {
            format!("Stored geometry for project {} is not JSON", project_id)
        })?,
        None => Value::Null,
    };
    if collection.get("type").and_then(Value::as_str) != Some("FeatureCollection")
        || !collection.get("features").map(Value::is_array).unwrap_or(false)
    {
        collection = json!({ "type": "FeatureCollection", "features": [] });
    }

    let additions = incoming_features(incoming);
    let added = additions.len();
    if let Some(features) = collection.get_mut("features").and_then(Value::as_array_mut) {
        features.extend(additions);
    }

    let now = format_timestamp(Utc::now());
    sqlx::query(
        r#"
        INSERT INTO project_geometries (project_id, name, geometry_data, geometry_type, created_at, updated_at)
        VALUES (?1, ?2, ?3, 'collection', ?4, ?4)
        ON CONFLICT(project_id) DO UPDATE SET
            geometry_data = ?3,
            updated_at = ?4
        "#,
    )
    .bind(project_id)
    .bind(AGGREGATED_GEOMETRY_NAME)
    .bind(serde_json::to_string(&collection)?)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!(
        "Merged {} feature(s) into geometry collection for project {}",
        added,
        project_id
    );
    Ok(added)
}

fn incoming_features(incoming: &Value) -> Vec<Value> {
    match incoming.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => incoming
            .get("features")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        Some("Feature") => vec![incoming.clone()],
        _ => vec![json!({ "type": "Feature", "properties": {}, "geometry": incoming })],
    }
}

// Internal row type for SQLx
#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: i64,
    project_code: String,
    title: String,
    description: Option<String>,
    status: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ProjectRow> for Project {
    type Error = anyhow::Error;

    fn try_from(row: ProjectRow) -> Result<Self> {
        Ok(Project {
            id: row.id,
            project_code: row.project_code,
            title: row.title,
            description: row.description,
            status: row.status.parse()?,
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::init_database;

    async fn setup() -> (SqlitePool, Project) {
        let db = init_database(":memory:", 1).await.unwrap();
        let pool = db.pool().clone();
        let project = create_project(
            &pool,
            &CreateProjectRequest {
                title: "Survey flight".to_string(),
                project_code: None,
                description: None,
            },
        )
        .await
        .unwrap();
        (pool, project)
    }

    #[tokio::test]
    async fn status_updates_are_persisted() {
        let (pool, project) = setup().await;
        assert!(project.project_code.starts_with("PRJ-"));
        assert_eq!(
            find_project_status(&pool, project.id).await.unwrap(),
            Some(ProjectStatus::Created)
        );

        assert!(update_project_status(&pool, project.id, ProjectStatus::Pending)
            .await
            .unwrap());
        let loaded = find_project(&pool, project.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ProjectStatus::Pending);

        assert!(!update_project_status(&pool, 9999, ProjectStatus::Pending)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn merge_appends_features() {
        let (pool, project) = setup().await;
        assert!(find_project_geometry(&pool, project.id).await.unwrap().is_none());

        let point = json!({ "type": "Point", "coordinates": [1.0, 2.0] });
        let collection = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": {}, "geometry": point },
                { "type": "Feature", "properties": {}, "geometry": point }
            ]
        });

        assert_eq!(merge_project_geometry(&pool, project.id, &collection).await.unwrap(), 2);
        assert_eq!(merge_project_geometry(&pool, project.id, &point).await.unwrap(), 1);

        let stored = find_project_geometry(&pool, project.id).await.unwrap().unwrap();
        let stored: Value = serde_json::from_str(&stored).unwrap();
        assert_eq!(stored["type"], "FeatureCollection");
        assert_eq!(stored["features"].as_array().unwrap().len(), 3);
        assert_eq!(stored["features"][2]["geometry"], point);
    }
}
