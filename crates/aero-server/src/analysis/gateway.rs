//! Storage boundary used by the analysis orchestrator.

use anyhow::Result;
use async_trait::async_trait;

use aero_core::models::{NewConflict, ProjectStatus, ProtectionZone};

/// Typed access to everything an analysis run reads or writes.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Delete every conflict of a project. Returns the number of removed rows.
    async fn delete_conflicts(&self, project_id: i64) -> Result<u64>;

    /// Stored GeoJSON FeatureCollection of a project, if any.
    async fn project_geometry(&self, project_id: i64) -> Result<Option<String>>;

    /// Active protection zones in procedure order.
    async fn active_protection_zones(&self) -> Result<Vec<ProtectionZone>>;

    async fn insert_conflict(&self, conflict: &NewConflict) -> Result<i64>;

    async fn project_status(&self, project_id: i64) -> Result<Option<ProjectStatus>>;

    /// Returns false when the project does not exist.
    async fn set_project_status(&self, project_id: i64, status: ProjectStatus) -> Result<bool>;
}
