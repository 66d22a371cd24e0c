//! SQLite implementation of the analysis persistence gateway.

use anyhow::Result;
use async_trait::async_trait;

use aero_core::models::{NewConflict, ProjectStatus, ProtectionZone};

use super::{conflicts, procedures, projects, Database};
use crate::analysis::PersistenceGateway;

#[derive(Clone)]
pub struct SqliteGateway {
    db: Database,
}

impl SqliteGateway {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PersistenceGateway for SqliteGateway {
    async fn delete_conflicts(&self, project_id: i64) -> Result<u64> {
        conflicts::delete_conflicts_for_project(self.db.pool(), project_id).await
    }

    async fn project_geometry(&self, project_id: i64) -> Result<Option<String>> {
        projects::find_project_geometry(self.db.pool(), project_id).await
    }

    async fn active_protection_zones(&self) -> Result<Vec<ProtectionZone>> {
        procedures::load_active_protection_zones(self.db.pool()).await
    }

    async fn insert_conflict(&self, conflict: &NewConflict) -> Result<i64> {
        conflicts::insert_conflict(self.db.pool(), conflict).await
    }

    async fn project_status(&self, project_id: i64) -> Result<Option<ProjectStatus>> {
        projects::find_project_status(self.db.pool(), project_id).await
    }

    async fn set_project_status(&self, project_id: i64, status: ProjectStatus) -> Result<bool> {
        projects::update_project_status(self.db.pool(), project_id, status).await
    }
}
