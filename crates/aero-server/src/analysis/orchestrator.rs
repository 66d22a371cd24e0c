//! Analysis orchestrator.
//!
//! Drives one full conflict analysis for a project:
//! clear stale conflicts, fetch inputs, normalize and repair, test every
//! active protection zone, persist one conflict per hit zone, and finally
//! move the project to `under_review`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use aero_core::models::{NewConflict, ProjectStatus};
use aero_core::{aggregate, prepare_zone, test_zone, GeometryEngine, GeometrySet};

use super::gateway::PersistenceGateway;

/// Orchestration states of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Fetching,
    Normalizing,
    Testing,
    Persisting,
    Completed,
    Aborted,
}

/// Why a run stopped before producing results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AbortReason {
    #[error("failed to clear stale conflicts: {0}")]
    ClearFailed(String),
    #[error("failed to fetch analysis inputs: {0}")]
    FetchFailed(String),
    #[error("project has no stored geometry")]
    NoProjectGeometry,
    #[error("stored project geometry is not JSON: {0}")]
    MalformedProjectGeometry(String),
    #[error("no active protection zones")]
    NoActiveZones,
    #[error("no usable project geometry after normalization")]
    EmptyGeometrySet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Completed {
        project_geometries: usize,
        zones_tested: usize,
        zones_skipped: usize,
        conflicts_found: usize,
        conflicts_persisted: usize,
        status_updated: bool,
    },
    Aborted(AbortReason),
}

/// Final, observable result of one run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub project_id: i64,
    pub outcome: AnalysisOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl AnalysisReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, AnalysisOutcome::Completed { .. })
    }
}

/// Tracks and logs state transitions of one run.
struct Run {
    project_id: i64,
    state: RunState,
}

impl Run {
    fn new(project_id: i64) -> Self {
        Self {
            project_id,
            state: RunState::Idle,
        }
    }

    fn advance(&mut self, next: RunState) {
        tracing::debug!(
            "Analysis of project {}: {:?} -> {:?}",
            self.project_id,
            self.state,
            next
        );
        self.state = next;
    }
}

/// Inputs fetched from storage.
struct Inputs {
    geometry: String,
    zones: Vec<aero_core::models::ProtectionZone>,
}

/// Runs conflict analysis against a persistence gateway and a geometry engine.
pub struct AnalysisOrchestrator<G: ?Sized> {
    gateway: Arc<G>,
    engine: Arc<dyn GeometryEngine>,
    call_timeout: Duration,
}

impl<G: ?Sized> Clone for AnalysisOrchestrator<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            engine: self.engine.clone(),
            call_timeout: self.call_timeout,
        }
    }
}

impl<G: PersistenceGateway + ?Sized> AnalysisOrchestrator<G> {
    pub fn new(gateway: Arc<G>, engine: Arc<dyn GeometryEngine>, call_timeout: Duration) -> Self {
        Self {
            gateway,
            engine,
            call_timeout,
        }
    }

    /// Analyze one project. Never fails: problems end up in the report and logs.
    pub async fn run(&self, project_id: i64) -> AnalysisReport {
        let started_at = Utc::now();
        let mut run = Run::new(project_id);
        tracing::info!("Starting conflict analysis for project {}", project_id);

        let outcome = match self.execute(&mut run).await {
            Ok(outcome) => {
                run.advance(RunState::Completed);
                outcome
            }
            Err(reason) => {
                run.advance(RunState::Aborted);
                tracing::warn!("Analysis of project {} aborted: {}", project_id, reason);
                AnalysisOutcome::Aborted(reason)
            }
        };

        let finished_at = Utc::now();
        if let AnalysisOutcome::Completed {
            conflicts_found,
            conflicts_persisted,
            ..
        } = &outcome
        {
            tracing::info!(
                "Conflict analysis for project {} finished: {} conflict(s) found, {} saved in {} ms",
                project_id,
                conflicts_found,
                conflicts_persisted,
                (finished_at - started_at).num_milliseconds()
            );
        }

        AnalysisReport {
            project_id,
            outcome,
            started_at,
            finished_at,
        }
    }

    async fn execute(&self, run: &mut Run) -> Result<AnalysisOutcome, AbortReason> {
        let project_id = run.project_id;

        run.advance(RunState::Fetching);
        let inputs = self.fetch(project_id).await?;

        run.advance(RunState::Normalizing);
        let engine = self.engine.as_ref();
        let project = GeometrySet::prepare_str(engine, &inputs.geometry)
            .map_err(|e| AbortReason::MalformedProjectGeometry(e.to_string()))?;
        if project.is_empty() {
            return Err(AbortReason::EmptyGeometrySet);
        }
        tracing::debug!(
            "Project {}: {} geometries ({} repaired, {} left invalid)",
            project_id,
            project.len(),
            project.repaired_count(),
            project.unrepaired_count()
        );

        run.advance(RunState::Testing);
        let mut zones_tested = 0;
        let mut zones_skipped = 0;
        let mut found: Vec<NewConflict> = Vec::new();
        for zone in &inputs.zones {
            let Some(zone_geometry) = prepare_zone(engine, zone) else {
                zones_skipped += 1;
                continue;
            };
            zones_tested += 1;

            let hits = test_zone(engine, &project, &zone_geometry, zone.procedure_id);
            if !hits.hit() {
                continue;
            }
            tracing::debug!(
                "Project {} hits procedure {} with geometries {:?}",
                project_id,
                zone.procedure_id,
                hits.hit_indices
            );
            found.push(aggregate(engine, project_id, zone, hits.intersections));
        }

        run.advance(RunState::Persisting);
        let mut conflicts_persisted = 0;
        for conflict in &found {
            match self
                .call("insert conflict", self.gateway.insert_conflict(conflict))
                .await
            {
                Ok(id) => {
                    conflicts_persisted += 1;
                    tracing::info!(
                        "Saved conflict {} for project {} with procedure {}",
                        id,
                        project_id,
                        conflict.flight_procedure_id
                    );
                }
                Err(e) => tracing::error!(
                    "Failed to save conflict for project {} with procedure {}: {}",
                    project_id,
                    conflict.flight_procedure_id,
                    e
                ),
            }
        }

        let status_updated = self.mark_under_review(project_id).await;

        Ok(AnalysisOutcome::Completed {
            project_geometries: project.len(),
            zones_tested,
            zones_skipped,
            conflicts_found: found.len(),
            conflicts_persisted,
            status_updated,
        })
    }

    async fn fetch(&self, project_id: i64) -> Result<Inputs, AbortReason> {
        let removed = self
            .call("delete conflicts", self.gateway.delete_conflicts(project_id))
            .await
            .map_err(|e| AbortReason::ClearFailed(e.to_string()))?;
        if removed > 0 {
            tracing::debug!("Removed {} stale conflict(s) for project {}", removed, project_id);
        }

        let geometry = self
            .call("load project geometry", self.gateway.project_geometry(project_id))
            .await
            .map_err(|e| AbortReason::FetchFailed(e.to_string()))?
            .filter(|text| !text.trim().is_empty())
            .ok_or(AbortReason::NoProjectGeometry)?;

        let zones = self
            .call("load protection zones", self.gateway.active_protection_zones())
            .await
            .map_err(|e| AbortReason::FetchFailed(e.to_string()))?;
        if zones.is_empty() {
            return Err(AbortReason::NoActiveZones);
        }

        Ok(Inputs { geometry, zones })
    }

    /// Attempted once; failures are only logged.
    async fn mark_under_review(&self, project_id: i64) -> bool {
        match self
            .call("read project status", self.gateway.project_status(project_id))
            .await
        {
            Ok(Some(ProjectStatus::Pending)) => {}
            Ok(Some(current)) => tracing::warn!(
                "Project {} is '{}' instead of 'pending' at the end of analysis",
                project_id,
                current
            ),
            Ok(None) => {
                tracing::error!("Project {} not found, status not updated", project_id);
                return false;
            }
            Err(e) => tracing::error!("Failed to read status of project {}: {}", project_id, e),
        }

        match self
            .call(
                "update project status",
                self.gateway
                    .set_project_status(project_id, ProjectStatus::UnderReview),
            )
            .await
        {
            Ok(true) => {
                tracing::info!("Project {} is now under review", project_id);
                true
            }
            Ok(false) => {
                tracing::error!("Project {} vanished before its status was updated", project_id);
                false
            }
            Err(e) => {
                tracing::error!("Failed to update status of project {}: {}", project_id, e);
                false
            }
        }
    }

    async fn call<T, F>(&self, what: &'static str, fut: F) -> anyhow::Result<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Gateway call '{}' timed out after {:?}", what, self.call_timeout);
                Err(anyhow::anyhow!("{} timed out after {:?}", what, self.call_timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aero_core::models::{ConflictSeverity, ProtectionType, ProtectionZone};
    use aero_core::{PlanarEngine, EMPTY_GEOMETRY};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Store {
        geometry: Option<String>,
        zones: Vec<ProtectionZone>,
        conflicts: Vec<NewConflict>,
        status: Option<ProjectStatus>,
        fail_delete: bool,
        fail_insert_for: Option<i64>,
        hang_zones: bool,
    }

    #[derive(Default)]
    struct MemoryGateway {
        store: Mutex<Store>,
    }

    #[async_trait]
    impl PersistenceGateway for MemoryGateway {
        async fn delete_conflicts(&self, _project_id: i64) -> anyhow::Result<u64> {
            let mut store = self.store.lock().unwrap();
            if store.fail_delete {
                anyhow::bail!("database is locked");
            }
            let removed = store.conflicts.len() as u64;
            store.conflicts.clear();
            Ok(removed)
        }

        async fn project_geometry(&self, _project_id: i64) -> anyhow::Result<Option<String>> {
            Ok(self.store.lock().unwrap().geometry.clone())
        }

        async fn active_protection_zones(&self) -> anyhow::Result<Vec<ProtectionZone>> {
            let (hang, zones) = {
                let store = self.store.lock().unwrap();
                (store.hang_zones, store.zones.clone())
            };
            if hang {
                std::future::pending::<()>().await;
            }
            Ok(zones)
        }

        async fn insert_conflict(&self, conflict: &NewConflict) -> anyhow::Result<i64> {
            let mut store = self.store.lock().unwrap();
            if store.fail_insert_for == Some(conflict.flight_procedure_id) {
                anyhow::bail!("constraint failed");
            }
            store.conflicts.push(conflict.clone());
            Ok(store.conflicts.len() as i64)
        }

        async fn project_status(&self, _project_id: i64) -> anyhow::Result<Option<ProjectStatus>> {
            Ok(self.store.lock().unwrap().status)
        }

        async fn set_project_status(
            &self,
            _project_id: i64,
            status: ProjectStatus,
        ) -> anyhow::Result<bool> {
            let mut store = self.store.lock().unwrap();
            match store.status {
                Some(_) => {
                    store.status = Some(status);
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }

    fn square(x: f64, y: f64, size: f64) -> Value {
        json!({
            "type": "Polygon",
            "coordinates": [[[x, y], [x + size, y], [x + size, y + size], [x, y + size], [x, y]]]
        })
    }

    fn collection(geometries: &[Value]) -> String {
        let features: Vec<Value> = geometries
            .iter()
            .map(|g| json!({ "type": "Feature", "properties": {}, "geometry": g }))
            .collect();
        json!({ "type": "FeatureCollection", "features": features }).to_string()
    }

    fn zone(procedure_id: i64, name: &str, geometry: &Value) -> ProtectionZone {
        ProtectionZone {
            procedure_id,
            procedure_code: format!("PROC-{}", procedure_id),
            name: name.to_string(),
            protection_type: ProtectionType::NoiseAbatement,
            severity: ConflictSeverity::Medium,
            analysis_priority: 50,
            geometry: geometry.to_string(),
        }
    }

    fn setup(store: Store) -> (AnalysisOrchestrator<MemoryGateway>, Arc<MemoryGateway>) {
        let gateway = Arc::new(MemoryGateway {
            store: Mutex::new(store),
        });
        let orchestrator = AnalysisOrchestrator::new(
            gateway.clone(),
            Arc::new(PlanarEngine::new()),
            Duration::from_millis(200),
        );
        (orchestrator, gateway)
    }

    #[tokio::test]
    async fn overlapping_quadrant_yields_one_conflict() {
        let (orchestrator, gateway) = setup(Store {
            geometry: Some(collection(&[square(0.0, 0.0, 1.0)])),
            zones: vec![zone(42, "Noise Zone A", &square(0.5, 0.5, 1.0))],
            status: Some(ProjectStatus::Pending),
            ..Store::default()
        });

        let report = orchestrator.run(1).await;
        assert!(report.is_completed());

        let store = gateway.store.lock().unwrap();
        assert_eq!(store.conflicts.len(), 1);
        let conflict = &store.conflicts[0];
        assert_eq!(conflict.flight_procedure_id, 42);
        assert!(conflict.description.contains("procedure 42"));
        assert!(conflict.description.contains("Noise Zone A"));
        assert_ne!(conflict.conflicting_geometry, EMPTY_GEOMETRY);
        let shape: Value = serde_json::from_str(&conflict.conflicting_geometry).unwrap();
        assert_eq!(shape["type"], "Polygon");
        assert_eq!(store.status, Some(ProjectStatus::UnderReview));
    }

    #[tokio::test]
    async fn several_hits_on_one_zone_collapse_into_one_conflict() {
        let (orchestrator, gateway) = setup(Store {
            geometry: Some(collection(&[
                square(0.0, 0.0, 1.0),
                square(2.0, 0.0, 1.0),
                square(10.0, 10.0, 1.0),
            ])),
            zones: vec![zone(7, "Wide", &square(0.5, 0.0, 2.0))],
            status: Some(ProjectStatus::Pending),
            ..Store::default()
        });

        let report = orchestrator.run(1).await;
        match report.outcome {
            AnalysisOutcome::Completed {
                conflicts_found, ..
            } => assert_eq!(conflicts_found, 1),
            other => panic!("unexpected outcome {:?}", other),
        }

        let store = gateway.store.lock().unwrap();
        assert_eq!(store.conflicts.len(), 1);
        let shape: Value = serde_json::from_str(&store.conflicts[0].conflicting_geometry).unwrap();
        assert_eq!(shape["type"], "GeometryCollection");
        assert_eq!(shape["geometries"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn rerun_replaces_previous_conflicts() {
        let (orchestrator, gateway) = setup(Store {
            geometry: Some(collection(&[square(0.0, 0.0, 1.0)])),
            zones: vec![
                zone(1, "A", &square(0.5, 0.5, 1.0)),
                zone(2, "B", &square(-0.5, -0.5, 1.0)),
            ],
            status: Some(ProjectStatus::Pending),
            ..Store::default()
        });

        orchestrator.run(1).await;
        let first = gateway.store.lock().unwrap().conflicts.len();
        orchestrator.run(1).await;
        let second = gateway.store.lock().unwrap().conflicts.len();

        assert_eq!(first, 2);
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn disjoint_project_still_goes_under_review() {
        let (orchestrator, gateway) = setup(Store {
            geometry: Some(collection(&[square(0.0, 0.0, 1.0)])),
            zones: vec![zone(3, "Far", &square(50.0, 50.0, 1.0))],
            status: Some(ProjectStatus::Pending),
            ..Store::default()
        });

        let report = orchestrator.run(1).await;
        assert_eq!(
            report.outcome,
            AnalysisOutcome::Completed {
                project_geometries: 1,
                zones_tested: 1,
                zones_skipped: 0,
                conflicts_found: 0,
                conflicts_persisted: 0,
                status_updated: true,
            }
        );
        let store = gateway.store.lock().unwrap();
        assert!(store.conflicts.is_empty());
        assert_eq!(store.status, Some(ProjectStatus::UnderReview));
    }

    #[tokio::test]
    async fn empty_collection_aborts_without_status_change() {
        let (orchestrator, gateway) = setup(Store {
            geometry: Some(collection(&[])),
            zones: vec![zone(3, "Any", &square(0.0, 0.0, 1.0))],
            status: Some(ProjectStatus::Pending),
            ..Store::default()
        });

        let report = orchestrator.run(1).await;
        assert_eq!(
            report.outcome,
            AnalysisOutcome::Aborted(AbortReason::EmptyGeometrySet)
        );
        let store = gateway.store.lock().unwrap();
        assert!(store.conflicts.is_empty());
        assert_eq!(store.status, Some(ProjectStatus::Pending));
    }

    #[tokio::test]
    async fn missing_inputs_abort() {
        let (orchestrator, _) = setup(Store {
            geometry: None,
            zones: vec![zone(3, "Any", &square(0.0, 0.0, 1.0))],
            status: Some(ProjectStatus::Pending),
            ..Store::default()
        });
        assert_eq!(
            orchestrator.run(1).await.outcome,
            AnalysisOutcome::Aborted(AbortReason::NoProjectGeometry)
        );

        let (orchestrator, gateway) = setup(Store {
            geometry: Some(collection(&[square(0.0, 0.0, 1.0)])),
            status: Some(ProjectStatus::Pending),
            ..Store::default()
        });
        assert_eq!(
            orchestrator.run(1).await.outcome,
            AnalysisOutcome::Aborted(AbortReason::NoActiveZones)
        );
        assert_eq!(
            gateway.store.lock().unwrap().status,
            Some(ProjectStatus::Pending)
        );
    }

    #[tokio::test]
    async fn failed_clear_aborts_before_inserting() {
        let (orchestrator, gateway) = setup(Store {
            geometry: Some(collection(&[square(0.0, 0.0, 1.0)])),
            zones: vec![zone(1, "A", &square(0.5, 0.5, 1.0))],
            status: Some(ProjectStatus::Pending),
            fail_delete: true,
            ..Store::default()
        });

        let report = orchestrator.run(1).await;
        assert!(matches!(
            report.outcome,
            AnalysisOutcome::Aborted(AbortReason::ClearFailed(_))
        ));
        assert!(gateway.store.lock().unwrap().conflicts.is_empty());
    }

    #[tokio::test]
    async fn hung_gateway_call_times_out() {
        let (orchestrator, gateway) = setup(Store {
            geometry: Some(collection(&[square(0.0, 0.0, 1.0)])),
            zones: vec![zone(1, "A", &square(0.5, 0.5, 1.0))],
            status: Some(ProjectStatus::Pending),
            hang_zones: true,
            ..Store::default()
        });

        let report = orchestrator.run(1).await;
        assert!(matches!(
            report.outcome,
            AnalysisOutcome::Aborted(AbortReason::FetchFailed(_))
        ));
        assert_eq!(
            gateway.store.lock().unwrap().status,
            Some(ProjectStatus::Pending)
        );
    }

    #[tokio::test]
    async fn one_failed_insert_does_not_stop_the_others() {
        let (orchestrator, gateway) = setup(Store {
            geometry: Some(collection(&[square(0.0, 0.0, 1.0)])),
            zones: vec![
                zone(1, "A", &square(0.5, 0.5, 1.0)),
                zone(2, "B", &square(-0.5, -0.5, 1.0)),
            ],
            status: Some(ProjectStatus::Pending),
            fail_insert_for: Some(1),
            ..Store::default()
        });

        let report = orchestrator.run(1).await;
        match report.outcome {
            AnalysisOutcome::Completed {
                conflicts_found,
                conflicts_persisted,
                status_updated,
                ..
            } => {
                assert_eq!(conflicts_found, 2);
                assert_eq!(conflicts_persisted, 1);
                assert!(status_updated);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        let store = gateway.store.lock().unwrap();
        assert_eq!(store.conflicts[0].flight_procedure_id, 2);
    }

    #[tokio::test]
    async fn unparsable_zone_is_skipped() {
        let mut broken = zone(9, "Broken", &square(0.0, 0.0, 1.0));
        broken.geometry = "not json".to_string();
        let (orchestrator, gateway) = setup(Store {
            geometry: Some(collection(&[square(0.0, 0.0, 1.0)])),
            zones: vec![broken, zone(10, "Good", &square(0.5, 0.5, 1.0))],
            status: Some(ProjectStatus::Pending),
            ..Store::default()
        });

        match orchestrator.run(1).await.outcome {
            AnalysisOutcome::Completed {
                zones_tested,
                zones_skipped,
                conflicts_persisted,
                ..
            } => {
                assert_eq!(zones_tested, 1);
                assert_eq!(zones_skipped, 1);
                assert_eq!(conflicts_persisted, 1);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(gateway.store.lock().unwrap().conflicts[0].flight_procedure_id, 10);
    }
}
