//! Normalized and repaired geometries for one analysis run.

use geo::Geometry;
use serde_json::Value;

use crate::geometry::GeometryEngine;
use crate::models::ProtectionZone;
use crate::normalize::{normalize, zone_geometry, IndexedGeometry, NormalizeError};
use crate::repair::{repair, RepairOutcome};

/// Transient set of simple geometries; never persisted.
#[derive(Debug, Clone, Default)]
pub struct GeometrySet {
    items: Vec<IndexedGeometry>,
    repaired: usize,
    unrepaired: usize,
}

impl GeometrySet {
    /// Normalize a payload and run every geometry through the repair stage.
    pub fn prepare<E: GeometryEngine + ?Sized>(engine: &E, payload: Value) -> Self {
        let mut set = GeometrySet::default();
        for item in normalize(engine, payload) {
            let fixed = repair(engine, item.geometry);
            match fixed.outcome {
                RepairOutcome::AlreadyValid => {}
                RepairOutcome::Repaired => set.repaired += 1,
                RepairOutcome::Unrepaired => set.unrepaired += 1,
            }
            set.items.push(IndexedGeometry {
                index: item.index,
                geometry: fixed.geometry,
            });
        }
        set
    }

    pub fn prepare_str<E: GeometryEngine + ?Sized>(
        engine: &E,
        text: &str,
    ) -> Result<Self, NormalizeError> {
        let payload: Value = serde_json::from_str(text)?;
        Ok(Self::prepare(engine, payload))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Geometries in source order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexedGeometry> {
        self.items.iter()
    }

    pub fn repaired_count(&self) -> usize {
        self.repaired
    }

    pub fn unrepaired_count(&self) -> usize {
        self.unrepaired
    }
}

/// Normalize and repair the geometry of one protection zone.
///
/// Returns `None` (with a diagnostic) when nothing usable can be extracted.
pub fn prepare_zone<E: GeometryEngine + ?Sized>(
    engine: &E,
    zone: &ProtectionZone,
) -> Option<Geometry<f64>> {
    let payload: Value = match serde_json::from_str(&zone.geometry) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(
                "Protection geometry for procedure {} is not JSON: {}",
                zone.procedure_id,
                err
            );
            return None;
        }
    };

    match zone_geometry(engine, payload) {
        Some(geometry) => Some(repair(engine, geometry).geometry),
        None => {
            tracing::warn!(
                "Could not parse protection geometry for procedure {}, skipping",
                zone.procedure_id
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PlanarEngine;
    use crate::models::{ConflictSeverity, ProtectionType};
    use serde_json::json;

    fn zone(geometry: &str) -> ProtectionZone {
        ProtectionZone {
            procedure_id: 7,
            procedure_code: "P7".to_string(),
            name: "Zone".to_string(),
            protection_type: ProtectionType::BufferZone,
            severity: ConflictSeverity::Low,
            analysis_priority: 50,
            geometry: geometry.to_string(),
        }
    }

    #[test]
    fn prepare_counts_repairs_and_keeps_order() {
        let payload = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "geometry": { "type": "Point", "coordinates": [0.0, 0.0] } },
                { "type": "Feature" },
                { "type": "Feature", "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 1.0], [1.0, 0.0], [0.0, 1.0], [0.0, 0.0]]]
                } }
            ]
        });
        let set = GeometrySet::prepare(&PlanarEngine, payload);
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().map(|g| g.index).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(set.repaired_count() + set.unrepaired_count(), 1);
    }

    #[test]
    fn zone_with_garbage_geometry_is_skipped() {
        assert!(prepare_zone(&PlanarEngine, &zone("{}")).is_none());
        assert!(prepare_zone(&PlanarEngine, &zone("not json")).is_none());
        assert!(prepare_zone(
            &PlanarEngine,
            &zone(r#"{"type":"Point","coordinates":[1.0,1.0]}"#)
        )
        .is_some());
    }
}
