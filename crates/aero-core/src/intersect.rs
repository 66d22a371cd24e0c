//! Pairwise intersection testing between project geometries and one zone.

use geo::Geometry;

use crate::geometry::GeometryEngine;
use crate::geometry_set::GeometrySet;

/// Result of testing every project geometry against a single zone.
#[derive(Debug, Clone, Default)]
pub struct ZoneHits {
    /// Feature indices of project geometries that intersect the zone
    pub hit_indices: Vec<usize>,
    /// Best-effort overlap shapes; may be shorter than `hit_indices`
    pub intersections: Vec<Geometry<f64>>,
}

impl ZoneHits {
    pub fn hit(&self) -> bool {
        !self.hit_indices.is_empty()
    }
}

/// Test each project geometry (in index order) against `zone`.
///
/// A failing predicate counts as "no hit" for that pair only; a failing
/// overlap computation still records the hit.
pub fn test_zone<E: GeometryEngine + ?Sized>(
    engine: &E,
    project: &GeometrySet,
    zone: &Geometry<f64>,
    procedure_id: i64,
) -> ZoneHits {
    let mut hits = ZoneHits::default();

    for item in project.iter() {
        match engine.intersects(&item.geometry, zone) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(err) => {
                tracing::error!(
                    "Intersection check between project geometry {} and procedure {} failed: {}",
                    item.index,
                    procedure_id,
                    err
                );
                continue;
            }
        }

        hits.hit_indices.push(item.index);
        match engine.intersection(&item.geometry, zone) {
            Ok(Some(shape)) => {
                tracing::debug!(
                    "Conflict found between project geometry {} and procedure {}",
                    item.index,
                    procedure_id
                );
                hits.intersections.push(shape);
            }
            Ok(None) => tracing::debug!(
                "Project geometry {} touches procedure {} without a shared shape",
                item.index,
                procedure_id
            ),
            Err(err) => tracing::warn!(
                "Could not compute intersection between project geometry {} and procedure {}: {}",
                item.index,
                procedure_id,
                err
            ),
        }
    }

    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{GeometryError, PlanarEngine};
    use serde_json::{json, Value};

    /// Delegates to the planar engine but fails selected operations.
    struct FlakyEngine {
        fail_intersects_for_points: bool,
        fail_intersection: bool,
    }

    impl GeometryEngine for FlakyEngine {
        fn parse(&self, value: &Value) -> Result<Geometry<f64>, GeometryError> {
            PlanarEngine.parse(value)
        }
        fn is_valid(&self, geometry: &Geometry<f64>) -> bool {
            PlanarEngine.is_valid(geometry)
        }
        fn repair(&self, geometry: &Geometry<f64>) -> Result<Geometry<f64>, GeometryError> {
            PlanarEngine.repair(geometry)
        }
        fn intersects(&self, a: &Geometry<f64>, b: &Geometry<f64>) -> Result<bool, GeometryError> {
            if self.fail_intersects_for_points && matches!(a, Geometry::Point(_)) {
                return Err(GeometryError::Panicked {
                    op: "intersects",
                    message: "boom".to_string(),
                });
            }
            PlanarEngine.intersects(a, b)
        }
        fn intersection(
            &self,
            a: &Geometry<f64>,
            b: &Geometry<f64>,
        ) -> Result<Option<Geometry<f64>>, GeometryError> {
            if self.fail_intersection {
                return Err(GeometryError::Panicked {
                    op: "intersection",
                    message: "numerical failure".to_string(),
                });
            }
            PlanarEngine.intersection(a, b)
        }
        fn to_geojson(&self, geometry: &Geometry<f64>) -> Result<String, GeometryError> {
            PlanarEngine.to_geojson(geometry)
        }
    }

    fn project() -> GeometrySet {
        GeometrySet::prepare(
            &PlanarEngine,
            json!({
                "type": "FeatureCollection",
                "features": [
                    { "type": "Feature", "geometry": { "type": "Point", "coordinates": [0.5, 0.5] } },
                    { "type": "Feature", "geometry": { "type": "Point", "coordinates": [9.0, 9.0] } },
                    { "type": "Feature", "geometry": {
                        "type": "LineString", "coordinates": [[-1.0, 0.5], [2.0, 0.5]]
                    } }
                ]
            }),
        )
    }

    fn zone() -> Geometry<f64> {
        PlanarEngine
            .parse(&json!({
                "type": "Polygon",
                "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
            }))
            .unwrap()
    }

    #[test]
    fn records_hits_in_index_order() {
        let hits = test_zone(&PlanarEngine, &project(), &zone(), 1);
        assert!(hits.hit());
        assert_eq!(hits.hit_indices, vec![0, 2]);
        assert_eq!(hits.intersections.len(), 2);
    }

    #[test]
    fn failed_predicate_only_skips_that_pair() {
        let engine = FlakyEngine {
            fail_intersects_for_points: true,
            fail_intersection: false,
        };
        let hits = test_zone(&engine, &project(), &zone(), 1);
        assert_eq!(hits.hit_indices, vec![2]);
    }

    #[test]
    fn failed_intersection_still_counts_as_hit() {
        let engine = FlakyEngine {
            fail_intersects_for_points: false,
            fail_intersection: true,
        };
        let hits = test_zone(&engine, &project(), &zone(), 1);
        assert!(hits.hit());
        assert_eq!(hits.hit_indices.len(), 2);
        assert!(hits.intersections.is_empty());
    }

    #[test]
    fn disjoint_zone_has_no_hits() {
        let far = PlanarEngine
            .parse(&json!({ "type": "Point", "coordinates": [50.0, 50.0] }))
            .unwrap();
        let hits = test_zone(&PlanarEngine, &project(), &far, 1);
        assert!(!hits.hit());
        assert!(hits.intersections.is_empty());
    }
}
