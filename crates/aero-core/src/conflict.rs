//! Conflict aggregation.
//!
//! Collapses every project-geometry hit against one protection zone into a
//! single conflict record, so each (project, zone) pair yields at most one row.

use chrono::Utc;
use geo::{Geometry, GeometryCollection};

use crate::geometry::GeometryEngine;
use crate::models::{NewConflict, ProtectionZone};

/// Stored when a hit was confirmed but no overlap shape could be produced.
pub const EMPTY_GEOMETRY: &str = "{}";

/// Deterministic conflict description for a zone.
pub fn describe(zone: &ProtectionZone) -> String {
    format!(
        "Conflict with procedure {} in protection area '{}'.",
        zone.procedure_id, zone.name
    )
}

/// Build the conflict record for one zone from its intersection shapes.
pub fn aggregate<E: GeometryEngine + ?Sized>(
    engine: &E,
    project_id: i64,
    zone: &ProtectionZone,
    mut intersections: Vec<Geometry<f64>>,
) -> NewConflict {
    let merged = match intersections.len() {
        0 => None,
        1 => intersections.pop(),
        _ => Some(Geometry::GeometryCollection(GeometryCollection(intersections))),
    };

    let conflicting_geometry = match merged {
        None => EMPTY_GEOMETRY.to_string(),
        Some(shape) => engine.to_geojson(&shape).unwrap_or_else(|err| {
            tracing::warn!(
                "Failed to export intersection geometry for procedure {}: {}",
                zone.procedure_id,
                err
            );
            EMPTY_GEOMETRY.to_string()
        }),
    };

    let now = Utc::now();
    NewConflict {
        project_id,
        flight_procedure_id: zone.procedure_id,
        description: describe(zone),
        conflicting_geometry,
        created_at: now,
        updated_at: now,
    }
}
