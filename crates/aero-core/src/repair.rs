//! Validity repair applied to project and protection-zone geometries.

use geo::Geometry;

use crate::geometry::{geometry_kind, GeometryEngine};

/// What the repair stage did to a geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairOutcome {
    AlreadyValid,
    /// Replaced by its zero-distance buffer
    Repaired,
    /// Buffering failed or gave an invalid shape; the original is kept
    Unrepaired,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Repaired {
    pub geometry: Geometry<f64>,
    pub outcome: RepairOutcome,
}

/// Check validity and fall back to a zero-distance buffer.
///
/// Never fails: an unrepairable geometry is returned unchanged so the
/// intersection tests can still run on it.
pub fn repair<E: GeometryEngine + ?Sized>(engine: &E, geometry: Geometry<f64>) -> Repaired {
    if engine.is_valid(&geometry) {
        return Repaired {
            geometry,
            outcome: RepairOutcome::AlreadyValid,
        };
    }

    tracing::warn!(
        "{} geometry is invalid, attempting zero-distance buffer repair",
        geometry_kind(&geometry)
    );
    match engine.repair(&geometry) {
        Ok(fixed) => Repaired {
            geometry: fixed,
            outcome: RepairOutcome::Repaired,
        },
        Err(err) => {
            tracing::warn!("Geometry repair failed, keeping original: {}", err);
            Repaired {
                geometry,
                outcome: RepairOutcome::Unrepaired,
            }
        }
    }
}
