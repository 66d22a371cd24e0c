pub mod conflict;
pub mod geometry;
pub mod geometry_set;
pub mod intersect;
pub mod models;
pub mod normalize;
pub mod repair;

pub use conflict::{aggregate, describe, EMPTY_GEOMETRY};
pub use geometry::{geometry_kind, GeometryEngine, GeometryError, PlanarEngine};
pub use geometry_set::{prepare_zone, GeometrySet};
pub use intersect::{test_zone, ZoneHits};
pub use models::{
    Conflict, ConflictSeverity, CreateProcedureRequest, CreateProjectRequest, FlightProcedure,
    NewConflict, ProcedureType, Project, ProjectStatus, ProtectionType, ProtectionZone,
};
pub use normalize::{normalize, normalize_str, zone_geometry, IndexedGeometry, NormalizeError};
pub use repair::{repair, RepairOutcome, Repaired};
