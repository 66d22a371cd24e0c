//! Core data models for protection-zone conflict analysis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a project submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Created but never submitted
    #[default]
    Created,
    /// Submitted, waiting for conflict analysis
    Pending,
    /// Analysis finished, waiting for a reviewer
    UnderReview,
    Accepted,
    Refused,
    Cancelled,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Created => "created",
            ProjectStatus::Pending => "pending",
            ProjectStatus::UnderReview => "under_review",
            ProjectStatus::Accepted => "accepted",
            ProjectStatus::Refused => "refused",
            ProjectStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(ProjectStatus::Created),
            "pending" => Ok(ProjectStatus::Pending),
            "under_review" => Ok(ProjectStatus::UnderReview),
            "accepted" => Ok(ProjectStatus::Accepted),
            "refused" => Ok(ProjectStatus::Refused),
            "cancelled" => Ok(ProjectStatus::Cancelled),
            other => Err(UnknownVariant::new("project status", other)),
        }
    }
}

/// Returned when a stored enum label does not match any known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// A proposed drone/aircraft operation awaiting review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub project_code: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    pub title: String,
    /// Generated when omitted
    #[serde(default)]
    pub project_code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

// ========== FLIGHT PROCEDURE PROTECTION ==========

/// Kind of protection area attached to a flight procedure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionType {
    #[default]
    OverallPrimary,
    OverallSecondary,
    NoiseAbatement,
    Environmental,
    ObstacleClearance,
    TerrainClearance,
    CommunicationZone,
    SurveillanceZone,
    BufferZone,
    RestrictedArea,
}

impl ProtectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtectionType::OverallPrimary => "overall_primary",
            ProtectionType::OverallSecondary => "overall_secondary",
            ProtectionType::NoiseAbatement => "noise_abatement",
            ProtectionType::Environmental => "environmental",
            ProtectionType::ObstacleClearance => "obstacle_clearance",
            ProtectionType::TerrainClearance => "terrain_clearance",
            ProtectionType::CommunicationZone => "communication_zone",
            ProtectionType::SurveillanceZone => "surveillance_zone",
            ProtectionType::BufferZone => "buffer_zone",
            ProtectionType::RestrictedArea => "restricted_area",
        }
    }
}

impl FromStr for ProtectionType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overall_primary" => Ok(ProtectionType::OverallPrimary),
            "overall_secondary" => Ok(ProtectionType::OverallSecondary),
            "noise_abatement" => Ok(ProtectionType::NoiseAbatement),
            "environmental" => Ok(ProtectionType::Environmental),
            "obstacle_clearance" => Ok(ProtectionType::ObstacleClearance),
            "terrain_clearance" => Ok(ProtectionType::TerrainClearance),
            "communication_zone" => Ok(ProtectionType::CommunicationZone),
            "surveillance_zone" => Ok(ProtectionType::SurveillanceZone),
            "buffer_zone" => Ok(ProtectionType::BufferZone),
            "restricted_area" => Ok(ProtectionType::RestrictedArea),
            other => Err(UnknownVariant::new("protection type", other)),
        }
    }
}

/// How serious a conflict with a protection area is considered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    Critical,
    High,
    #[default]
    Medium,
    Low,
    Informational,
}

impl ConflictSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictSeverity::Critical => "critical",
            ConflictSeverity::High => "high",
            ConflictSeverity::Medium => "medium",
            ConflictSeverity::Low => "low",
            ConflictSeverity::Informational => "informational",
        }
    }
}

impl FromStr for ConflictSeverity {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(ConflictSeverity::Critical),
            "high" => Ok(ConflictSeverity::High),
            "medium" => Ok(ConflictSeverity::Medium),
            "low" => Ok(ConflictSeverity::Low),
            "informational" => Ok(ConflictSeverity::Informational),
            other => Err(UnknownVariant::new("conflict severity", other)),
        }
    }
}

/// Restricted or cautioned airspace tied to a flight procedure.
///
/// Read-only from the analysis point of view: zones are created and edited
/// by procedure management. Only active zones are ever loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectionZone {
    pub procedure_id: i64,
    pub procedure_code: String,
    /// Protection area name, falls back to the procedure name
    pub name: String,
    pub protection_type: ProtectionType,
    pub severity: ConflictSeverity,
    /// Stored procedure priority, carried for reviewers
    pub analysis_priority: i32,
    /// GeoJSON text (Feature, FeatureCollection or bare geometry)
    pub geometry: String,
}

/// Instrument procedure family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProcedureType {
    Sid,
    Star,
    Approach,
    Departure,
    Arrival,
}

impl ProcedureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcedureType::Sid => "SID",
            ProcedureType::Star => "STAR",
            ProcedureType::Approach => "APPROACH",
            ProcedureType::Departure => "DEPARTURE",
            ProcedureType::Arrival => "ARRIVAL",
        }
    }
}

impl FromStr for ProcedureType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SID" => Ok(ProcedureType::Sid),
            "STAR" => Ok(ProcedureType::Star),
            "APPROACH" => Ok(ProcedureType::Approach),
            "DEPARTURE" => Ok(ProcedureType::Departure),
            "ARRIVAL" => Ok(ProcedureType::Arrival),
            other => Err(UnknownVariant::new("procedure type", other)),
        }
    }
}

/// A published flight procedure and its protection area.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightProcedure {
    pub id: i64,
    pub procedure_code: String,
    pub name: String,
    pub procedure_type: ProcedureType,
    pub airport_icao: String,
    pub runway: Option<String>,
    pub protection_name: Option<String>,
    pub protection_type: ProtectionType,
    pub conflict_severity: ConflictSeverity,
    pub analysis_priority: i32,
    pub protection_geometry: Option<serde_json::Value>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProcedureRequest {
    pub procedure_code: String,
    pub name: String,
    pub procedure_type: ProcedureType,
    pub airport_icao: String,
    #[serde(default)]
    pub runway: Option<String>,
    #[serde(default)]
    pub protection_name: Option<String>,
    #[serde(default)]
    pub protection_type: Option<ProtectionType>,
    #[serde(default)]
    pub conflict_severity: Option<ConflictSeverity>,
    #[serde(default)]
    pub analysis_priority: Option<i32>,
    #[serde(default)]
    pub protection_geometry: Option<serde_json::Value>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

// ========== CONFLICTS ==========

/// Persisted finding: one row per intersecting (project, protection zone) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub id: i64,
    pub project_id: i64,
    pub flight_procedure_id: i64,
    pub description: String,
    /// GeoJSON text; `{}` when the overlap shape could not be computed
    pub conflicting_geometry: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Conflict produced by an analysis run, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewConflict {
    pub project_id: i64,
    pub flight_procedure_id: i64,
    pub description: String,
    pub conflicting_geometry: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
