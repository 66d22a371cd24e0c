//! Persistence layer for the analysis server.
//!
//! Provides SQLite-backed storage for projects, their geometry collections,
//! flight procedures with protection areas, and conflicts.

pub mod conflicts;
pub mod db;
pub mod gateway;
pub mod procedures;
pub mod projects;

pub use db::{init_database, Database};
pub use gateway::SqliteGateway;
