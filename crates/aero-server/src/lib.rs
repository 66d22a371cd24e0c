//! Shared library surface for the analysis server, its binaries and tests.

pub mod analysis;
pub mod api;
pub mod config;
pub mod loops;
pub mod persistence;
pub mod state;
