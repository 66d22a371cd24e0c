//! Conflict analysis: orchestration, storage boundary and job queue.

pub mod gateway;
pub mod orchestrator;
pub mod queue;

pub use gateway::PersistenceGateway;
pub use orchestrator::{AbortReason, AnalysisOrchestrator, AnalysisOutcome, AnalysisReport, RunState};
pub use queue::{AnalysisJob, AnalysisQueue, AnalysisTicket, QueueError, RunTokens};
