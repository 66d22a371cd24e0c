//! Analysis dispatcher loop.
//!
//! Drains the analysis queue and runs each job on a bounded worker pool.
//! A job is only taken off the queue once a worker slot is free, so waiting
//! jobs stay in the queue and count against its capacity. Jobs for the same
//! project then wait for the project's run token.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, OwnedSemaphorePermit, Semaphore};

use aero_core::PlanarEngine;

use crate::analysis::{AnalysisJob, AnalysisOrchestrator, AnalysisQueue, PersistenceGateway, RunTokens};
use crate::config::Config;
use crate::persistence::{Database, SqliteGateway};

/// Wire the SQLite gateway and planar engine into an orchestrator and spawn
/// the dispatcher. Returns the queue handlers submit to.
pub fn spawn_analysis(
    db: Database,
    config: &Config,
    shutdown: broadcast::Receiver<()>,
) -> AnalysisQueue {
    let orchestrator = AnalysisOrchestrator::new(
        Arc::new(SqliteGateway::new(db)),
        Arc::new(PlanarEngine::new()),
        config.gateway_timeout(),
    );
    let (queue, rx) = AnalysisQueue::new(config.analysis_queue_capacity);
    tokio::spawn(run_analysis_loop(
        orchestrator,
        queue.clone(),
        rx,
        config.analysis_workers,
        shutdown,
    ));
    queue
}

pub async fn run_analysis_loop<G>(
    orchestrator: AnalysisOrchestrator<G>,
    queue: AnalysisQueue,
    mut rx: mpsc::Receiver<AnalysisJob>,
    workers: usize,
    mut shutdown: broadcast::Receiver<()>,
) where
    G: PersistenceGateway + ?Sized + 'static,
{
    let permits = Arc::new(Semaphore::new(workers.max(1)));
    let tokens = RunTokens::new();
    tracing::info!("Analysis dispatcher started with {} worker(s)", workers.max(1));

    loop {
        // Hold a worker slot before taking a job so the queue itself is the backlog.
        let permit = tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Analysis dispatcher shutting down");
                break;
            }
            permit = permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::warn!("Worker pool closed, stopping analysis dispatcher");
                    break;
                }
            },
        };

        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Analysis dispatcher shutting down");
                break;
            }
            maybe_job = rx.recv() => {
                match maybe_job {
                    Some(job) => {
                        tokio::spawn(run_job(
                            orchestrator.clone(),
                            queue.clone(),
                            tokens.clone(),
                            permit,
                            job,
                        ));
                    }
                    None => {
                        tracing::info!("Analysis queue closed");
                        break;
                    }
                }
            }
        }
    }
}

async fn run_job<G>(
    orchestrator: AnalysisOrchestrator<G>,
    queue: AnalysisQueue,
    tokens: RunTokens,
    _permit: OwnedSemaphorePermit,
    job: AnalysisJob,
) where
    G: PersistenceGateway + ?Sized + 'static,
{
    let project_id = job.project_id;
    let _token = tokens.acquire(project_id).await;

    let report = orchestrator.run(project_id).await;
    queue.record(report.clone());
    job.complete(report);
}
