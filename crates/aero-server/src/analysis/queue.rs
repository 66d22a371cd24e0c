//! Analysis job queue.
//!
//! Submissions enqueue a job and get an [`AnalysisTicket`] back. The
//! dispatcher loop drains the queue onto a bounded worker pool and holds a
//! per-project run token for the whole run, so two runs for the same project
//! never interleave.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex, OwnedMutexGuard};

use super::orchestrator::AnalysisReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("analysis queue is full")]
    Full,
    #[error("analysis queue is closed")]
    Closed,
}

/// A queued request to analyze one project.
#[derive(Debug)]
pub struct AnalysisJob {
    pub project_id: i64,
    done: oneshot::Sender<AnalysisReport>,
}

impl AnalysisJob {
    /// Hand the report to whoever holds the ticket. A dropped ticket is fine.
    pub fn complete(self, report: AnalysisReport) {
        let _ = self.done.send(report);
    }
}

/// Completion signal for one enqueued analysis.
#[derive(Debug)]
pub struct AnalysisTicket {
    project_id: i64,
    rx: oneshot::Receiver<AnalysisReport>,
}

impl AnalysisTicket {
    pub fn project_id(&self) -> i64 {
        self.project_id
    }

    /// Wait for the run to finish. `None` if the job was dropped at shutdown.
    pub async fn wait(self) -> Option<AnalysisReport> {
        self.rx.await.ok()
    }
}

/// Producer side of the analysis queue plus the last report per project.
#[derive(Clone)]
pub struct AnalysisQueue {
    tx: mpsc::Sender<AnalysisJob>,
    reports: Arc<DashMap<i64, AnalysisReport>>,
}

impl AnalysisQueue {
    /// Create a queue holding at most `capacity` waiting jobs.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AnalysisJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let queue = Self {
            tx,
            reports: Arc::new(DashMap::new()),
        };
        (queue, rx)
    }

    /// Enqueue an analysis without waiting for room.
    pub fn enqueue(&self, project_id: i64) -> Result<AnalysisTicket, QueueError> {
        let (done, rx) = oneshot::channel();
        self.tx
            .try_send(AnalysisJob { project_id, done })
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => QueueError::Full,
                mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
            })?;
        tracing::debug!("Queued conflict analysis for project {}", project_id);
        Ok(AnalysisTicket { project_id, rx })
    }

    pub fn last_report(&self, project_id: i64) -> Option<AnalysisReport> {
        self.reports.get(&project_id).map(|r| r.value().clone())
    }

    pub fn record(&self, report: AnalysisReport) {
        self.reports.insert(report.project_id, report);
    }
}

/// Per-project run tokens.
#[derive(Clone, Default)]
pub struct RunTokens {
    tokens: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

impl RunTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other run holds the token of `project_id`.
    pub async fn acquire(&self, project_id: i64) -> RunToken {
        let token = self.tokens.entry(project_id).or_default().clone();
        let guard = token.lock_owned().await;
        RunToken {
            project_id,
            guard: Some(guard),
            tokens: self.tokens.clone(),
        }
    }

    /// Number of projects with a running or waiting analysis.
    pub fn tracked(&self) -> usize {
        self.tokens.len()
    }
}

/// Held for the duration of one run. Releasing the last holder forgets the project.
pub struct RunToken {
    project_id: i64,
    guard: Option<OwnedMutexGuard<()>>,
    tokens: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

impl Drop for RunToken {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.tokens
            .remove_if(&self.project_id, |_, token| Arc::strong_count(token) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn full_and_closed_queues_reject_jobs() {
        let (queue, rx) = AnalysisQueue::new(1);
        let _ticket = queue.enqueue(1).unwrap();
        assert_eq!(queue.enqueue(2).unwrap_err(), QueueError::Full);

        drop(rx);
        assert_eq!(queue.enqueue(3).unwrap_err(), QueueError::Closed);
    }

    #[tokio::test]
    async fn dropped_job_resolves_ticket_to_none() {
        let (queue, mut rx) = AnalysisQueue::new(4);
        let ticket = queue.enqueue(5).unwrap();
        assert_eq!(ticket.project_id(), 5);

        let job = rx.recv().await.unwrap();
        assert_eq!(job.project_id, 5);
        drop(job);
        assert!(ticket.wait().await.is_none());
    }

    #[tokio::test]
    async fn run_token_serializes_one_project() {
        let tokens = RunTokens::new();
        let first = tokens.acquire(7).await;

        let waiting = tokio::spawn({
            let tokens = tokens.clone();
            async move {
                let _token = tokens.acquire(7).await;
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        // Other projects are not blocked
        let other = tokens.acquire(8).await;
        drop(other);

        drop(first);
        waiting.await.unwrap();
        assert_eq!(tokens.tracked(), 0);
    }
}
