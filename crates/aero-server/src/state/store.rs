//! Shared application state handed to every request handler.

use crate::analysis::AnalysisQueue;
use crate::config::Config;
use crate::persistence::Database;

pub struct AppState {
    db: Database,
    config: Config,
    queue: AnalysisQueue,
}

impl AppState {
    pub fn new(db: Database, config: Config, queue: AnalysisQueue) -> Self {
        Self { db, config, queue }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Queue used to trigger background conflict analysis.
    pub fn analysis_queue(&self) -> &AnalysisQueue {
        &self.queue
    }
}
