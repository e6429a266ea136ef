//! Persistence layer for run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteRunStore;

use crate::core::{RunReport, RunStatus, StageStatus, StepStatus};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run ID
    pub run_id: Uuid,

    /// Pipeline name
    pub pipeline: String,

    /// Overall status
    pub status: RunStatus,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Stages that passed, tolerated failures included
    pub passed_stages: usize,
    pub failed_stages: usize,
    pub skipped_stages: usize,
    pub total_stages: usize,

    /// Steps that ended `Failed`
    pub failed_steps: usize,
}

impl RunSummary {
    pub fn from_report(report: &RunReport) -> Self {
        Self {
            run_id: report.run_id(),
            pipeline: report.pipeline().to_string(),
            status: report.status(),
            started_at: report.started_at(),
            finished_at: report.finished_at(),
            passed_stages: report.count_stages(StageStatus::Passed)
                + report.count_stages(StageStatus::FailedTolerated),
            failed_stages: report.count_stages(StageStatus::Failed),
            skipped_stages: report.count_stages(StageStatus::Skipped),
            total_stages: report.stages().len(),
            failed_steps: report.count_steps(StepStatus::Failed),
        }
    }
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a run summary, replacing any previous one with the same id
    async fn save_run(&self, run: &RunSummary) -> Result<()>;

    /// Load a run by ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>>;

    /// List all runs for a pipeline, newest first
    async fn list_runs(&self, pipeline: &str) -> Result<Vec<RunSummary>>;

    /// List all pipeline names, sorted
    async fn list_pipelines(&self) -> Result<Vec<String>>;
}

/// In-memory persistence (for testing or ephemeral use)
#[derive(Default)]
pub struct InMemoryPersistence {
    runs: RwLock<HashMap<Uuid, RunSummary>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        self.runs.write().await.insert(run.run_id, run.clone());
        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        Ok(self.runs.read().await.get(&run_id).cloned())
    }

    async fn list_runs(&self, pipeline: &str) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let mut result: Vec<RunSummary> = runs
            .values()
            .filter(|r| r.pipeline == pipeline)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(result)
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let runs = self.runs.read().await;
        let mut names: Vec<String> = runs.values().map(|r| r.pipeline.clone()).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}
