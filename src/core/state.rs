//! Execution state models and the run report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Final status of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Passed,
    Failed,
    /// Validation failed but the step is configured to continue on error
    FailedTolerated,
}

/// What happened to a step's auto-fix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutofixOutcome {
    Applied,
    Failed { message: String },
}

/// State of a single stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageStatus {
    /// Stage is waiting for dependencies
    Pending,
    /// Stage is currently running
    Running,
    /// All steps passed
    Passed,
    /// Completed, but at least one tolerated step failure
    FailedTolerated,
    /// A step failed without continue-on-error
    Failed,
    /// Not run: a dependency did not succeed, or the run was cancelled
    Skipped,
}

impl StageStatus {
    /// Check if stage is in a terminal state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StageStatus::Pending | StageStatus::Running)
    }

    /// Whether dependents of a stage in this state may run
    pub fn allows_dependents(&self) -> bool {
        matches!(self, StageStatus::Passed | StageStatus::FailedTolerated)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageStatus::Pending => "pending",
            StageStatus::Running => "running",
            StageStatus::Passed => "passed",
            StageStatus::FailedTolerated => "failed (tolerated)",
            StageStatus::Failed => "failed",
            StageStatus::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Passed,
    /// At least one step ended `Failed`
    Failed,
    /// Nothing failed, but cancellation kept stages from running
    Cancelled,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        *self == RunStatus::Passed
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Passed => write!(f, "Passed"),
            RunStatus::Failed => write!(f, "Failed"),
            RunStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Passed" => Ok(RunStatus::Passed),
            "Failed" => Ok(RunStatus::Failed),
            "Cancelled" => Ok(RunStatus::Cancelled),
            other => Err(format!("Unknown run status: {}", other)),
        }
    }
}

/// Outcome of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub stage: String,
    pub step: String,
    pub status: StepStatus,
    pub duration_ms: u64,
    pub message: Option<String>,
    /// Present when the step has an auto-fix
    pub autofix: Option<AutofixOutcome>,
}

/// Outcome of one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub name: String,
    pub status: StageStatus,
    pub duration_ms: u64,
    /// Why the stage was skipped or stopped early
    pub reason: Option<String>,
}

/// Complete record of one pipeline execution
///
/// Built once by the executor; read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    run_id: Uuid,
    pipeline: String,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    stages: Vec<StageOutcome>,
    steps: Vec<StepOutcome>,
    status: RunStatus,
}

impl RunReport {
    /// Assemble a report. `stages` and `steps` must already be in report order.
    pub(crate) fn new(
        run_id: Uuid,
        pipeline: String,
        started_at: DateTime<Utc>,
        stages: Vec<StageOutcome>,
        steps: Vec<StepOutcome>,
        cancelled: bool,
    ) -> Self {
        let status = if steps.iter().any(|s| s.status == StepStatus::Failed)
            || stages.iter().any(|s| s.status == StageStatus::Failed)
        {
            RunStatus::Failed
        } else if cancelled && stages.iter().any(|s| s.status == StageStatus::Skipped) {
            RunStatus::Cancelled
        } else {
            RunStatus::Passed
        };

        Self {
            run_id,
            pipeline,
            started_at,
            finished_at: Utc::now(),
            stages,
            steps,
            status,
        }
    }

    /// Report for a graph that failed validation: nothing ran, the run failed
    pub(crate) fn rejected(
        run_id: Uuid,
        pipeline: String,
        started_at: DateTime<Utc>,
        stage_names: Vec<String>,
        reason: String,
    ) -> Self {
        let stages = stage_names
            .into_iter()
            .map(|name| StageOutcome {
                name,
                status: StageStatus::Skipped,
                duration_ms: 0,
                reason: Some(reason.clone()),
            })
            .collect();

        Self {
            run_id,
            pipeline,
            started_at,
            finished_at: Utc::now(),
            stages,
            steps: Vec::new(),
            status: RunStatus::Failed,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// True iff no step ended `Failed`
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Stage outcomes in topological order
    pub fn stages(&self) -> &[StageOutcome] {
        &self.stages
    }

    /// Step outcomes grouped by stage, declaration order within a stage
    pub fn steps(&self) -> &[StepOutcome] {
        &self.steps
    }

    pub fn stage(&self, name: &str) -> Option<&StageOutcome> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn stage_status(&self, name: &str) -> Option<StageStatus> {
        self.stage(name).map(|s| s.status)
    }

    /// Outcomes of the steps of one stage
    pub fn steps_of<'a>(&'a self, stage: &'a str) -> impl Iterator<Item = &'a StepOutcome> + 'a {
        self.steps.iter().filter(move |s| s.stage == stage)
    }

    pub fn step(&self, stage: &str, step: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.stage == stage && s.step == step)
    }

    pub fn count_stages(&self, status: StageStatus) -> usize {
        self.stages.iter().filter(|s| s.status == status).count()
    }

    pub fn count_steps(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }

    pub fn duration_ms(&self) -> u64 {
        self.finished_at
            .signed_duration_since(self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}
