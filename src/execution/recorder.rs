//! Append-only collection of outcomes while a run is in flight

use crate::core::{RunReport, StageOutcome, StepOutcome};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// Collects outcomes from every worker, then seals them into a [`RunReport`]
#[derive(Debug)]
pub struct RunRecorder {
    run_id: Uuid,
    pipeline: String,
    started_at: DateTime<Utc>,
    steps: Vec<StepOutcome>,
    stages: HashMap<String, StageOutcome>,
}

impl RunRecorder {
    pub fn new(run_id: Uuid, pipeline: impl Into<String>) -> Self {
        Self {
            run_id,
            pipeline: pipeline.into(),
            started_at: Utc::now(),
            steps: Vec::new(),
            stages: HashMap::new(),
        }
    }

    pub fn record_step(&mut self, outcome: StepOutcome) {
        self.steps.push(outcome);
    }

    /// Record the final outcome of a stage. The first record for a stage wins.
    pub fn record_stage(&mut self, outcome: StageOutcome) {
        self.stages.entry(outcome.name.clone()).or_insert(outcome);
    }

    /// Seal the report, ordering stages and their steps by `order`
    ///
    /// Steps keep their recorded order within a stage, which is declaration
    /// order since a stage runs its steps sequentially.
    pub fn finish(self, order: &[String], cancelled: bool) -> RunReport {
        let RunRecorder {
            run_id,
            pipeline,
            started_at,
            steps,
            mut stages,
        } = self;

        let position: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let mut steps = steps;
        // Stable sort keeps per-stage step order intact.
        steps.sort_by_key(|s| position.get(s.stage.as_str()).copied().unwrap_or(usize::MAX));

        let stages = order.iter().filter_map(|name| stages.remove(name)).collect();

        RunReport::new(run_id, pipeline, started_at, stages, steps, cancelled)
    }
}
