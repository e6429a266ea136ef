//! Execution scheduler - determines which stages to run next

use crate::core::{PipelineGraph, StageStatus};
use std::collections::HashMap;

/// Tracks stage states and picks ready stages within the worker limit
#[derive(Debug)]
pub struct ExecutionScheduler {
    /// Stage names in topological order
    order: Vec<String>,
    dependencies: HashMap<String, Vec<String>>,
    states: HashMap<String, StageStatus>,
    workers: usize,
}

impl ExecutionScheduler {
    /// `order` must be a topological order of `graph`
    pub fn new(graph: &PipelineGraph, order: Vec<String>, workers: usize) -> Self {
        let dependencies = graph
            .stages()
            .map(|s| (s.name.clone(), s.dependencies().to_vec()))
            .collect();
        let states = order
            .iter()
            .map(|name| (name.clone(), StageStatus::Pending))
            .collect();

        Self {
            order,
            dependencies,
            states,
            workers: workers.max(1),
        }
    }

    pub fn state(&self, name: &str) -> Option<StageStatus> {
        self.states.get(name).copied()
    }

    pub fn running_count(&self) -> usize {
        self.states
            .values()
            .filter(|s| **s == StageStatus::Running)
            .count()
    }

    /// Pending stages whose dependencies all allow dependents, in
    /// topological order, limited by the free worker slots
    pub fn next_stages(&self) -> Vec<String> {
        let remaining = self.workers.saturating_sub(self.running_count());
        if remaining == 0 {
            return vec![];
        }

        self.order
            .iter()
            .filter(|name| self.state(name) == Some(StageStatus::Pending))
            .filter(|name| {
                self.deps(name)
                    .iter()
                    .all(|dep| self.state(dep).is_some_and(|s| s.allows_dependents()))
            })
            .take(remaining)
            .cloned()
            .collect()
    }

    pub fn mark_running(&mut self, name: &str) {
        self.set(name, StageStatus::Running);
    }

    pub fn finish(&mut self, name: &str, status: StageStatus) {
        debug_assert!(status.is_terminal(), "stage {} finished as {}", name, status);
        self.set(name, status);
    }

    /// Skip every pending stage with a failed or skipped dependency
    ///
    /// Walking in topological order makes a single pass transitive. Returns
    /// `(stage, reason)` for each newly skipped stage.
    pub fn skip_blocked(&mut self) -> Vec<(String, String)> {
        let mut skipped = Vec::new();

        for name in &self.order {
            if self.states.get(name) != Some(&StageStatus::Pending) {
                continue;
            }

            let blocker = self.deps(name).iter().find_map(|dep| match self.state(dep) {
                Some(StageStatus::Failed) => Some(format!("dependency '{}' failed", dep)),
                Some(StageStatus::Skipped) => Some(format!("dependency '{}' was skipped", dep)),
                _ => None,
            });

            if let Some(reason) = blocker {
                self.states.insert(name.clone(), StageStatus::Skipped);
                skipped.push((name.clone(), reason));
            }
        }

        skipped
    }

    /// Stages that never started, in topological order
    pub fn pending(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|name| self.state(name) == Some(StageStatus::Pending))
            .cloned()
            .collect()
    }

    fn deps(&self, name: &str) -> &[String] {
        self.dependencies.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    fn set(&mut self, name: &str, status: StageStatus) {
        if let Some(state) = self.states.get_mut(name) {
            *state = status;
        }
    }
}
