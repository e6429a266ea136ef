//! Pipeline graph - stages keyed by name with dependency edges

use crate::core::{error::ConfigError, stage::Stage};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A pipeline definition: a DAG of stages in insertion order
#[derive(Debug, Clone, Default)]
pub struct PipelineGraph {
    /// Pipeline name
    pub name: String,

    /// Global variables available to all actions
    variables: HashMap<String, String>,

    /// Stages by name, in insertion order
    stages: IndexMap<String, Arc<Stage>>,
}

impl PipelineGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: HashMap::new(),
            stages: IndexMap::new(),
        }
    }

    /// Add a stage, rejecting duplicate names
    pub fn add_stage(&mut self, stage: Stage) -> Result<(), ConfigError> {
        if stage.name.trim().is_empty() || stage.steps.iter().any(|s| s.name.trim().is_empty()) {
            return Err(ConfigError::EmptyName(stage.name));
        }
        if self.stages.contains_key(&stage.name) {
            return Err(ConfigError::DuplicateStage(stage.name));
        }
        self.stages.insert(stage.name.clone(), Arc::new(stage));
        Ok(())
    }

    /// Builder form of [`add_stage`](Self::add_stage)
    pub fn with_stage(mut self, stage: Stage) -> Result<Self, ConfigError> {
        self.add_stage(stage)?;
        Ok(self)
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn set_variable(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    pub fn variables(&self) -> &HashMap<String, String> {
        &self.variables
    }

    /// Get a stage by name
    pub fn stage(&self, name: &str) -> Option<&Arc<Stage>> {
        self.stages.get(name)
    }

    /// All stages in insertion order
    pub fn stages(&self) -> impl Iterator<Item = &Arc<Stage>> {
        self.stages.values()
    }

    /// Stages that directly depend on `name`, in insertion order
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        self.stages
            .values()
            .filter(|s| s.dependencies().iter().any(|d| d == name))
            .map(|s| s.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Check that every edge resolves and the dependency graph is acyclic
    pub fn validate(&self) -> Result<(), ConfigError> {
        for stage in self.stages.values() {
            for dep in stage.dependencies() {
                if !self.stages.contains_key(dep) {
                    return Err(ConfigError::UnknownDependency {
                        stage: stage.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        self.check_cycles()
    }

    fn check_cycles(&self) -> Result<(), ConfigError> {
        let mut visited = HashSet::new();
        let mut stack = Vec::new();

        for name in self.stages.keys() {
            if !visited.contains(name.as_str()) {
                self.dfs_check(name, &mut visited, &mut stack)?;
            }
        }

        Ok(())
    }

    fn dfs_check<'a>(
        &'a self,
        name: &'a str,
        visited: &mut HashSet<&'a str>,
        stack: &mut Vec<&'a str>,
    ) -> Result<(), ConfigError> {
        visited.insert(name);
        stack.push(name);

        if let Some(stage) = self.stages.get(name) {
            for dep in stage.dependencies() {
                if let Some(pos) = stack.iter().position(|s| *s == dep.as_str()) {
                    let mut path: Vec<String> = stack[pos..].iter().map(|s| s.to_string()).collect();
                    path.push(dep.clone());
                    return Err(ConfigError::Cycle { path });
                }
                if !visited.contains(dep.as_str()) {
                    self.dfs_check(dep, visited, stack)?;
                }
            }
        }

        stack.pop();
        Ok(())
    }

    /// Deterministic linearization of the stages
    ///
    /// Kahn's algorithm; whenever several stages are ready the one inserted
    /// first is emitted first.
    pub fn topological_order(&self) -> Result<Vec<String>, ConfigError> {
        self.validate()?;

        let mut remaining: Vec<usize> = self
            .stages
            .values()
            .map(|s| s.dependencies().len())
            .collect();
        let mut emitted = vec![false; self.stages.len()];
        let mut order = Vec::with_capacity(self.stages.len());

        while order.len() < self.stages.len() {
            let next = remaining
                .iter()
                .enumerate()
                .position(|(i, count)| *count == 0 && !emitted[i])
                .ok_or_else(|| ConfigError::Cycle { path: Vec::new() })?;

            emitted[next] = true;
            let (name, _) = self
                .stages
                .get_index(next)
                .ok_or_else(|| ConfigError::Cycle { path: Vec::new() })?;
            order.push(name.clone());

            for (i, stage) in self.stages.values().enumerate() {
                if stage.dependencies().iter().any(|d| d == name) {
                    remaining[i] -= 1;
                }
            }
        }

        Ok(order)
    }
}
