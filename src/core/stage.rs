//! Stage domain model

use crate::core::step::Step;

/// An ordered group of steps with dependencies on other stages
#[derive(Debug, Clone)]
pub struct Stage {
    /// Unique stage name
    pub name: String,

    /// Steps, executed in declaration order
    pub steps: Vec<Step>,

    /// Names of stages that must finish before this one starts
    depends_on: Vec<String>,
}

impl Stage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            depends_on: Vec::new(),
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Add a dependency. Repeated names collapse into one edge.
    pub fn depends_on(mut self, stage: impl Into<String>) -> Self {
        self.add_dependency(stage);
        self
    }

    pub fn add_dependency(&mut self, stage: impl Into<String>) {
        let stage = stage.into();
        if !self.depends_on.contains(&stage) {
            self.depends_on.push(stage);
        }
    }

    /// Dependencies in declaration order
    pub fn dependencies(&self) -> &[String] {
        &self.depends_on
    }
}
