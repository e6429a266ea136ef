//! Action context - explicit run state handed to every action invocation

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Which half of a step an action is running for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Autofix,
    Validate,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Autofix => write!(f, "autofix"),
            Phase::Validate => write!(f, "validate"),
        }
    }
}

/// Execution context for a single action invocation
///
/// Carries everything an action may need from the surrounding run: variables,
/// secrets, the working directory and the position in the graph. Nothing is
/// read from ambient process state by the engine itself.
#[derive(Clone, Serialize, Deserialize)]
pub struct ActionContext {
    /// Unique id of the current run
    pub run_id: Uuid,

    /// Name of the pipeline being run
    pub pipeline: String,

    /// Stage currently executing (if any)
    pub stage: Option<String>,

    /// Step currently executing (if any)
    pub step: Option<String>,

    /// Auto-fix or validation
    pub phase: Phase,

    /// Global and user-defined variables
    pub variables: HashMap<String, String>,

    /// Secret values, exported to actions but masked in any reported text
    #[serde(skip)]
    secrets: HashMap<String, String>,

    /// Directory actions run in (process cwd when unset)
    pub working_dir: Option<PathBuf>,
}

impl ActionContext {
    /// Create a new empty context
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            pipeline: pipeline.into(),
            stage: None,
            step: None,
            phase: Phase::Validate,
            variables: HashMap::new(),
            secrets: HashMap::new(),
            working_dir: None,
        }
    }

    /// Set a variable
    pub fn set_variable(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    /// Get a variable
    pub fn get_variable(&self, key: &str) -> Option<&String> {
        self.variables.get(key)
    }

    /// Set a secret
    pub fn set_secret(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.secrets.insert(key.into(), value.into());
    }

    /// Get a secret
    pub fn get_secret(&self, key: &str) -> Option<&String> {
        self.secrets.get(key)
    }

    /// All secrets, for actions that export them
    pub fn secrets(&self) -> &HashMap<String, String> {
        &self.secrets
    }

    /// Derive the context for one phase of one step
    pub fn for_step(&self, stage: &str, step: &str, phase: Phase) -> Self {
        let mut context = self.clone();
        context.stage = Some(stage.to_string());
        context.step = Some(step.to_string());
        context.phase = phase;
        context
    }

    /// Replace variables in the form {{ variable_name }}
    pub fn render(&self, template: &str) -> String {
        let mut rendered = template.to_string();
        for (key, value) in &self.variables {
            let placeholder = format!("{{{{ {} }}}}", key);
            rendered = rendered.replace(&placeholder, value);
        }
        rendered
    }

    /// Mask every secret value occurring in `text`
    pub fn mask(&self, text: &str) -> String {
        let mut masked = text.to_string();
        for value in self.secrets.values().filter(|v| !v.is_empty()) {
            masked = masked.replace(value.as_str(), "***");
        }
        masked
    }
}

impl fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut secret_keys: Vec<&String> = self.secrets.keys().collect();
        secret_keys.sort();
        f.debug_struct("ActionContext")
            .field("run_id", &self.run_id)
            .field("pipeline", &self.pipeline)
            .field("stage", &self.stage)
            .field("step", &self.step)
            .field("phase", &self.phase)
            .field("variables", &self.variables)
            .field("secrets", &secret_keys)
            .field("working_dir", &self.working_dir)
            .finish()
    }
}

impl Default for ActionContext {
    fn default() -> Self {
        Self::new("")
    }
}
