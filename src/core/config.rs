//! Pipeline configuration from YAML

use crate::action::{
    Action, AgentAction, CheckAction, CheckKind, CompositeAction, ConditionPattern, ContextLimits,
    ShellAction,
};
use crate::core::{PipelineGraph, Stage, Step, StepAction};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Global variables available to all actions
    #[serde(default)]
    pub variables: HashMap<String, String>,

    /// Number of stages that may run at once
    #[serde(default)]
    pub workers: Option<usize>,

    /// Default timeout for actions (in seconds)
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,

    /// Pipeline stages
    pub stages: Vec<StageConfig>,
}

/// Stage configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageConfig {
    /// Unique stage name
    pub name: String,

    /// Stages this stage depends on
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Steps, run in order
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    pub name: String,

    /// Best-effort fix run before validation
    #[serde(default)]
    pub autofix: Option<ActionConfig>,

    /// Validation that decides the step outcome
    pub validate: ActionConfig,

    /// Tolerate validation failures
    #[serde(default)]
    pub continue_on_error: bool,

    /// Timeout for this step's actions (overrides the executor default)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// An action definition
///
/// A bare string is shorthand for a shell command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionConfig {
    Command(String),
    Shell(ShellConfig),
    Check(CheckConfig),
    Composite(CompositeConfig),
    Agent(AgentConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShellConfig {
    /// Command line run through `sh -c`
    pub run: String,

    /// Output that must appear on stdout
    #[serde(default)]
    pub success_pattern: Option<String>,

    /// Whether to use regex pattern matching
    #[serde(default)]
    pub use_regex: bool,

    #[serde(default)]
    pub working_dir: Option<String>,

    /// Shell binary (defaults to `sh`)
    #[serde(default)]
    pub shell: Option<String>,

    /// Bytes of stdout/stderr kept per stream
    #[serde(default)]
    pub max_output_bytes: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckConfig {
    pub check: CheckKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompositeConfig {
    pub all: Vec<ActionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    pub agent: AgentSpec,
}

/// An external agent CLI fed a prompt on stdin
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentSpec {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    pub prompt: String,

    /// Files appended to the prompt, bounded by the limits below
    #[serde(default)]
    pub context_files: Vec<String>,

    #[serde(default)]
    pub max_files: Option<usize>,

    #[serde(default)]
    pub max_file_chars: Option<usize>,

    #[serde(default)]
    pub success_pattern: Option<String>,

    #[serde(default)]
    pub use_regex: bool,

    #[serde(default)]
    pub max_output_bytes: Option<usize>,
}

impl ActionConfig {
    /// Build the runtime action
    pub fn to_action(&self) -> Arc<dyn Action> {
        match self {
            ActionConfig::Command(run) => Arc::new(ShellAction::new(run.clone())),
            ActionConfig::Shell(shell) => {
                let mut action = ShellAction::new(shell.run.clone());
                if let Some(pattern) = &shell.success_pattern {
                    action = action.with_success_pattern(ConditionPattern::new(pattern, shell.use_regex));
                }
                if let Some(dir) = &shell.working_dir {
                    action = action.with_working_dir(dir);
                }
                if let Some(binary) = &shell.shell {
                    action = action.with_shell(binary);
                }
                if let Some(limit) = shell.max_output_bytes {
                    action = action.with_output_limit(limit);
                }
                Arc::new(action)
            }
            ActionConfig::Check(check) => Arc::new(CheckAction::new(check.check.clone())),
            ActionConfig::Composite(composite) => Arc::new(CompositeAction::new(
                composite.all.iter().map(|a| a.to_action()).collect(),
            )),
            ActionConfig::Agent(AgentConfig { agent }) => {
                let defaults = ContextLimits::default();
                let mut action = AgentAction::new(agent.program.clone(), agent.prompt.clone())
                    .with_args(agent.args.clone())
                    .with_limits(ContextLimits {
                        max_files: agent.max_files.unwrap_or(defaults.max_files),
                        max_file_chars: agent.max_file_chars.unwrap_or(defaults.max_file_chars),
                    });
                for file in &agent.context_files {
                    action = action.with_context_file(file.clone());
                }
                if let Some(pattern) = &agent.success_pattern {
                    action = action.with_success_pattern(ConditionPattern::new(pattern, agent.use_regex));
                }
                if let Some(limit) = agent.max_output_bytes {
                    action = action.with_output_limit(limit);
                }
                Arc::new(action)
            }
        }
    }
}

impl StepConfig {
    fn to_step(&self) -> Step {
        let timeout = self.timeout_secs.map(Duration::from_secs);
        let with_timeout = |action: StepAction| match timeout {
            Some(t) => action.with_timeout(t),
            None => action,
        };

        Step {
            name: self.name.clone(),
            autofix: self
                .autofix
                .as_ref()
                .map(|a| with_timeout(StepAction::from_arc(a.to_action()))),
            validate: with_timeout(StepAction::from_arc(self.validate.to_action())),
            continue_on_error: self.continue_on_error,
        }
    }
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration by building its graph
    pub fn validate(&self) -> Result<()> {
        if self.workers == Some(0) {
            anyhow::bail!("workers must be at least 1");
        }
        self.to_graph()?;
        Ok(())
    }

    /// Convert config to a validated pipeline graph
    pub fn to_graph(&self) -> Result<PipelineGraph> {
        let mut graph = PipelineGraph::new(self.name.clone());
        for (key, value) in &self.variables {
            graph.set_variable(key.clone(), value.clone());
        }

        for stage_config in &self.stages {
            let mut stage = Stage::new(stage_config.name.clone());
            for dep in &stage_config.depends_on {
                stage.add_dependency(dep.clone());
            }
            stage.steps = stage_config.steps.iter().map(StepConfig::to_step).collect();
            graph.add_stage(stage)?;
        }

        graph.validate()?;
        Ok(graph)
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_secs.map(Duration::from_secs)
    }
}
