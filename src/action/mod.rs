//! Actions - the opaque units of work a step invokes

pub mod agent;
pub mod check;
pub mod composite;
pub mod pattern;
pub mod process;
pub mod shell;

use crate::core::ActionContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

pub use crate::core::error::ActionError;
pub use agent::{AgentAction, ContextLimits};
pub use check::{CheckAction, CheckKind};
pub use composite::CompositeAction;
pub use pattern::ConditionPattern;
pub use shell::ShellAction;

/// Trait for action execution - allows for different implementations
///
/// The executor depends on nothing but this capability.
#[async_trait]
pub trait Action: Send + Sync + Debug {
    /// Short human-readable description used in logs and messages
    fn describe(&self) -> String;

    /// Run the action
    async fn run(&self, ctx: &ActionContext) -> Result<ActionOutcome, ActionError>;
}

/// Outcome of a completed action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Whether the action passed
    pub passed: bool,

    /// Short explanation, usually set on failure
    pub message: Option<String>,

    /// Captured output (may be empty)
    pub output: String,
}

impl ActionOutcome {
    pub fn success() -> Self {
        Self {
            passed: true,
            message: None,
            output: String::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: Some(message.into()),
            output: String::new(),
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }
}
