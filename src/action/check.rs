//! Check action - in-process predicates over the run context

use crate::action::{Action, ActionError, ActionOutcome};
use crate::core::ActionContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Built-in checks that can be declared in a pipeline file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// A context variable or secret is set and non-empty
    EnvSet(String),
    /// A file or directory exists (relative to the working directory)
    FileExists(String),
    /// A context variable has an exact value
    VariableEquals { name: String, value: String },
}

type CheckFn = dyn Fn(&ActionContext) -> Result<ActionOutcome, ActionError> + Send + Sync;

enum Check {
    Builtin(CheckKind),
    Custom { name: String, check: Arc<CheckFn> },
}

/// Action that evaluates a predicate without spawning a process
#[derive(Clone)]
pub struct CheckAction {
    check: Arc<Check>,
}

impl CheckAction {
    pub fn new(kind: CheckKind) -> Self {
        Self {
            check: Arc::new(Check::Builtin(kind)),
        }
    }

    pub fn env_set(name: impl Into<String>) -> Self {
        Self::new(CheckKind::EnvSet(name.into()))
    }

    pub fn file_exists(path: impl Into<String>) -> Self {
        Self::new(CheckKind::FileExists(path.into()))
    }

    /// Wrap an arbitrary predicate
    pub fn from_fn<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&ActionContext) -> Result<ActionOutcome, ActionError> + Send + Sync + 'static,
    {
        Self {
            check: Arc::new(Check::Custom {
                name: name.into(),
                check: Arc::new(check),
            }),
        }
    }

    fn evaluate(kind: &CheckKind, ctx: &ActionContext) -> ActionOutcome {
        match kind {
            CheckKind::EnvSet(name) => {
                let value = ctx.get_variable(name).or_else(|| ctx.get_secret(name));
                match value {
                    Some(v) if !v.is_empty() => ActionOutcome::success(),
                    _ => ActionOutcome::failure(format!("environment variable {} is not set", name)),
                }
            }
            CheckKind::FileExists(path) => {
                let path_obj = Path::new(path);
                let resolved = match &ctx.working_dir {
                    Some(base) if path_obj.is_relative() => base.join(path_obj),
                    _ => path_obj.to_path_buf(),
                };
                if resolved.exists() {
                    ActionOutcome::success()
                } else {
                    ActionOutcome::failure(format!("{} does not exist", resolved.display()))
                }
            }
            CheckKind::VariableEquals { name, value } => match ctx.get_variable(name) {
                Some(actual) if actual == value => ActionOutcome::success(),
                Some(actual) => ActionOutcome::failure(format!(
                    "variable {} is '{}', expected '{}'",
                    name, actual, value
                )),
                None => ActionOutcome::failure(format!("variable {} is not set", name)),
            },
        }
    }
}

impl fmt::Debug for CheckAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CheckAction").field(&self.describe()).finish()
    }
}

#[async_trait]
impl Action for CheckAction {
    fn describe(&self) -> String {
        match self.check.as_ref() {
            Check::Builtin(CheckKind::EnvSet(name)) => format!("check: env {} is set", name),
            Check::Builtin(CheckKind::FileExists(path)) => format!("check: {} exists", path),
            Check::Builtin(CheckKind::VariableEquals { name, value }) => {
                format!("check: {} == {}", name, value)
            }
            Check::Custom { name, .. } => format!("check: {}", name),
        }
    }

    async fn run(&self, ctx: &ActionContext) -> Result<ActionOutcome, ActionError> {
        match self.check.as_ref() {
            Check::Builtin(kind) => Ok(Self::evaluate(kind, ctx)),
            Check::Custom { check, .. } => (**check)(ctx),
        }
    }
}
