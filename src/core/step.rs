//! Step domain model

use crate::action::Action;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// An action bound to a step together with its timeout
#[derive(Clone)]
pub struct StepAction {
    pub action: Arc<dyn Action>,

    /// Per-invocation timeout (falls back to the executor default)
    pub timeout: Option<Duration>,
}

impl StepAction {
    pub fn new(action: impl Action + 'static) -> Self {
        Self {
            action: Arc::new(action),
            timeout: None,
        }
    }

    pub fn from_arc(action: Arc<dyn Action>) -> Self {
        Self {
            action,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl fmt::Debug for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepAction")
            .field("action", &self.action.describe())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A single step in a stage: best-effort auto-fix, then validation
#[derive(Debug, Clone)]
pub struct Step {
    /// Step name, unique within its stage by convention
    pub name: String,

    /// Optional auto-fix; its failures are logged and never fail the step
    pub autofix: Option<StepAction>,

    /// Mandatory validation
    pub validate: StepAction,

    /// Record validation failures as tolerated instead of failing the stage
    pub continue_on_error: bool,
}

impl Step {
    /// Create a step with only a validation action
    pub fn new(name: impl Into<String>, validate: impl Action + 'static) -> Self {
        Self {
            name: name.into(),
            autofix: None,
            validate: StepAction::new(validate),
            continue_on_error: false,
        }
    }

    pub fn with_autofix(mut self, autofix: impl Action + 'static) -> Self {
        self.autofix = Some(StepAction::new(autofix));
        self
    }

    pub fn continue_on_error(mut self, tolerate: bool) -> Self {
        self.continue_on_error = tolerate;
        self
    }

    /// Apply one timeout to both phases
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.validate.timeout = Some(timeout);
        if let Some(autofix) = self.autofix.as_mut() {
            autofix.timeout = Some(timeout);
        }
        self
    }
}
