//! Composite action - runs child actions in order, stopping at the first failure

use crate::action::{Action, ActionError, ActionOutcome};
use crate::core::ActionContext;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct CompositeAction {
    actions: Vec<Arc<dyn Action>>,
}

impl CompositeAction {
    pub fn new(actions: Vec<Arc<dyn Action>>) -> Self {
        Self { actions }
    }

    pub fn then(mut self, action: impl Action + 'static) -> Self {
        self.actions.push(Arc::new(action));
        self
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[async_trait]
impl Action for CompositeAction {
    fn describe(&self) -> String {
        let parts: Vec<String> = self.actions.iter().map(|a| a.describe()).collect();
        format!("all [{}]", parts.join(", "))
    }

    async fn run(&self, ctx: &ActionContext) -> Result<ActionOutcome, ActionError> {
        let mut output = String::new();

        for action in &self.actions {
            debug!("Composite running: {}", action.describe());
            let outcome = match action.run(ctx).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    return Err(ActionError::Failed(format!("{}: {}", action.describe(), e)));
                }
            };
            output.push_str(&outcome.output);

            if !outcome.passed {
                let reason = outcome.message.unwrap_or_else(|| "failed".to_string());
                return Ok(ActionOutcome::failure(format!("{}: {}", action.describe(), reason))
                    .with_output(output));
            }
        }

        Ok(ActionOutcome::success().with_output(output))
    }
}
