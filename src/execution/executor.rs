//! Step executor - runs the steps of one stage

use crate::{
    action::{ActionError, ActionOutcome},
    core::{
        ActionContext, AutofixOutcome, Phase, Stage, StageStatus, Step, StepAction, StepOutcome,
        StepStatus,
    },
    execution::{engine::EventBus, CancelToken, ExecutionEvent, RunRecorder},
};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Result of running a whole stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRun {
    pub status: StageStatus,
    pub reason: Option<String>,
    pub duration_ms: u64,
}

/// Executes steps: auto-fix first, then validation
pub struct StepExecutor {
    default_timeout: Option<Duration>,
    events: EventBus,
}

impl StepExecutor {
    pub fn new(default_timeout: Option<Duration>, events: EventBus) -> Self {
        Self {
            default_timeout,
            events,
        }
    }

    /// Run every step of `stage` in declaration order
    ///
    /// Stops at the first hard failure. Once `cancel` is set the stage stops
    /// before its next step; the step in flight always completes.
    pub async fn execute_stage(
        &self,
        stage: &Stage,
        base: &ActionContext,
        cancel: &CancelToken,
        recorder: &Mutex<RunRecorder>,
    ) -> StageRun {
        let started = Instant::now();
        let mut tolerated = false;

        for (index, step) in stage.steps.iter().enumerate() {
            if index > 0 && cancel.is_cancelled() {
                info!("Stage {} cancelled before step {}", stage.name, step.name);
                return StageRun {
                    status: StageStatus::Skipped,
                    reason: Some(format!("cancelled before step '{}'", step.name)),
                    duration_ms: elapsed_ms(started),
                };
            }

            self.events.emit(ExecutionEvent::StepStarted {
                stage: stage.name.clone(),
                step: step.name.clone(),
            });

            let outcome = self.execute(&stage.name, step, base).await;
            let status = outcome.status;

            self.events.emit(ExecutionEvent::StepFinished {
                outcome: outcome.clone(),
            });
            recorder.lock().await.record_step(outcome);

            match status {
                StepStatus::Passed => {}
                StepStatus::FailedTolerated => tolerated = true,
                StepStatus::Failed => {
                    return StageRun {
                        status: StageStatus::Failed,
                        reason: Some(format!("step '{}' failed", step.name)),
                        duration_ms: elapsed_ms(started),
                    };
                }
            }
        }

        StageRun {
            status: if tolerated {
                StageStatus::FailedTolerated
            } else {
                StageStatus::Passed
            },
            reason: None,
            duration_ms: elapsed_ms(started),
        }
    }

    /// Execute a step and return its outcome
    pub async fn execute(&self, stage: &str, step: &Step, base: &ActionContext) -> StepOutcome {
        let started = Instant::now();
        info!("Executing step: {}/{}", stage, step.name);

        let autofix = match &step.autofix {
            Some(autofix) => Some(self.execute_autofix(stage, step, autofix, base).await),
            None => None,
        };

        let ctx = base.for_step(stage, &step.name, Phase::Validate);
        let (passed, message) = match self.invoke(&step.validate, &ctx).await {
            Ok(outcome) => {
                debug!("Validation output for {}/{}: {}", stage, step.name, outcome.output);
                (outcome.passed, outcome.message)
            }
            Err(e) => {
                error!("Validation error for step {}/{}: {}", stage, step.name, e);
                (false, Some(e.to_string()))
            }
        };

        let status = if passed {
            info!("Step {}/{} passed", stage, step.name);
            StepStatus::Passed
        } else if step.continue_on_error {
            warn!("Step {}/{} failed (tolerated)", stage, step.name);
            StepStatus::FailedTolerated
        } else {
            warn!("Step {}/{} failed", stage, step.name);
            StepStatus::Failed
        };

        StepOutcome {
            stage: stage.to_string(),
            step: step.name.clone(),
            status,
            duration_ms: elapsed_ms(started),
            message: message.map(|m| ctx.mask(&m)),
            autofix,
        }
    }

    /// Auto-fix is best effort: every failure is logged and swallowed
    async fn execute_autofix(
        &self,
        stage: &str,
        step: &Step,
        autofix: &StepAction,
        base: &ActionContext,
    ) -> AutofixOutcome {
        let ctx = base.for_step(stage, &step.name, Phase::Autofix);
        let message = match self.invoke(autofix, &ctx).await {
            Ok(outcome) if outcome.passed => return AutofixOutcome::Applied,
            Ok(outcome) => outcome.message.unwrap_or_else(|| "auto-fix failed".to_string()),
            Err(e) => e.to_string(),
        };
        let message = ctx.mask(&message);

        warn!("Auto-fix for step {}/{} failed: {}", stage, step.name, message);
        self.events.emit(ExecutionEvent::AutofixFailed {
            stage: stage.to_string(),
            step: step.name.clone(),
            message: message.clone(),
        });
        AutofixOutcome::Failed { message }
    }

    /// Run one action under its timeout, turning panics into errors
    ///
    /// A timed-out action is dropped, which kills any process group it spawned.
    async fn invoke(
        &self,
        step_action: &StepAction,
        ctx: &ActionContext,
    ) -> Result<ActionOutcome, ActionError> {
        let run = AssertUnwindSafe(step_action.action.run(ctx)).catch_unwind();

        let result = match step_action.timeout.or(self.default_timeout) {
            Some(limit) => match timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => {
                    error!("Timeout for {} after {:?}", step_action.action.describe(), limit);
                    return Err(ActionError::Timeout(limit));
                }
            },
            None => run.await,
        };

        result.unwrap_or_else(|panic| Err(ActionError::Panicked(panic_message(&*panic))))
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
