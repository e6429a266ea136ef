//! Main execution engine - orchestrates the entire pipeline run

use crate::{
    core::{
        ActionContext, ConfigError, PipelineGraph, RunReport, RunStatus, StageOutcome,
        StageStatus, StepOutcome,
    },
    execution::{
        executor::panic_message, CancelToken, ExecutionScheduler, RunRecorder, StageRun,
        StepExecutor,
    },
};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        pipeline: String,
        stages: usize,
    },
    StageStarted {
        stage: String,
    },
    StepStarted {
        stage: String,
        step: String,
    },
    AutofixFailed {
        stage: String,
        step: String,
        message: String,
    },
    StepFinished {
        outcome: StepOutcome,
    },
    StageFinished {
        stage: String,
        status: StageStatus,
        duration_ms: u64,
    },
    StageSkipped {
        stage: String,
        reason: String,
    },
    RunFinished {
        run_id: Uuid,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Fan-out of execution events to every registered handler
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<Vec<EventHandler>>,
}

impl EventBus {
    /// Deliver `event` to every handler. A panicking handler is logged and
    /// does not stop delivery or the run.
    pub fn emit(&self, event: ExecutionEvent) {
        for handler in self.handlers.iter() {
            let event = event.clone();
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                error!("Event handler panicked: {}", panic_message(&*panic));
            }
        }
    }
}

/// Options for a single run
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Maximum number of stages running at once
    pub workers: usize,

    /// Timeout for actions that do not set their own
    pub default_timeout: Option<Duration>,

    /// Cancellation signal for the run
    pub cancel: CancelToken,

    /// Variables layered over the graph's variables
    pub variables: HashMap<String, String>,

    /// Process environment snapshot, layered beneath the graph's variables
    pub environment: HashMap<String, String>,

    /// Secrets exported to actions and masked in outcomes
    pub secrets: HashMap<String, String>,

    /// Working directory for actions
    pub working_dir: Option<PathBuf>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().max(1),
            default_timeout: None,
            cancel: CancelToken::new(),
            variables: HashMap::new(),
            environment: HashMap::new(),
            secrets: HashMap::new(),
            working_dir: None,
        }
    }
}

impl ExecuteOptions {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Seed the run with environment variables; graph and option
    /// variables of the same name win
    pub fn with_environment<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.environment
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_secret(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(key.into(), value.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// Run a graph with the given options
pub async fn execute(graph: &PipelineGraph, options: ExecuteOptions) -> RunReport {
    Executor::new(options).execute(graph).await
}

/// Main pipeline execution engine
pub struct Executor {
    options: ExecuteOptions,
    handlers: Vec<EventHandler>,
}

impl Executor {
    pub fn new(options: ExecuteOptions) -> Self {
        Self {
            options,
            handlers: Vec::new(),
        }
    }

    /// Add an event handler
    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Token that cancels runs of this executor
    pub fn cancel_token(&self) -> CancelToken {
        self.options.cancel.clone()
    }

    /// Execute the entire pipeline
    ///
    /// Never fails: an invalid graph yields a failed report in which no
    /// action ran.
    pub async fn execute(&self, graph: &PipelineGraph) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = chrono::Utc::now();

        match self.run(graph, run_id).await {
            Ok(report) => report,
            Err(e) => {
                error!("Pipeline {} rejected: {}", graph.name, e);
                let events = self.event_bus();
                let names: Vec<String> = graph.stages().map(|s| s.name.clone()).collect();
                for stage in &names {
                    events.emit(ExecutionEvent::StageSkipped {
                        stage: stage.clone(),
                        reason: e.to_string(),
                    });
                }
                events.emit(ExecutionEvent::RunFinished {
                    run_id,
                    status: RunStatus::Failed,
                });
                RunReport::rejected(run_id, graph.name.clone(), started_at, names, e.to_string())
            }
        }
    }

    /// Like [`execute`](Self::execute), but surfaces an invalid graph as an error
    pub async fn try_execute(&self, graph: &PipelineGraph) -> Result<RunReport, ConfigError> {
        self.run(graph, Uuid::new_v4()).await
    }

    fn event_bus(&self) -> EventBus {
        EventBus {
            handlers: Arc::new(self.handlers.clone()),
        }
    }

    fn base_context(&self, graph: &PipelineGraph, run_id: Uuid) -> ActionContext {
        let mut context = ActionContext::new(graph.name.clone());
        context.run_id = run_id;
        context.variables.extend(self.options.environment.clone());
        context.variables.extend(graph.variables().clone());
        context.variables.extend(self.options.variables.clone());
        for (key, value) in &self.options.secrets {
            context.set_secret(key.clone(), value.clone());
        }
        context.working_dir = self.options.working_dir.clone();
        context
    }

    async fn run(&self, graph: &PipelineGraph, run_id: Uuid) -> Result<RunReport, ConfigError> {
        let order = graph.topological_order()?;
        let events = self.event_bus();
        let cancel = self.options.cancel.clone();

        info!(
            "Starting pipeline execution: {} ({}) with {} worker(s)",
            graph.name, run_id, self.options.workers
        );
        events.emit(ExecutionEvent::RunStarted {
            run_id,
            pipeline: graph.name.clone(),
            stages: order.len(),
        });

        let base = Arc::new(self.base_context(graph, run_id));
        let recorder = Arc::new(Mutex::new(RunRecorder::new(run_id, graph.name.clone())));
        let executor = Arc::new(StepExecutor::new(self.options.default_timeout, events.clone()));
        let mut scheduler = ExecutionScheduler::new(graph, order.clone(), self.options.workers);
        let mut running = FuturesUnordered::new();

        // Main execution loop
        loop {
            for (stage, reason) in scheduler.skip_blocked() {
                info!("Skipping stage {}: {}", stage, reason);
                Self::record_skip(&recorder, &events, stage, reason).await;
            }

            if !cancel.is_cancelled() {
                for name in scheduler.next_stages() {
                    let Some(stage) = graph.stage(&name).cloned() else {
                        continue;
                    };
                    scheduler.mark_running(&name);
                    info!("Starting stage: {}", name);
                    events.emit(ExecutionEvent::StageStarted { stage: name.clone() });

                    let executor = executor.clone();
                    let base = base.clone();
                    let cancel = cancel.clone();
                    let recorder = recorder.clone();
                    let handle = tokio::spawn(async move {
                        executor.execute_stage(&stage, &base, &cancel, &recorder).await
                    });
                    running.push(async move { (name, handle.await) });
                }
            }

            let Some((name, result)) = running.next().await else {
                break;
            };

            let run = result.unwrap_or_else(|e| {
                error!("Stage {} task aborted: {}", name, e);
                StageRun {
                    status: StageStatus::Failed,
                    reason: Some(format!("stage task aborted: {}", e)),
                    duration_ms: 0,
                }
            });

            info!("Stage {} finished: {}", name, run.status);
            scheduler.finish(&name, run.status);
            events.emit(ExecutionEvent::StageFinished {
                stage: name.clone(),
                status: run.status,
                duration_ms: run.duration_ms,
            });
            recorder.lock().await.record_stage(StageOutcome {
                name,
                status: run.status,
                duration_ms: run.duration_ms,
                reason: run.reason,
            });
        }

        let cancelled = cancel.is_cancelled();
        for stage in scheduler.pending() {
            warn!("Stage {} not started: run cancelled", stage);
            scheduler.finish(&stage, StageStatus::Skipped);
            Self::record_skip(&recorder, &events, stage, "cancelled".to_string()).await;
        }

        let recorder = match Arc::try_unwrap(recorder) {
            Ok(recorder) => recorder.into_inner(),
            Err(shared) => {
                // Only reachable if a stage task outlived the loop.
                let mut guard = shared.lock().await;
                std::mem::replace(&mut *guard, RunRecorder::new(run_id, graph.name.clone()))
            }
        };
        let report = recorder.finish(&order, cancelled);

        info!(
            "Pipeline execution finished: {} - {}",
            graph.name,
            report.status()
        );
        events.emit(ExecutionEvent::RunFinished {
            run_id,
            status: report.status(),
        });

        Ok(report)
    }

    async fn record_skip(
        recorder: &Mutex<RunRecorder>,
        events: &EventBus,
        stage: String,
        reason: String,
    ) {
        events.emit(ExecutionEvent::StageSkipped {
            stage: stage.clone(),
            reason: reason.clone(),
        });
        recorder.lock().await.record_stage(StageOutcome {
            name: stage,
            status: StageStatus::Skipped,
            duration_ms: 0,
            reason: Some(reason),
        });
    }
}
