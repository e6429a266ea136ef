//! stagerun - run graphs of stages whose steps auto-fix, then validate

pub mod action;
pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod report;

// Re-export commonly used types
pub use action::{
    Action, ActionError, ActionOutcome, AgentAction, CheckAction, CompositeAction, ShellAction,
};
pub use core::{
    ActionContext, ConfigError, PipelineGraph, RunReport, RunStatus, Stage, StageStatus, Step,
    StepStatus,
};
pub use execution::{execute, CancelToken, ExecuteOptions, ExecutionEvent, Executor};
pub use report::{JsonReporter, Reporter, TextReporter};
