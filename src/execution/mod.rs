//! Pipeline execution engine

pub mod cancel;
pub mod engine;
pub mod executor;
pub mod recorder;
pub mod scheduler;

pub use cancel::CancelToken;
pub use engine::{execute, EventHandler, ExecuteOptions, ExecutionEvent, Executor};
pub use executor::{StageRun, StepExecutor};
pub use recorder::RunRecorder;
pub use scheduler::ExecutionScheduler;
