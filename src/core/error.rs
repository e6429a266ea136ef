//! Error types for graph construction and action execution

use std::time::Duration;
use thiserror::Error;

/// A malformed pipeline graph. Always surfaced before any action runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Duplicate stage name: {0}")]
    DuplicateStage(String),

    #[error("Stage '{stage}' depends on non-existent stage '{dependency}'")]
    UnknownDependency { stage: String, dependency: String },

    #[error("Cycle detected in dependency graph: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("Stage and step names must not be empty (stage '{0}')")]
    EmptyName(String),
}

/// An action that could not produce an outcome.
///
/// The executor treats every variant exactly like a failed validation.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("Action panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Failed(String),
}
