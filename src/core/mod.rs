//! Core domain models
//!
//! This module defines the fundamental data structures that represent
//! pipeline graphs, stages, steps, and their outcomes.

pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod stage;
pub mod state;
pub mod step;

pub use context::*;
pub use error::{ActionError, ConfigError};
pub use graph::*;
pub use stage::*;
pub use state::*;
pub use step::*;
