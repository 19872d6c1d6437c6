//! Errors that can cross the orchestrator boundary.
//!
//! Per-check failures never appear here: they are folded into outcomes.

use docflow_domain::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
