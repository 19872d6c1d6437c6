//! Error types for configuration loading and lookup

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unsupported config format for {path} (expected .json or .toml)")]
    UnsupportedFormat { path: PathBuf },

    #[error("flow configuration not found: {name}")]
    UnknownFlow { name: String },

    #[error("config snapshot lock poisoned")]
    Poisoned,
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
