// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchrunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid command name: {0:?} (expected [A-Za-z_][A-Za-z0-9_]*)")]
    InvalidCommandName(String),

    #[error("Binary for command '{command}' not found at {path}")]
    CommandNotFound { command: String, path: String },

    #[error("No images found in {0}")]
    NoImages(String),

    #[error("Timed out after {waited:?} waiting for uploads ({found}/{expected} images present)")]
    UploadTimeout {
        expected: usize,
        found: usize,
        waited: Duration,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BatchrunError>;
