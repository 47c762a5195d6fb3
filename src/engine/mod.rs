// src/engine/mod.rs

//! Execution engine.
//!
//! - [`resolve`] maps command names to binaries.
//! - [`scheduler`] runs one command over the image set in batches, with the
//!   halving retry.
//! - [`dispatcher`] runs all commands concurrently and flattens the results.
//! - [`upload`] holds the run back until the upload directory is complete.

use crate::config::Config;
use crate::types::ExecutionMode;

pub mod dispatcher;
pub mod resolve;
pub mod scheduler;
pub mod upload;

pub use dispatcher::{CommandDispatcher, CommandOutcome, DispatchSummary};
pub use resolve::{CommandResolver, ResolvedCommand};
pub use scheduler::{BatchScheduler, CommandReport};
pub use upload::{BackoffSchedule, UploadGate, UploadWait};

/// Knobs shared by the dispatcher and every batch scheduler it creates.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub batch_size: usize,
    pub mode: ExecutionMode,
    /// Upper bound on concurrent command workers; defaults to available
    /// parallelism.
    pub max_workers: Option<usize>,
    /// Upper bound on in-flight batches per command in concurrent mode.
    pub max_batch_concurrency: Option<usize>,
}

impl RunSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            batch_size: cfg.batch_size,
            mode: ExecutionMode::from_max_performance(cfg.force_max_performance),
            max_workers: None,
            max_batch_concurrency: None,
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            batch_size: crate::config::model::DEFAULT_BATCH_SIZE,
            mode: ExecutionMode::Sequential,
            max_workers: None,
            max_batch_concurrency: None,
        }
    }
}
