// src/engine/upload.rs

//! Pre-dispatch wait for the upload directory to be fully populated.
//!
//! Another process may still be copying images when a run starts. The gate
//! polls the directory with capped exponential backoff until the expected
//! number of images is present, and gives up once the total wait would
//! exceed the configured limit.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::errors::{BatchrunError, Result};
use crate::fs::FileSystem;
use crate::intake::count_images;

/// Wait intervals `initial, 2*initial, ...` capped at `max`.
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    next: Duration,
    max: Duration,
}

impl BackoffSchedule {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { next: initial, max }
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(16))
    }
}

impl Iterator for BackoffSchedule {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next.min(self.max);
        self.next = current.saturating_mul(2).min(self.max);
        Some(current)
    }
}

/// What the gate observed before letting the run proceed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadWait {
    pub found: usize,
    pub waited: Duration,
    /// Intervals actually slept, in order.
    pub intervals: Vec<Duration>,
}

#[derive(Debug, Clone)]
pub struct UploadGate {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
    schedule: BackoffSchedule,
    limit: Duration,
}

impl UploadGate {
    pub fn new(fs: Arc<dyn FileSystem>, dir: impl Into<PathBuf>, limit: Duration) -> Self {
        Self {
            fs,
            dir: dir.into(),
            schedule: BackoffSchedule::default(),
            limit,
        }
    }

    pub fn with_schedule(mut self, schedule: BackoffSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Block (asynchronously) until at least `expected` images are present.
    pub async fn wait_for(&self, expected: usize) -> Result<UploadWait> {
        let mut schedule = self.schedule.clone();
        let mut waited = Duration::ZERO;
        let mut intervals = Vec::new();

        loop {
            let found = count_images(self.fs.as_ref(), &self.dir)?;
            if found >= expected {
                if !intervals.is_empty() {
                    info!(found, expected, waited_ms = waited.as_millis() as u64, "uploads complete");
                }
                return Ok(UploadWait {
                    found,
                    waited,
                    intervals,
                });
            }

            let interval = schedule.next().unwrap_or(Duration::from_secs(1));
            if waited + interval > self.limit {
                return Err(BatchrunError::UploadTimeout {
                    expected,
                    found,
                    waited,
                });
            }

            debug!(
                found,
                expected,
                remaining = expected - found,
                sleep_ms = interval.as_millis() as u64,
                "waiting for images to be copied"
            );
            tokio::time::sleep(interval).await;
            waited += interval;
            intervals.push(interval);
        }
    }
}
