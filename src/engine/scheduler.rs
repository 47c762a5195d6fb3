// src/engine/scheduler.rs

//! Batch scheduling for a single command.
//!
//! The image set is cut into contiguous batches. Each batch is handed to the
//! [`BatchInvoker`]; when an invocation fails, the batch is split once into
//! two halves and each half gets exactly one more attempt. Failures of a
//! half are recorded and the command carries on.

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::engine::resolve::ResolvedCommand;
use crate::errors::{BatchrunError, Result};
use crate::exec::{BatchInvoker, InvocationError, InvocationRequest, parse_output};
use crate::intake::ImageSet;
use crate::types::{BatchFailure, ExecutionMode, ExecutionRecord};

/// Contiguous index ranges of at most `batch_size` covering `0..len`.
pub fn partition(len: usize, batch_size: usize) -> Vec<Range<usize>> {
    if batch_size == 0 {
        return Vec::new();
    }
    (0..len)
        .step_by(batch_size)
        .map(|start| start..(start + batch_size).min(len))
        .collect()
}

/// The two halves a failed batch is retried with (the first takes the odd
/// image), or `None` when the batch is a single image and cannot be split.
pub fn halve(range: &Range<usize>) -> Option<Vec<Range<usize>>> {
    if range.len() < 2 {
        return None;
    }
    let mid = range.start + range.len().div_ceil(2);
    Some(vec![range.start..mid, mid..range.end])
}

/// Everything one command produced.
#[derive(Debug, Clone, Default)]
pub struct CommandReport {
    pub command: String,
    /// Records in batch completion order.
    pub records: Vec<ExecutionRecord>,
    pub failures: Vec<BatchFailure>,
    /// Number of first-round batches.
    pub batches: usize,
}

#[derive(Debug, Default)]
struct BatchOutcome {
    records: Vec<ExecutionRecord>,
    failures: Vec<BatchFailure>,
}

/// Shared, read-only state for the batches of one command.
struct BatchContext {
    invoker: Arc<dyn BatchInvoker>,
    command: ResolvedCommand,
    images: Vec<(String, PathBuf)>,
}

impl BatchContext {
    fn names(&self, range: &Range<usize>) -> Vec<String> {
        self.images[range.clone()].iter().map(|(n, _)| n.clone()).collect()
    }

    fn failure(&self, range: &Range<usize>, cause: String) -> BatchFailure {
        BatchFailure {
            command: self.command.name.to_string(),
            images: self.names(range),
            cause,
        }
    }

    async fn invoke(&self, range: &Range<usize>) -> std::result::Result<Vec<ExecutionRecord>, InvocationError> {
        let request = InvocationRequest {
            command: self.command.name.to_string(),
            program: self.command.program.clone(),
            flags: self.command.flags.clone(),
            images: self.images[range.clone()].iter().map(|(_, p)| p.clone()).collect(),
            working_dir: self.command.working_dir.clone(),
        };
        let lines = self.invoker.invoke(request).await?;
        Ok(parse_output(&lines, self.command.name.as_str()))
    }

    /// Run one batch, applying the single halving retry on failure.
    async fn run_batch(&self, index: usize, range: Range<usize>) -> BatchOutcome {
        let command = self.command.name.as_str();
        debug!(command, batch = index, start = range.start, len = range.len(), "running batch");

        let err = match self.invoke(&range).await {
            Ok(records) => {
                return BatchOutcome {
                    records,
                    failures: Vec::new(),
                };
            }
            Err(err) => err,
        };

        let Some(sub_ranges) = halve(&range) else {
            warn!(command, batch = index, error = %err, "single-image batch failed; not retrying");
            return BatchOutcome {
                records: Vec::new(),
                failures: vec![self.failure(
                    &range,
                    format!("{err} (batch of one image cannot be split further)"),
                )],
            };
        };

        warn!(
            command,
            batch = index,
            error = %err,
            sub_batches = sub_ranges.len(),
            "batch failed; retrying with halved batches"
        );

        let mut outcome = BatchOutcome::default();
        for sub in sub_ranges {
            match self.invoke(&sub).await {
                Ok(records) => outcome.records.extend(records),
                Err(retry_err) => {
                    warn!(
                        command,
                        batch = index,
                        start = sub.start,
                        len = sub.len(),
                        error = %retry_err,
                        "retry of halved batch failed"
                    );
                    outcome
                        .failures
                        .push(self.failure(&sub, format!("retry of smaller batch failed: {retry_err}")));
                }
            }
        }
        outcome
    }
}

/// Drives one command over the whole image set.
pub struct BatchScheduler {
    invoker: Arc<dyn BatchInvoker>,
    batch_size: usize,
    mode: ExecutionMode,
    max_concurrency: usize,
}

impl BatchScheduler {
    pub fn new(invoker: Arc<dyn BatchInvoker>, batch_size: usize, mode: ExecutionMode) -> Self {
        let max_concurrency = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            invoker,
            batch_size,
            mode,
            max_concurrency,
        }
    }

    /// Bound on in-flight batches in concurrent mode.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub async fn run(&self, command: &ResolvedCommand, images: &ImageSet) -> Result<CommandReport> {
        if self.batch_size == 0 {
            return Err(BatchrunError::ConfigError(format!(
                "batch size for command '{}' must be >= 1",
                command.name
            )));
        }

        let ctx = Arc::new(BatchContext {
            invoker: Arc::clone(&self.invoker),
            command: command.clone(),
            images: images
                .entries()
                .map(|(n, p)| (n.to_string(), p.to_path_buf()))
                .collect(),
        });
        let ranges = partition(ctx.images.len(), self.batch_size);
        let started = Instant::now();

        info!(
            command = %command.name,
            images = ctx.images.len(),
            batches = ranges.len(),
            batch_size = self.batch_size,
            mode = ?self.mode,
            "scheduling command"
        );

        let mut report = CommandReport {
            command: command.name.to_string(),
            batches: ranges.len(),
            ..CommandReport::default()
        };

        match self.mode {
            ExecutionMode::Sequential => {
                for (index, range) in ranges.into_iter().enumerate() {
                    let outcome = ctx.run_batch(index, range).await;
                    merge_outcome(&mut report, outcome, images);
                }
            }
            ExecutionMode::Concurrent => {
                self.run_concurrent(&ctx, ranges, &mut report, images).await;
            }
        }

        info!(
            command = %command.name,
            records = report.records.len(),
            failed_batches = report.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "command finished"
        );

        Ok(report)
    }

    async fn run_concurrent(
        &self,
        ctx: &Arc<BatchContext>,
        ranges: Vec<Range<usize>>,
        report: &mut CommandReport,
        images: &ImageSet,
    ) {
        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let mut pending: BTreeMap<usize, Range<usize>> = BTreeMap::new();
        let mut set = JoinSet::new();

        for (index, range) in ranges.into_iter().enumerate() {
            pending.insert(index, range.clone());
            let ctx = Arc::clone(ctx);
            let permits = Arc::clone(&permits);
            set.spawn(async move {
                let _permit = permits.acquire_owned().await;
                (index, ctx.run_batch(index, range).await)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, outcome)) => {
                    pending.remove(&index);
                    merge_outcome(report, outcome, images);
                }
                Err(join_err) => {
                    error!(command = %ctx.command.name, error = %join_err, "batch worker panicked");
                }
            }
        }

        // Batches whose worker died never reported back.
        for range in pending.into_values() {
            report
                .failures
                .push(ctx.failure(&range, "batch worker terminated abnormally".to_string()));
        }
    }
}

/// Fold a batch outcome into the command report, dropping records for
/// images that are not part of the run.
fn merge_outcome(report: &mut CommandReport, outcome: BatchOutcome, images: &ImageSet) {
    for record in outcome.records {
        if images.contains_stem(&record.image) {
            report.records.push(record);
        } else {
            warn!(
                command = %record.command,
                image = %record.image,
                "dropping result for an image outside the image set"
            );
        }
    }
    report.failures.extend(outcome.failures);
}
