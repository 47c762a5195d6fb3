// src/engine/dispatcher.rs

//! Runs every enabled command's pipeline concurrently and flattens the
//! results into one stream.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::engine::resolve::CommandResolver;
use crate::engine::scheduler::{BatchScheduler, CommandReport};
use crate::engine::RunSettings;
use crate::exec::BatchInvoker;
use crate::intake::ImageSet;
use crate::types::{BatchFailure, CommandName, ExecutionRecord};

/// Result of one command's pipeline.
#[derive(Debug, Clone)]
pub enum CommandOutcome {
    Finished(CommandReport),
    /// The pipeline could not run at all (binary missing, bad sizing, ...).
    Failed { command: String, error: String },
}

impl CommandOutcome {
    pub fn command(&self) -> &str {
        match self {
            CommandOutcome::Finished(report) => &report.command,
            CommandOutcome::Failed { command, .. } => command,
        }
    }
}

/// Flattened view of a dispatch, ready for aggregation.
#[derive(Debug, Clone, Default)]
pub struct DispatchSummary {
    pub records: Vec<ExecutionRecord>,
    pub batch_failures: Vec<BatchFailure>,
    /// `(command, error)` for commands that produced nothing.
    pub command_failures: Vec<(String, String)>,
}

impl DispatchSummary {
    pub fn from_outcomes(outcomes: Vec<CommandOutcome>) -> Self {
        let mut summary = DispatchSummary::default();
        for outcome in outcomes {
            match outcome {
                CommandOutcome::Finished(report) => {
                    summary.records.extend(report.records);
                    summary.batch_failures.extend(report.failures);
                }
                CommandOutcome::Failed { command, error } => {
                    summary.command_failures.push((command, error));
                }
            }
        }
        summary
    }

    pub fn is_clean(&self) -> bool {
        self.batch_failures.is_empty() && self.command_failures.is_empty()
    }
}

pub struct CommandDispatcher {
    resolver: Arc<CommandResolver>,
    invoker: Arc<dyn BatchInvoker>,
    settings: RunSettings,
}

impl CommandDispatcher {
    pub fn new(
        resolver: CommandResolver,
        invoker: Arc<dyn BatchInvoker>,
        settings: RunSettings,
    ) -> Self {
        Self {
            resolver: Arc::new(resolver),
            invoker,
            settings,
        }
    }

    /// Worker count for `commands` commands.
    pub fn worker_count(&self, commands: usize) -> usize {
        let available = self.settings.max_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        available.min(commands).max(1)
    }

    /// Run all `commands` and return one outcome per command, sorted by
    /// command name. A failing command never affects its siblings.
    pub async fn run(&self, commands: &[CommandName], images: Arc<ImageSet>) -> Vec<CommandOutcome> {
        if commands.is_empty() {
            warn!("no commands enabled in recipe; nothing to dispatch");
            return Vec::new();
        }

        let workers = self.worker_count(commands.len());
        let started = Instant::now();
        info!(commands = commands.len(), workers, images = images.len(), "dispatching commands");

        let permits = Arc::new(Semaphore::new(workers));
        let mut pending: BTreeSet<String> = BTreeSet::new();
        let mut set = JoinSet::new();

        for command in commands {
            pending.insert(command.to_string());

            let command = command.clone();
            let resolver = Arc::clone(&self.resolver);
            let invoker = Arc::clone(&self.invoker);
            let images = Arc::clone(&images);
            let permits = Arc::clone(&permits);
            let settings = self.settings.clone();

            set.spawn(async move {
                let _permit = permits.acquire_owned().await;
                run_command(&command, &resolver, invoker, &settings, &images).await
            });
        }

        let mut outcomes = Vec::with_capacity(commands.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => {
                    pending.remove(outcome.command());
                    outcomes.push(outcome);
                }
                Err(join_err) => {
                    error!(error = %join_err, "command worker panicked");
                }
            }
        }

        for command in pending {
            outcomes.push(CommandOutcome::Failed {
                command,
                error: "command worker terminated abnormally".to_string(),
            });
        }

        outcomes.sort_by(|a, b| a.command().cmp(b.command()));

        info!(
            commands = outcomes.len(),
            failed = outcomes
                .iter()
                .filter(|o| matches!(o, CommandOutcome::Failed { .. }))
                .count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "dispatch finished"
        );

        outcomes
    }

    /// Convenience wrapper returning the flattened summary.
    pub async fn dispatch(&self, commands: &[CommandName], images: Arc<ImageSet>) -> DispatchSummary {
        DispatchSummary::from_outcomes(self.run(commands, images).await)
    }
}

async fn run_command(
    command: &CommandName,
    resolver: &CommandResolver,
    invoker: Arc<dyn BatchInvoker>,
    settings: &RunSettings,
    images: &ImageSet,
) -> CommandOutcome {
    let resolved = match resolver.resolve(command) {
        Ok(resolved) => resolved,
        Err(err) => {
            error!(command = %command, error = %err, "cannot resolve command");
            return CommandOutcome::Failed {
                command: command.to_string(),
                error: err.to_string(),
            };
        }
    };

    let mut scheduler = BatchScheduler::new(invoker, settings.batch_size, settings.mode);
    if let Some(limit) = settings.max_batch_concurrency {
        scheduler = scheduler.with_max_concurrency(limit);
    }

    match scheduler.run(&resolved, images).await {
        Ok(report) => CommandOutcome::Finished(report),
        Err(err) => {
            error!(command = %command, error = %err, "command pipeline failed");
            CommandOutcome::Failed {
                command: command.to_string(),
                error: err.to_string(),
            }
        }
    }
}
