// src/pipeline.rs

//! One run, end to end: checks that must pass before anything executes,
//! upload wait, intake, dispatch, aggregation and export.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::config::{Config, Recipe};
use crate::engine::{CommandDispatcher, CommandResolver, DispatchSummary, RunSettings, UploadGate};
use crate::errors::{BatchrunError, Result};
use crate::exec::BatchInvoker;
use crate::export::{ExportReport, Exporter, SqliteSink};
use crate::fs::FileSystem;
use crate::intake::{load_images, PreloadFilter};
use crate::results::{resolve_separation, tables_for_export, ResultTable};
use crate::types::ExportFormat;

/// Everything a run needs, already loaded and validated.
pub struct RunContext {
    pub config: Config,
    pub recipe: Recipe,
    pub resolver: CommandResolver,
    pub upload_dir: PathBuf,
    pub preload: PreloadFilter,
    /// When set, wait for this many images before starting.
    pub expected_images: Option<usize>,
    pub settings: RunSettings,
    pub fs: Arc<dyn FileSystem>,
    pub invoker: Arc<dyn BatchInvoker>,
}

#[derive(Debug)]
pub struct RunSummary {
    pub images: usize,
    pub table: ResultTable,
    pub dispatch: DispatchSummary,
    pub conflicts: usize,
    pub export: ExportReport,
}

/// Flags passed to every binary for this recipe.
pub fn command_flags(config: &Config, recipe: &Recipe) -> Vec<String> {
    if recipe.white_background && !config.white_background_flag.is_empty() {
        vec![config.white_background_flag.clone()]
    } else {
        Vec::new()
    }
}

/// Open the relational sink when the recipe asks for it. Either missing
/// configuration or a missing database/table ends the run here.
pub fn open_sink(config: &Config, recipe: &Recipe) -> Result<Option<SqliteSink>> {
    if !recipe.formats.contains(&ExportFormat::ConnectedDatabase) {
        return Ok(None);
    }
    match &config.database {
        Some(db) => SqliteSink::open(db).map(Some),
        None => Err(BatchrunError::ConfigError(
            "recipe enables connected_database but ENABLE_DB is off".to_string(),
        )),
    }
}

pub async fn execute(ctx: RunContext) -> Result<RunSummary> {
    let started = Instant::now();

    let position = resolve_separation(&ctx.recipe.export_separation, &ctx.config.naming_convention)?;
    let sink = open_sink(&ctx.config, &ctx.recipe)?;

    if ctx.recipe.pdf_requested {
        warn!("pdf export requested but not supported; skipping");
    }

    if let Some(expected) = ctx.expected_images {
        UploadGate::new(Arc::clone(&ctx.fs), &ctx.upload_dir, ctx.config.upload_wait_limit)
            .wait_for(expected)
            .await?;
    }

    let images = load_images(ctx.fs.as_ref(), &ctx.upload_dir, &ctx.preload)?;
    if images.is_empty() {
        return Err(BatchrunError::NoImages(ctx.upload_dir.display().to_string()));
    }
    let image_count = images.len();

    let dispatcher = CommandDispatcher::new(ctx.resolver, ctx.invoker, ctx.settings);
    let mut dispatch = dispatcher
        .dispatch(&ctx.recipe.commands, Arc::new(images))
        .await;

    for failure in &dispatch.batch_failures {
        warn!(
            command = %failure.command,
            images = failure.images.len(),
            cause = %failure.cause,
            "batch produced no results"
        );
    }

    let aggregation = ResultTable::aggregate(std::mem::take(&mut dispatch.records));
    let table = aggregation.table;
    let tables = tables_for_export(&table, position);

    let mut exporter = Exporter::new(Arc::clone(&ctx.fs), &ctx.config.output_dir);
    if let Some(sink) = sink {
        exporter = exporter.with_sink(sink);
    }
    let export = exporter.export(&table, &tables, &ctx.recipe.formats);

    info!(
        images = image_count,
        rows = table.len(),
        failed_batches = dispatch.batch_failures.len(),
        failed_commands = dispatch.command_failures.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "run finished"
    );

    Ok(RunSummary {
        images: image_count,
        table,
        dispatch,
        conflicts: aggregation.conflicts.len(),
        export,
    })
}
