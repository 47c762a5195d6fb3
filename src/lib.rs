// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod export;
pub mod fs;
pub mod intake;
pub mod logging;
pub mod pipeline;
pub mod results;
pub mod types;

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{load_config, load_preloading, load_recipe, load_registry, Config, Recipe};
use crate::engine::scheduler::partition;
use crate::engine::{CommandResolver, RunSettings};
use crate::exec::ProcessInvoker;
use crate::fs::{FileSystem, RealFileSystem};
use crate::intake::{load_images, PreloadFilter};
use crate::pipeline::{command_flags, execute, open_sink, RunContext};
use crate::results::resolve_separation;

/// Marker the UI layer waits for on stdout.
pub const DONE_MARKER: &str = "done.";

/// Registry file name inside the models directory.
pub const REGISTRY_FILE: &str = "models.json";

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config, recipe, registry and preloading loading
/// - the production filesystem and process invoker
/// - the run pipeline (or the dry-run plan)
pub async fn run(args: CliArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let recipe = load_recipe(&args.recipe)?;
    let registry = load_registry(args.models_dir.join(REGISTRY_FILE))?;
    info!(
        commands = recipe.commands.len(),
        registered = registry.entries.len(),
        "configuration loaded"
    );

    let preload = if config.enable_genotype {
        load_preload_filter(&args)?
    } else {
        PreloadFilter::None
    };

    let flags = command_flags(&config, &recipe);
    let resolver = CommandResolver::new(&args.models_dir, registry, flags);
    let settings = RunSettings::from_config(&config);
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    if args.dry_run {
        print_dry_run(&config, &recipe, &resolver, &settings, &args, fs.as_ref(), &preload)?;
        return Ok(());
    }

    let ctx = RunContext {
        config,
        recipe,
        resolver,
        upload_dir: args.upload_dir.clone(),
        preload,
        expected_images: args.expected_images,
        settings,
        fs,
        invoker: Arc::new(ProcessInvoker::new()),
    };

    let summary = execute(ctx).await?;
    for (command, error) in &summary.dispatch.command_failures {
        warn!(command = %command, error = %error, "command produced no results");
    }
    for failure in &summary.export.failures {
        warn!(format = %failure.format, target = %failure.target, error = %failure.error, "export failed");
    }

    println!("{DONE_MARKER}");
    Ok(())
}

fn load_preload_filter(args: &CliArgs) -> Result<PreloadFilter> {
    if !args.preloading.is_file() {
        warn!(
            path = %args.preloading.display(),
            "ENABLE_GENOTYPE is set but no preloading file was found; using every image"
        );
        return Ok(PreloadFilter::None);
    }
    let filter = load_preloading(&args.preloading)?;
    debug!(?filter, "preloading filter loaded");
    Ok(filter)
}

/// Print what a run would do: commands and their binaries, batching,
/// grouping and exports. Nothing is executed.
fn print_dry_run(
    config: &Config,
    recipe: &Recipe,
    resolver: &CommandResolver,
    settings: &RunSettings,
    args: &CliArgs,
    fs: &dyn FileSystem,
    preload: &PreloadFilter,
) -> Result<()> {
    let position = resolve_separation(&recipe.export_separation, &config.naming_convention)?;
    open_sink(config, recipe)?;
    let images = load_images(fs, &args.upload_dir, preload)?;
    let batches = partition(images.len(), settings.batch_size).len();

    println!("batchrun dry-run");
    println!("  images: {} (from {})", images.len(), args.upload_dir.display());
    println!("  batch_size: {} ({batches} batches per command)", settings.batch_size);
    println!("  mode: {:?}", settings.mode);
    match position {
        Some(pos) => println!("  grouping: token {} of '{}'", pos + 1, config.naming_convention),
        None => println!("  grouping: none"),
    }
    let formats: Vec<&str> = recipe.formats.iter().map(|f| f.as_str()).collect();
    println!("  exports: {formats:?} -> {}", config.output_dir.display());
    println!();

    println!("commands ({}):", recipe.commands.len());
    for command in &recipe.commands {
        let path = resolver.candidate_path(command);
        let status = if path.is_file() { "ok" } else { "missing" };
        println!("  - {command}: {} [{status}]", path.display());
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
