// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::loader::{
    default_config_path, default_models_dir, default_preloading_path, default_recipe_path,
    default_upload_dir,
};

/// Command-line arguments for `batchrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "batchrun",
    version,
    about = "Run image-analysis binaries over uploaded images in batches and export the results.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the run configuration (JSON, or TOML by extension).
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Path to the recipe written by the UI.
    #[arg(long, value_name = "PATH", default_value_os_t = default_recipe_path())]
    pub recipe: PathBuf,

    /// Directory holding the analysis binaries and `models.json`.
    #[arg(long, value_name = "DIR", default_value_os_t = default_models_dir())]
    pub models_dir: PathBuf,

    /// Directory the images are uploaded to.
    #[arg(long, value_name = "DIR", default_value_os_t = default_upload_dir())]
    pub upload_dir: PathBuf,

    /// Custom preloading filter, read when `ENABLE_GENOTYPE` is set.
    #[arg(long, value_name = "PATH", default_value_os_t = default_preloading_path())]
    pub preloading: PathBuf,

    /// Number of images the upload is expected to contain.
    ///
    /// If omitted, whatever is already in the upload directory is used.
    #[arg(long, value_name = "N")]
    pub expected_images: Option<usize>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BATCHRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate inputs and print the execution plan without running anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
