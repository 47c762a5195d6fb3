// src/config/model.rs

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{CommandName, ExportFormat};

/// Run configuration as written by the configuration layer.
///
/// Keys keep the upper-case spelling the UI writes:
///
/// ```json
/// {
///   "ENABLE_DB": true,
///   "DB_PATH": "/data/results.sqlite",
///   "DB_NAME": "phenotypes",
///   "OUTPUT_DIR": "/data/out",
///   "FORCE_MAXPERFORMANCE": false,
///   "NAMING_CONVENTION": "species_genotype_rep"
/// }
/// ```
///
/// The same keys are accepted from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfig {
    #[serde(rename = "ENABLE_DB", default)]
    pub enable_db: bool,

    #[serde(rename = "DB_PATH", default)]
    pub db_path: Option<PathBuf>,

    /// Name of the pre-existing table rows are upserted into.
    #[serde(rename = "DB_NAME", default)]
    pub db_name: Option<String>,

    #[serde(rename = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    #[serde(rename = "FORCE_MAXPERFORMANCE", default)]
    pub force_max_performance: bool,

    /// Delimiter-tokenised filename template, e.g. `species_genotype_rep`.
    #[serde(rename = "NAMING_CONVENTION", default)]
    pub naming_convention: String,

    #[serde(rename = "BATCH_SIZE", default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(rename = "UPLOAD_WAIT_LIMIT_SECS", default = "default_upload_wait_limit_secs")]
    pub upload_wait_limit_secs: u64,

    #[serde(rename = "WHITE_BACKGROUND_FLAG", default = "default_white_background_flag")]
    pub white_background_flag: String,

    /// Enables the prefix-based preloading filter.
    #[serde(rename = "ENABLE_GENOTYPE", default)]
    pub enable_genotype: bool,
}

pub const DEFAULT_BATCH_SIZE: usize = 50;

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_upload_wait_limit_secs() -> u64 {
    300
}

fn default_white_background_flag() -> String {
    "--white-background".to_string()
}

impl RawConfig {
    /// Minimal config writing into `output_dir`, everything else defaulted.
    pub fn with_output_dir(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            enable_db: false,
            db_path: None,
            db_name: None,
            output_dir: output_dir.into(),
            force_max_performance: false,
            naming_convention: String::new(),
            batch_size: default_batch_size(),
            upload_wait_limit_secs: default_upload_wait_limit_secs(),
            white_background_flag: default_white_background_flag(),
            enable_genotype: false,
        }
    }
}

/// Location of the relational sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub table: String,
}

/// Validated configuration. Build it with `Config::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: Option<DatabaseConfig>,
    pub output_dir: PathBuf,
    pub force_max_performance: bool,
    pub naming_convention: String,
    pub batch_size: usize,
    pub upload_wait_limit: Duration,
    pub white_background_flag: String,
    pub enable_genotype: bool,
}

impl Config {
    pub(crate) fn new_unchecked(raw: RawConfig) -> Self {
        let database = match (raw.enable_db, raw.db_path, raw.db_name) {
            (true, Some(path), Some(table)) => Some(DatabaseConfig { path, table }),
            _ => None,
        };

        Self {
            database,
            output_dir: raw.output_dir,
            force_max_performance: raw.force_max_performance,
            naming_convention: raw.naming_convention,
            batch_size: raw.batch_size,
            upload_wait_limit: Duration::from_secs(raw.upload_wait_limit_secs),
            white_background_flag: raw.white_background_flag,
            enable_genotype: raw.enable_genotype,
        }
    }
}

/// Recipe written by the UI: which commands to run and what to export.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecipe {
    /// `{ "leaf_count": true, "disease": false }`
    #[serde(default)]
    pub commands: BTreeMap<String, bool>,

    #[serde(default)]
    pub commands_spec: CommandsSpec,

    #[serde(default)]
    pub exportation_format: ExportationFormat,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandsSpec {
    #[serde(default)]
    pub white_background: bool,

    #[serde(default)]
    pub export_separation: ExportSeparation,
}

/// Export separation as written in the recipe.
///
/// Older recipes carry a plain checkbox (`true` groups by the first filename
/// token); current ones name a token of the naming convention, or `"Nenhum"`
/// for no grouping.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ExportSeparation {
    Flag(bool),
    Factor(String),
}

impl Default for ExportSeparation {
    fn default() -> Self {
        ExportSeparation::Flag(false)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportationFormat {
    #[serde(default)]
    pub csv: bool,
    #[serde(default)]
    pub json: bool,
    #[serde(default)]
    pub pdf: bool,
    #[serde(default)]
    pub connected_database: bool,
}

/// Validated recipe.
#[derive(Debug, Clone)]
pub struct Recipe {
    /// Enabled commands, normalised and deduplicated.
    pub commands: Vec<CommandName>,
    pub white_background: bool,
    pub export_separation: ExportSeparation,
    pub formats: BTreeSet<ExportFormat>,
    /// PDF was ticked; there is no PDF exporter so this is only reported.
    pub pdf_requested: bool,
}

/// `models.json`: the registry of known analysis binaries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawModelRegistry {
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    pub path: PathBuf,
}

/// Validated registry: command name to binary path (possibly relative to the
/// models directory).
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    pub entries: BTreeMap<CommandName, PathBuf>,
}

/// `custom_preloading.json` as written by the UI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPreloading {
    #[serde(rename = "customEntry", default)]
    pub custom_entry: Option<String>,

    #[serde(rename = "selectedOption", default)]
    pub selected_option: Option<String>,
}
