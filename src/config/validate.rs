// src/config/validate.rs

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::config::model::{
    Config, ModelRegistry, RawConfig, RawModelRegistry, RawPreloading, RawRecipe, Recipe,
};
use crate::errors::{BatchrunError, Result};
use crate::intake::PreloadFilter;
use crate::types::{is_valid_identifier, CommandName, ExportFormat};

impl TryFrom<RawConfig> for Config {
    type Error = BatchrunError;

    fn try_from(raw: RawConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(Config::new_unchecked(raw))
    }
}

pub fn validate_raw_config(cfg: &RawConfig) -> Result<()> {
    if cfg.batch_size == 0 {
        return Err(BatchrunError::ConfigError(
            "BATCH_SIZE must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.output_dir.as_os_str().is_empty() {
        return Err(BatchrunError::ConfigError(
            "OUTPUT_DIR must not be empty".to_string(),
        ));
    }

    if cfg.enable_db {
        let Some(path) = cfg.db_path.as_ref() else {
            return Err(BatchrunError::ConfigError(
                "ENABLE_DB is set but DB_PATH is missing".to_string(),
            ));
        };
        if path.as_os_str().is_empty() {
            return Err(BatchrunError::ConfigError(
                "ENABLE_DB is set but DB_PATH is empty".to_string(),
            ));
        }

        let Some(table) = cfg.db_name.as_deref() else {
            return Err(BatchrunError::ConfigError(
                "ENABLE_DB is set but DB_NAME is missing".to_string(),
            ));
        };
        // The table name is interpolated into DDL, so it must be a plain identifier.
        if !is_valid_identifier(table) {
            return Err(BatchrunError::ConfigError(format!(
                "DB_NAME '{table}' is not a valid table identifier"
            )));
        }
    }

    Ok(())
}

impl TryFrom<RawRecipe> for Recipe {
    type Error = BatchrunError;

    fn try_from(raw: RawRecipe) -> std::result::Result<Self, Self::Error> {
        let mut commands = BTreeSet::new();
        for (name, enabled) in raw.commands.iter() {
            if !*enabled {
                continue;
            }
            let command = CommandName::new(name)?;
            if !commands.insert(command.clone()) {
                warn!(command = %command, "command enabled twice in recipe; running it once");
            }
        }

        let fmt = &raw.exportation_format;
        let mut formats = BTreeSet::new();
        if fmt.csv {
            formats.insert(ExportFormat::Csv);
        }
        if fmt.json {
            formats.insert(ExportFormat::Json);
        }
        if fmt.connected_database {
            formats.insert(ExportFormat::ConnectedDatabase);
        }

        Ok(Recipe {
            commands: commands.into_iter().collect(),
            white_background: raw.commands_spec.white_background,
            export_separation: raw.commands_spec.export_separation,
            formats,
            pdf_requested: fmt.pdf,
        })
    }
}

impl TryFrom<RawModelRegistry> for ModelRegistry {
    type Error = BatchrunError;

    fn try_from(raw: RawModelRegistry) -> std::result::Result<Self, Self::Error> {
        let mut entries = BTreeMap::new();
        for model in raw.models {
            // Registry names must already be canonical; no `-` normalisation here.
            if !is_valid_identifier(&model.name) {
                return Err(BatchrunError::InvalidCommandName(model.name));
            }
            let name = CommandName::new(&model.name)?;
            if entries.insert(name, model.path).is_some() {
                return Err(BatchrunError::ConfigError(format!(
                    "model '{}' is defined more than once in the registry",
                    model.name
                )));
            }
        }
        Ok(ModelRegistry { entries })
    }
}

impl From<RawPreloading> for PreloadFilter {
    fn from(raw: RawPreloading) -> Self {
        let prefixes: Vec<String> = raw
            .custom_entry
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        if prefixes.is_empty() {
            return PreloadFilter::None;
        }

        match raw.selected_option.as_deref() {
            Some("selectOnly") => PreloadFilter::SelectOnly(prefixes),
            Some("excludeOnly") => PreloadFilter::ExcludeOnly(prefixes),
            other => {
                warn!(option = ?other, "unknown preloading option; not filtering images");
                PreloadFilter::None
            }
        }
    }
}
