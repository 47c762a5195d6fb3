#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use batchrun::config::model::{CommandsSpec, ExportationFormat};
use batchrun::config::{Config, ExportSeparation, RawConfig, RawRecipe, Recipe};

/// Builder for `Config` to simplify test setup.
pub struct ConfigBuilder {
    config: RawConfig,
}

impl ConfigBuilder {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            config: RawConfig::with_output_dir(output_dir),
        }
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn max_performance(mut self, on: bool) -> Self {
        self.config.force_max_performance = on;
        self
    }

    pub fn naming_convention(mut self, template: &str) -> Self {
        self.config.naming_convention = template.to_string();
        self
    }

    pub fn database(mut self, path: impl AsRef<Path>, table: &str) -> Self {
        self.config.enable_db = true;
        self.config.db_path = Some(path.as_ref().to_path_buf());
        self.config.db_name = Some(table.to_string());
        self
    }

    pub fn upload_wait_limit_secs(mut self, secs: u64) -> Self {
        self.config.upload_wait_limit_secs = secs;
        self
    }

    pub fn raw(self) -> RawConfig {
        self.config
    }

    pub fn build(self) -> Config {
        Config::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

/// Builder for `Recipe`.
pub struct RecipeBuilder {
    recipe: RawRecipe,
}

impl RecipeBuilder {
    pub fn new() -> Self {
        Self {
            recipe: RawRecipe {
                commands: BTreeMap::new(),
                commands_spec: CommandsSpec::default(),
                exportation_format: ExportationFormat::default(),
            },
        }
    }

    pub fn command(mut self, name: &str) -> Self {
        self.recipe.commands.insert(name.to_string(), true);
        self
    }

    pub fn disabled_command(mut self, name: &str) -> Self {
        self.recipe.commands.insert(name.to_string(), false);
        self
    }

    pub fn white_background(mut self, on: bool) -> Self {
        self.recipe.commands_spec.white_background = on;
        self
    }

    pub fn separate_by(mut self, factor: &str) -> Self {
        self.recipe.commands_spec.export_separation = ExportSeparation::Factor(factor.to_string());
        self
    }

    pub fn csv(mut self) -> Self {
        self.recipe.exportation_format.csv = true;
        self
    }

    pub fn json(mut self) -> Self {
        self.recipe.exportation_format.json = true;
        self
    }

    pub fn database(mut self) -> Self {
        self.recipe.exportation_format.connected_database = true;
        self
    }

    pub fn pdf(mut self) -> Self {
        self.recipe.exportation_format.pdf = true;
        self
    }

    pub fn raw(self) -> RawRecipe {
        self.recipe
    }

    pub fn build(self) -> Recipe {
        Recipe::try_from(self.recipe).expect("Failed to build valid recipe from builder")
    }
}

impl Default for RecipeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Create `names` as empty files under `dir` and return their paths.
pub fn touch_images(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    std::fs::create_dir_all(dir).expect("create image dir");
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            std::fs::write(&path, b"").expect("write image");
            path
        })
        .collect()
}

/// Numbered image names `img000.jpg`, `img001.jpg`, ...
pub fn image_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("img{i:03}.jpg")).collect()
}
