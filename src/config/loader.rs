// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::config::model::{
    Config, ModelRegistry, RawConfig, RawModelRegistry, RawPreloading, RawRecipe, Recipe,
};
use crate::errors::Result;
use crate::intake::PreloadFilter;

/// Read a JSON or TOML document into `T`.
///
/// Files ending in `.toml` are parsed as TOML; everything else as JSON, which
/// is what the UI layer writes.
pub fn read_document<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    if is_toml {
        Ok(toml::from_str(&contents)?)
    } else {
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Load the run configuration and validate it.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let raw: RawConfig = read_document(path)?;
    Config::try_from(raw)
}

pub fn load_recipe(path: impl AsRef<Path>) -> Result<Recipe> {
    let raw: RawRecipe = read_document(path)?;
    Recipe::try_from(raw)
}

/// Load `models.json`. A missing registry file is not an error: every
/// command then resolves by naming convention inside the models directory.
pub fn load_registry(path: impl AsRef<Path>) -> Result<ModelRegistry> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(ModelRegistry::default());
    }
    let raw: RawModelRegistry = read_document(path)?;
    ModelRegistry::try_from(raw)
}

pub fn load_preloading(path: impl AsRef<Path>) -> Result<PreloadFilter> {
    let raw: RawPreloading = read_document(path)?;
    Ok(PreloadFilter::from(raw))
}

/// Default file locations, relative to the working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("config.json")
}

pub fn default_recipe_path() -> PathBuf {
    PathBuf::from("recipe.json")
}

pub fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

pub fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

pub fn default_preloading_path() -> PathBuf {
    PathBuf::from("custom_preloading.json")
}
