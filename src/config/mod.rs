// src/config/mod.rs

//! Configuration, recipe and model registry loading.
//!
//! Responsibilities:
//! - Define the serde-backed data model (`model.rs`).
//! - Load documents from disk, JSON or TOML (`loader.rs`).
//! - Validate raw documents into their checked counterparts (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_config, load_preloading, load_recipe, load_registry, read_document};
pub use model::{
    Config, DatabaseConfig, ExportSeparation, ModelRegistry, RawConfig, RawModelRegistry,
    RawRecipe, Recipe,
};
pub use validate::validate_raw_config;
