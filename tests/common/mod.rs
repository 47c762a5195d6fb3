#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use batchrun::config::{Config, ModelRegistry, Recipe};
use batchrun::engine::{CommandResolver, ResolvedCommand, RunSettings};
use batchrun::exec::BatchInvoker;
use batchrun::fs::RealFileSystem;
use batchrun::intake::{ImageSet, PreloadFilter};
use batchrun::pipeline::{command_flags, RunContext};
use batchrun::types::CommandName;
use batchrun_test_utils::builders::{image_names, touch_images};
use tempfile::TempDir;

pub use batchrun_test_utils::init_tracing;

/// In-memory image set of `count` numbered images under `/uploads`.
pub fn image_set(count: usize) -> ImageSet {
    ImageSet::from_paths(
        image_names(count)
            .into_iter()
            .map(|name| PathBuf::from("/uploads").join(name)),
    )
}

/// A resolved command that is never actually spawned.
pub fn fake_command(name: &str) -> ResolvedCommand {
    ResolvedCommand {
        name: CommandName::new(name).unwrap(),
        program: PathBuf::from(format!("/models/{name}")),
        working_dir: PathBuf::from("/models"),
        flags: Vec::new(),
    }
}

/// On-disk layout of a run: `models/`, `uploads/`, `out/`.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("models")).unwrap();
        std::fs::create_dir_all(dir.path().join("uploads")).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn models_dir(&self) -> PathBuf {
        self.root().join("models")
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.root().join("uploads")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root().join("out")
    }

    /// Placeholder binary for `name` at its conventional location.
    pub fn install_binary(&self, name: &str) -> PathBuf {
        let path = self
            .models_dir()
            .join(format!("{name}{}", std::env::consts::EXE_SUFFIX));
        std::fs::write(&path, b"").unwrap();
        path
    }

    pub fn add_images(&self, names: &[&str]) -> Vec<PathBuf> {
        touch_images(&self.upload_dir(), names)
    }

    pub fn context(
        &self,
        config: Config,
        recipe: Recipe,
        invoker: Arc<dyn BatchInvoker>,
    ) -> RunContext {
        let flags = command_flags(&config, &recipe);
        let settings = RunSettings::from_config(&config);
        RunContext {
            resolver: CommandResolver::new(self.models_dir(), ModelRegistry::default(), flags),
            upload_dir: self.upload_dir(),
            preload: PreloadFilter::None,
            expected_images: None,
            settings,
            fs: Arc::new(RealFileSystem),
            invoker,
            config,
            recipe,
        }
    }
}
