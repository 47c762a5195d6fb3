// src/engine/resolve.rs

//! Locating the binary behind a command name.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::ModelRegistry;
use crate::errors::{BatchrunError, Result};
use crate::types::CommandName;

/// A command ready to be scheduled: binary, working directory, flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub name: CommandName,
    pub program: PathBuf,
    pub working_dir: PathBuf,
    pub flags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CommandResolver {
    models_dir: PathBuf,
    registry: ModelRegistry,
    flags: Vec<String>,
}

impl CommandResolver {
    /// `flags` are appended to every command's argument list (e.g. the white
    /// background switch).
    pub fn new(models_dir: impl Into<PathBuf>, registry: ModelRegistry, flags: Vec<String>) -> Self {
        Self {
            models_dir: models_dir.into(),
            registry,
            flags,
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Path the command would resolve to, without checking it exists.
    pub fn candidate_path(&self, command: &CommandName) -> PathBuf {
        match self.registry.entries.get(command) {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.models_dir.join(path),
            None => self
                .models_dir
                .join(format!("{}{}", command.as_str(), std::env::consts::EXE_SUFFIX)),
        }
    }

    /// Resolve `command` to an absolute binary path. Fails if no file exists
    /// there; that failure only concerns this command.
    pub fn resolve(&self, command: &CommandName) -> Result<ResolvedCommand> {
        let candidate = self.candidate_path(command);
        if !candidate.is_file() {
            return Err(BatchrunError::CommandNotFound {
                command: command.to_string(),
                path: candidate.display().to_string(),
            });
        }

        let program = std::path::absolute(&candidate)?;
        let working_dir = program
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                BatchrunError::ConfigError(format!(
                    "binary path {} has no parent directory",
                    program.display()
                ))
            })?;

        debug!(command = %command, program = %program.display(), "resolved command");

        Ok(ResolvedCommand {
            name: command.clone(),
            program,
            working_dir,
            flags: self.flags.clone(),
        })
    }
}
