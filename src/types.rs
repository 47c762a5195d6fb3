use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::errors::BatchrunError;

fn command_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("command name pattern is valid")
    })
}

/// Returns `true` if `name` is usable as a command identifier (and therefore
/// also as a column name in the relational sink).
pub fn is_valid_identifier(name: &str) -> bool {
    command_name_pattern().is_match(name)
}

/// Key column of every export. No command may use it as its name.
pub const IMAGE_KEY: &str = "image";

/// Validated identifier of an external analysis binary.
///
/// Recipe keys may use `-` as a word separator (`leaf-count`); those are
/// normalised to `_` before validation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommandName(String);

impl CommandName {
    pub fn new(raw: &str) -> Result<Self, BatchrunError> {
        let normalised = raw.trim().replace('-', "_");
        if normalised.eq_ignore_ascii_case(IMAGE_KEY) {
            return Err(BatchrunError::ConfigError(format!(
                "command name {raw:?} is reserved for the image key column"
            )));
        }
        if is_valid_identifier(&normalised) {
            Ok(Self(normalised))
        } else {
            Err(BatchrunError::InvalidCommandName(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CommandName {
    type Err = BatchrunError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandName::new(s)
    }
}

/// One parsed result line: `(image, command, value)`.
///
/// `image` is the file stem (no directory, no extension) and `value` is kept
/// verbatim; interpretation is left to consumers of the exports.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExecutionRecord {
    pub image: String,
    pub command: String,
    pub value: String,
}

impl ExecutionRecord {
    pub fn new(
        image: impl Into<String>,
        command: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            image: image.into(),
            command: command.into(),
            value: value.into(),
        }
    }
}

/// A (sub-)batch that could not be processed, kept so the run can report it
/// while still exporting everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub command: String,
    /// File names of the images in the failed batch.
    pub images: Vec<String>,
    pub cause: String,
}

/// How a single command's batches are driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// One batch after another.
    #[default]
    Sequential,
    /// All batches in flight at once, bounded by available parallelism.
    Concurrent,
}

impl ExecutionMode {
    pub fn from_max_performance(force_max_performance: bool) -> Self {
        if force_max_performance {
            ExecutionMode::Concurrent
        } else {
            ExecutionMode::Sequential
        }
    }
}

/// Output targets a recipe can enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Csv,
    Json,
    ConnectedDatabase,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::ConnectedDatabase => "connected_database",
        }
    }

    /// File extension for file-based formats.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            ExportFormat::Csv => Some("csv"),
            ExportFormat::Json => Some("json"),
            ExportFormat::ConnectedDatabase => None,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_names_are_normalised_and_validated() {
        assert_eq!(CommandName::new("leaf-count").unwrap().as_str(), "leaf_count");
        assert_eq!(CommandName::new("_m1").unwrap().as_str(), "_m1");
        assert!(CommandName::new("1model").is_err());
        assert!(CommandName::new("drop table").is_err());
        assert!(CommandName::new("").is_err());
    }

    #[test]
    fn image_key_is_not_a_command_name() {
        for name in ["image", "Image", " IMAGE "] {
            assert!(matches!(
                CommandName::new(name),
                Err(BatchrunError::ConfigError(msg)) if msg.contains("reserved")
            ));
        }
        assert!(CommandName::new("image_area").is_ok());
    }

    #[test]
    fn execution_mode_follows_max_performance_flag() {
        assert_eq!(ExecutionMode::from_max_performance(true), ExecutionMode::Concurrent);
        assert_eq!(ExecutionMode::from_max_performance(false), ExecutionMode::Sequential);
    }
}
