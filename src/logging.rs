// src/logging.rs

//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `BATCHRUN_LOG` environment variable (a level or a full filter such as
//!    `batchrun=debug`)
//! 3. default to `info`
//!
//! Logs go to stderr; stdout carries only the completion marker and dry-run
//! output.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "BATCHRUN_LOG";

/// Initialise the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = build_filter(cli_level, std::env::var(LOG_ENV_VAR).ok().as_deref());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}

fn build_filter(cli_level: Option<LogLevel>, env_value: Option<&str>) -> EnvFilter {
    if let Some(level) = cli_level {
        return EnvFilter::new(level_name(level));
    }

    env_value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| EnvFilter::try_new(normalise(s)).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn level_name(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

fn normalise(value: &str) -> String {
    if value.eq_ignore_ascii_case("warning") {
        "warn".to_string()
    } else {
        value.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flag_wins_over_env() {
        let filter = build_filter(Some(LogLevel::Debug), Some("error"));
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn env_value_is_used_when_flag_missing() {
        assert_eq!(build_filter(None, Some("WARNING")).to_string(), "warn");
        assert_eq!(build_filter(None, Some("batchrun=trace")).to_string(), "batchrun=trace");
    }

    #[test]
    fn falls_back_to_info() {
        assert_eq!(build_filter(None, None).to_string(), "info");
        assert_eq!(build_filter(None, Some("  ")).to_string(), "info");
    }
}
