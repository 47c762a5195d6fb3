// src/export/mod.rs

//! Result exporters.
//!
//! File formats (CSV, JSON) are written once per named table; the relational
//! sink receives the full table once. A failure in one format or one table
//! is recorded in the [`ExportReport`] and never stops the others.

mod csv_export;
pub mod database;
mod json_export;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::fs::FileSystem;
use crate::results::{NamedTable, ResultTable};
use crate::types::ExportFormat;

pub use csv_export::render_csv;
pub use database::SqliteSink;
pub use json_export::{render_json, to_json_rows};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("nothing to export for '{0}'")]
    EmptyTable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to write {path}: {message}")]
    Write { path: String, message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("connected database export requested but no database is configured")]
    NotConfigured,
}

/// One failed export: which format, which target, and why.
#[derive(Debug)]
pub struct ExportFailure {
    pub format: ExportFormat,
    pub target: String,
    pub error: ExportError,
}

#[derive(Debug, Default)]
pub struct ExportReport {
    pub written: Vec<PathBuf>,
    /// Rows upserted into the relational sink, when it ran successfully.
    pub database_rows: Option<usize>,
    pub failures: Vec<ExportFailure>,
}

impl ExportReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Exporter {
    fs: Arc<dyn FileSystem>,
    output_dir: PathBuf,
    sink: Option<SqliteSink>,
}

impl Exporter {
    pub fn new(fs: Arc<dyn FileSystem>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            output_dir: output_dir.into(),
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: SqliteSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Export `tables` in every enabled file format and `full` to the
    /// relational sink when [`ExportFormat::ConnectedDatabase`] is enabled.
    pub fn export(
        &mut self,
        full: &ResultTable,
        tables: &[NamedTable],
        formats: &BTreeSet<ExportFormat>,
    ) -> ExportReport {
        let mut report = ExportReport::default();

        for format in formats {
            match format {
                ExportFormat::Csv | ExportFormat::Json => {
                    for named in tables {
                        self.export_file(*format, named, &mut report);
                    }
                }
                ExportFormat::ConnectedDatabase => self.export_database(full, &mut report),
            }
        }

        info!(
            written = report.written.len(),
            database_rows = ?report.database_rows,
            failures = report.failures.len(),
            "export finished"
        );
        report
    }

    fn export_file(&self, format: ExportFormat, named: &NamedTable, report: &mut ExportReport) {
        let Some(extension) = format.extension() else {
            return;
        };
        let path = self
            .output_dir
            .join(format!("{}.{extension}", named.file_stem()));

        match self.write_file(format, named, &path) {
            Ok(()) => {
                info!(format = %format, path = %path.display(), rows = named.table.len(), "exported");
                report.written.push(path);
            }
            Err(err) => {
                error!(format = %format, path = %path.display(), error = %err, "export failed");
                report.failures.push(ExportFailure {
                    format,
                    target: path.display().to_string(),
                    error: err,
                });
            }
        }
    }

    fn write_file(&self, format: ExportFormat, named: &NamedTable, path: &Path) -> Result<(), ExportError> {
        let wide = named.table.pivot();
        if wide.is_empty() {
            return Err(ExportError::EmptyTable(named.file_stem()));
        }

        let bytes = match format {
            ExportFormat::Csv => render_csv(&wide)?,
            ExportFormat::Json => render_json(&wide)?,
            ExportFormat::ConnectedDatabase => return Ok(()),
        };

        self.fs.write(path, &bytes).map_err(|e| ExportError::Write {
            path: path.display().to_string(),
            message: format!("{e:#}"),
        })
    }

    fn export_database(&mut self, full: &ResultTable, report: &mut ExportReport) {
        let Some(sink) = self.sink.as_mut() else {
            warn!("connected database export enabled without a database sink");
            report.failures.push(ExportFailure {
                format: ExportFormat::ConnectedDatabase,
                target: "database".to_string(),
                error: ExportError::NotConfigured,
            });
            return;
        };

        let target = sink.table().to_string();
        match sink.export(full) {
            Ok(rows) => report.database_rows = Some(rows),
            Err(err) => {
                error!(table = %target, error = %err, "database export failed; transaction rolled back");
                report.failures.push(ExportFailure {
                    format: ExportFormat::ConnectedDatabase,
                    target,
                    error: err,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::results::tables_for_export;
    use crate::types::ExecutionRecord;

    fn table() -> ResultTable {
        ResultTable::from_records(vec![
            ExecutionRecord::new("A_G7_1", "m1", "1"),
            ExecutionRecord::new("A_G8_1", "m1", "2"),
        ])
    }

    fn formats(list: &[ExportFormat]) -> BTreeSet<ExportFormat> {
        list.iter().copied().collect()
    }

    #[test]
    fn writes_one_file_per_group_and_format() {
        let fs = MockFileSystem::new();
        let mut exporter = Exporter::new(Arc::new(fs.clone()), "/out");
        let full = table();
        let tables = tables_for_export(&full, Some(1));

        let report = exporter.export(&full, &tables, &formats(&[ExportFormat::Csv, ExportFormat::Json]));

        assert!(report.is_clean());
        assert_eq!(
            fs.files(),
            vec![
                PathBuf::from("/out/g7.csv"),
                PathBuf::from("/out/g7.json"),
                PathBuf::from("/out/g8.csv"),
                PathBuf::from("/out/g8.json"),
            ]
        );
    }

    #[test]
    fn failing_format_does_not_stop_the_other() {
        let fs = MockFileSystem::new();
        fs.add_dir("/out/results.csv");
        let mut exporter = Exporter::new(Arc::new(fs.clone()), "/out");
        let full = table();
        let tables = tables_for_export(&full, None);

        let report = exporter.export(&full, &tables, &formats(&[ExportFormat::Csv, ExportFormat::Json]));

        assert_eq!(report.written, vec![PathBuf::from("/out/results.json")]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].format, ExportFormat::Csv);
        assert!(matches!(report.failures[0].error, ExportError::Write { .. }));
    }

    #[test]
    fn empty_table_fails_only_its_format() {
        let fs = MockFileSystem::new();
        let mut exporter = Exporter::new(Arc::new(fs.clone()), "/out");
        let empty = ResultTable::new();
        let tables = tables_for_export(&empty, None);

        let report = exporter.export(&empty, &tables, &formats(&[ExportFormat::Json]));
        assert!(matches!(report.failures[0].error, ExportError::EmptyTable(_)));
        assert!(fs.files().is_empty());
    }

    #[test]
    fn database_without_sink_is_reported() {
        let fs = MockFileSystem::new();
        let mut exporter = Exporter::new(Arc::new(fs), "/out");
        let full = table();
        let report = exporter.export(&full, &[], &formats(&[ExportFormat::ConnectedDatabase]));
        assert!(matches!(report.failures[0].error, ExportError::NotConfigured));
        assert_eq!(report.database_rows, None);
    }
}
