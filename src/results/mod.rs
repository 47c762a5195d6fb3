// src/results/mod.rs

//! Aggregation of execution records into export-ready tables.

pub mod grouping;
pub mod table;

pub use grouping::{group_by_position, group_key, resolve_group_position, resolve_separation, Grouping};
pub use table::{Aggregation, ResultTable, ValueConflict, WideRow, WideTable};

/// A table headed for export, named after its group (or unnamed when
/// results are not separated).
#[derive(Debug, Clone)]
pub struct NamedTable {
    pub group: Option<String>,
    pub table: ResultTable,
}

impl NamedTable {
    pub fn ungrouped(table: ResultTable) -> Self {
        Self { group: None, table }
    }

    /// File stem used for file exports: the lower-cased group name, or
    /// `results` for the ungrouped table.
    pub fn file_stem(&self) -> String {
        match &self.group {
            Some(group) => group.to_lowercase(),
            None => "results".to_string(),
        }
    }
}

/// Split `table` for export according to the resolved grouping position.
pub fn tables_for_export(table: &ResultTable, position: Option<usize>) -> Vec<NamedTable> {
    match position {
        None => vec![NamedTable::ungrouped(table.clone())],
        Some(pos) => group_by_position(table, pos)
            .groups
            .into_iter()
            .map(|(group, table)| NamedTable {
                group: Some(group),
                table,
            })
            .collect(),
    }
}
