// src/results/table.rs

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::types::ExecutionRecord;

/// Two different values reported for the same (image, command) pair within
/// one aggregation pass. The first value is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueConflict {
    pub image: String,
    pub command: String,
    pub kept: String,
    pub rejected: String,
}

/// image → (command → value).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultTable {
    rows: BTreeMap<String, BTreeMap<String, String>>,
}

/// Output of [`ResultTable::aggregate`].
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub table: ResultTable,
    pub conflicts: Vec<ValueConflict>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold records into a fresh table. A repeated pair with the same value
    /// is harmless; a repeated pair with a different value is reported as a
    /// conflict and does not overwrite.
    pub fn aggregate(records: impl IntoIterator<Item = ExecutionRecord>) -> Aggregation {
        let mut table = ResultTable::new();
        let mut conflicts = Vec::new();

        for record in records {
            if let Err(conflict) = table.insert_new(record) {
                warn!(
                    image = %conflict.image,
                    command = %conflict.command,
                    kept = %conflict.kept,
                    rejected = %conflict.rejected,
                    "conflicting results for the same image; keeping the first"
                );
                conflicts.push(conflict);
            }
        }

        Aggregation { table, conflicts }
    }

    pub fn from_records(records: impl IntoIterator<Item = ExecutionRecord>) -> Self {
        Self::aggregate(records).table
    }

    /// Insert a record unless the pair already holds a different value.
    pub fn insert_new(&mut self, record: ExecutionRecord) -> Result<(), ValueConflict> {
        let row = self.rows.entry(record.image.clone()).or_default();
        match row.get(&record.command) {
            Some(existing) if *existing != record.value => Err(ValueConflict {
                image: record.image,
                command: record.command,
                kept: existing.clone(),
                rejected: record.value,
            }),
            Some(_) => Ok(()),
            None => {
                row.insert(record.command, record.value);
                Ok(())
            }
        }
    }

    /// Explicit re-aggregation: values from `other` overwrite ours.
    pub fn merge(&mut self, other: ResultTable) {
        for (image, cells) in other.rows {
            self.rows.entry(image).or_default().extend(cells);
        }
    }

    pub fn get(&self, image: &str, command: &str) -> Option<&str> {
        self.rows.get(image)?.get(command).map(|s| s.as_str())
    }

    pub fn row(&self, image: &str) -> Option<&BTreeMap<String, String>> {
        self.rows.get(image)
    }

    pub fn images(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(|s| s.as_str())
    }

    /// Every command that has at least one value, sorted.
    pub fn commands(&self) -> BTreeSet<&str> {
        self.rows
            .values()
            .flat_map(|cells| cells.keys().map(|c| c.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Copy of the rows for the given images.
    pub fn subset<'a>(&self, images: impl IntoIterator<Item = &'a str>) -> ResultTable {
        let rows = images
            .into_iter()
            .filter_map(|image| {
                self.rows
                    .get(image)
                    .map(|cells| (image.to_string(), cells.clone()))
            })
            .collect();
        ResultTable { rows }
    }

    /// Pivot into rows = images, columns = commands.
    pub fn pivot(&self) -> WideTable {
        let columns: Vec<String> = self.commands().into_iter().map(str::to_string).collect();
        let rows = self
            .rows
            .iter()
            .map(|(image, cells)| WideRow {
                image: image.clone(),
                cells: columns.iter().map(|c| cells.get(c).cloned()).collect(),
            })
            .collect();
        WideTable { columns, rows }
    }
}

/// Export-ready table: one row per image, one column per command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WideTable {
    /// Command names, sorted. The `image` key column is implicit.
    pub columns: Vec<String>,
    pub rows: Vec<WideRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WideRow {
    pub image: String,
    /// Aligned with `WideTable::columns`; `None` when the command produced
    /// nothing for this image.
    pub cells: Vec<Option<String>>,
}

impl WideTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
