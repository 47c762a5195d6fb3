// src/export/database.rs

//! Relational sink: upserts result rows into a pre-existing SQLite table,
//! adding result columns on demand.

use std::collections::HashSet;

use rusqlite::{params_from_iter, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::errors::{BatchrunError, Result};
use crate::export::ExportError;
use crate::results::ResultTable;
use crate::types::IMAGE_KEY;

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Single writer for the configured table.
#[derive(Debug)]
pub struct SqliteSink {
    conn: Connection,
    table: String,
}

impl SqliteSink {
    /// Open the database and check the table exists. Both are preconditions
    /// of a run, so failures here are configuration errors.
    pub fn open(cfg: &DatabaseConfig) -> Result<Self> {
        if !cfg.path.is_file() {
            return Err(BatchrunError::ConfigError(format!(
                "database not found: {}",
                cfg.path.display()
            )));
        }

        let conn = Connection::open_with_flags(
            &cfg.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::from_connection(conn, &cfg.table)
    }

    /// Wrap an existing connection (used with in-memory databases).
    pub fn from_connection(conn: Connection, table: &str) -> Result<Self> {
        let exists = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
                [table],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .is_some();

        if !exists {
            return Err(BatchrunError::ConfigError(format!(
                "table '{table}' not found in database"
            )));
        }

        Ok(Self {
            conn,
            table: table.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Upsert every row of `table` in one transaction and return the number
    /// of rows written. Nothing is committed unless every row succeeds.
    pub fn export(&mut self, table: &ResultTable) -> std::result::Result<usize, ExportError> {
        let wide = table.pivot();
        if wide.is_empty() {
            return Err(ExportError::EmptyTable(self.table.clone()));
        }

        let target = quote_ident(&self.table);
        let tx = self.conn.transaction()?;

        // Ensure columns. SQLite identifiers are case-insensitive.
        let existing: HashSet<String> = {
            let mut stmt = tx.prepare(&format!("PRAGMA table_info({target})"))?;
            let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
            names
                .map(|name| name.map(|n| n.to_ascii_lowercase()))
                .collect::<rusqlite::Result<_>>()?
        };

        for column in std::iter::once(IMAGE_KEY).chain(wide.columns.iter().map(|c| c.as_str())) {
            if !existing.contains(&column.to_ascii_lowercase()) {
                debug!(table = %self.table, column, "adding column");
                tx.execute(
                    &format!("ALTER TABLE {target} ADD COLUMN {} TEXT", quote_ident(column)),
                    [],
                )?;
            }
        }

        let image_col = quote_ident(IMAGE_KEY);
        let assignments = wide
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = ?{}", quote_ident(c), i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let update_sql = format!(
            "UPDATE {target} SET {assignments} WHERE {image_col} = ?{}",
            wide.columns.len() + 1
        );
        let insert_columns = std::iter::once(image_col.clone())
            .chain(wide.columns.iter().map(|c| quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=wide.columns.len() + 1)
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let insert_sql = format!("INSERT INTO {target} ({insert_columns}) VALUES ({placeholders})");
        let exists_sql = format!("SELECT 1 FROM {target} WHERE {image_col} = ?1 LIMIT 1");

        let mut updated = 0usize;
        let mut inserted = 0usize;
        {
            let mut exists_stmt = tx.prepare(&exists_sql)?;
            let mut update_stmt = tx.prepare(&update_sql)?;
            let mut insert_stmt = tx.prepare(&insert_sql)?;

            for row in &wide.rows {
                let present = exists_stmt
                    .query_row([&row.image], |_| Ok(()))
                    .optional()?
                    .is_some();

                if present {
                    let values = row
                        .cells
                        .iter()
                        .cloned()
                        .chain(std::iter::once(Some(row.image.clone())));
                    update_stmt.execute(params_from_iter(values))?;
                    updated += 1;
                } else {
                    let values = std::iter::once(Some(row.image.clone())).chain(row.cells.iter().cloned());
                    insert_stmt.execute(params_from_iter(values))?;
                    inserted += 1;
                }
            }
        }

        tx.commit()?;

        info!(table = %self.table, inserted, updated, "database export committed");
        Ok(inserted + updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExecutionRecord;

    fn sink() -> SqliteSink {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE phenotypes (image TEXT PRIMARY KEY, notes TEXT)", [])
            .unwrap();
        SqliteSink::from_connection(conn, "phenotypes").unwrap()
    }

    fn count(sink: &SqliteSink, sql: &str) -> i64 {
        sink.connection().query_row(sql, [], |r| r.get(0)).unwrap()
    }

    #[test]
    fn missing_table_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        let err = SqliteSink::from_connection(conn, "nope").unwrap_err();
        assert!(matches!(err, BatchrunError::ConfigError(msg) if msg.contains("nope")));
    }

    #[test]
    fn upsert_keeps_one_row_with_latest_values() {
        let mut sink = sink();

        let first = ResultTable::from_records(vec![ExecutionRecord::new("img1", "m1", "0.1")]);
        assert_eq!(sink.export(&first).unwrap(), 1);

        let second = ResultTable::from_records(vec![
            ExecutionRecord::new("img1", "m1", "0.9"),
            ExecutionRecord::new("img1", "m2", "tall"),
        ]);
        assert_eq!(sink.export(&second).unwrap(), 1);

        assert_eq!(count(&sink, "SELECT COUNT(*) FROM phenotypes WHERE image = 'img1'"), 1);
        let (m1, m2): (String, String) = sink
            .connection()
            .query_row(
                "SELECT m1, m2 FROM phenotypes WHERE image = 'img1'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(m1, "0.9");
        assert_eq!(m2, "tall");
    }

    #[test]
    fn existing_columns_match_regardless_of_case() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE Phenotypes (Image TEXT PRIMARY KEY, Leaf_Count TEXT)", [])
            .unwrap();
        let mut sink = SqliteSink::from_connection(conn, "phenotypes").unwrap();

        let table = ResultTable::from_records(vec![ExecutionRecord::new("img1", "leaf_count", "3")]);
        assert_eq!(sink.export(&table).unwrap(), 1);
        assert_eq!(sink.export(&table).unwrap(), 1);

        assert_eq!(count(&sink, "SELECT COUNT(*) FROM pragma_table_info('Phenotypes')"), 2);
        let value: String = sink
            .connection()
            .query_row("SELECT Leaf_Count FROM Phenotypes WHERE Image = 'img1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(value, "3");
    }

    #[test]
    fn adding_columns_is_idempotent() {
        let mut sink = sink();
        let table = ResultTable::from_records(vec![ExecutionRecord::new("img1", "m1", "1")]);
        sink.export(&table).unwrap();
        sink.export(&table).unwrap();
        assert_eq!(
            count(&sink, "SELECT COUNT(*) FROM pragma_table_info('phenotypes') WHERE name = 'm1'"),
            1
        );
    }

    #[test]
    fn failing_row_rolls_back_everything() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE phenotypes (image TEXT PRIMARY KEY, m1 TEXT CHECK (m1 <> 'bad'))",
            [],
        )
        .unwrap();
        let mut sink = SqliteSink::from_connection(conn, "phenotypes").unwrap();

        let table = ResultTable::from_records(vec![
            ExecutionRecord::new("img1", "m1", "ok"),
            ExecutionRecord::new("img2", "m1", "bad"),
            ExecutionRecord::new("img2", "m2", "x"),
        ]);
        assert!(matches!(sink.export(&table), Err(ExportError::Database(_))));

        assert_eq!(count(&sink, "SELECT COUNT(*) FROM phenotypes"), 0);
        // The column added in the failed transaction is rolled back too.
        assert_eq!(
            count(&sink, "SELECT COUNT(*) FROM pragma_table_info('phenotypes') WHERE name = 'm2'"),
            0
        );
    }

    #[test]
    fn empty_table_is_a_structural_failure() {
        let mut sink = sink();
        assert!(matches!(
            sink.export(&ResultTable::new()),
            Err(ExportError::EmptyTable(_))
        ));
    }
}
