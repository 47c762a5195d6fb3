// src/export/json_export.rs

use serde_json::{Map, Value};

use crate::export::ExportError;
use crate::results::WideTable;
use crate::types::IMAGE_KEY;

/// One object per image: `image` first, then one key per command (`null`
/// where the command produced nothing).
pub fn to_json_rows(table: &WideTable) -> Vec<Value> {
    table
        .rows
        .iter()
        .map(|row| {
            let mut object = Map::new();
            object.insert(IMAGE_KEY.to_string(), Value::String(row.image.clone()));
            for (column, cell) in table.columns.iter().zip(&row.cells) {
                let value = cell.clone().map(Value::String).unwrap_or(Value::Null);
                object.insert(column.clone(), value);
            }
            Value::Object(object)
        })
        .collect()
}

pub fn render_json(table: &WideTable) -> Result<Vec<u8>, ExportError> {
    let rows = to_json_rows(table);
    Ok(serde_json::to_vec_pretty(&rows)?)
}
