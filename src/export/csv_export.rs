// src/export/csv_export.rs

use crate::export::ExportError;
use crate::results::WideTable;
use crate::types::IMAGE_KEY;

/// Render `table` as CSV: `image` followed by one column per command;
/// missing cells are left empty.
pub fn render_csv(table: &WideTable) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = Vec::with_capacity(table.columns.len() + 1);
    header.push(IMAGE_KEY);
    header.extend(table.columns.iter().map(|c| c.as_str()));
    writer.write_record(&header)?;

    for row in &table.rows {
        let mut record = Vec::with_capacity(row.cells.len() + 1);
        record.push(row.image.as_str());
        record.extend(row.cells.iter().map(|c| c.as_deref().unwrap_or("")));
        writer.write_record(&record)?;
    }

    writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error().into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::ResultTable;
    use crate::types::ExecutionRecord;

    #[test]
    fn renders_header_and_rows() {
        let table = ResultTable::from_records(vec![
            ExecutionRecord::new("img1", "m1", "0.9"),
            ExecutionRecord::new("img1", "m2", "a, b"),
            ExecutionRecord::new("img2", "m1", "0.3"),
        ]);
        let bytes = render_csv(&table.pivot()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "image,m1,m2\nimg1,0.9,\"a, b\"\nimg2,0.3,\n");
    }
}
