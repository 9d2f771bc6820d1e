//! CSV documents as a source of raw rows

use super::{RawRow, TableError};
use csv::ReaderBuilder;
use log::debug;

/// Read every record of a CSV document as a raw row.
///
/// No header handling is done here: the preview shows the first row like any
/// other and the user decides what it means. Rows may differ in width.
pub fn read_rows(bytes: &[u8]) -> Result<Vec<RawRow>, TableError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: RawRow = record.iter().map(str::to_string).collect();
        if row.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(TableError::Empty);
    }
    debug!("Read {} rows from CSV document", rows.len());
    Ok(rows)
}
