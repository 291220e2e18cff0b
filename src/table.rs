//! Cell extraction from `;`-delimited statistical table files.
//!
//! Source tables carry a variable-length preamble; the data block is
//! anchored by a marker row whose first cell contains the row-number
//! header. All row offsets are relative to that marker.

use crate::error::Result;
use csv::ReaderBuilder;
use std::path::Path;
use tracing::{debug, warn};

/// Sentinel text identifying the header row of a source table.
pub const ROW_MARKER: &str = "№ строки";

/// Read the cell at (`column`, `row`) from a table file.
///
/// Both coordinates are 1-based; row 1 is the first row after the marker
/// row. Returns `None` when the marker, the row, or the column is absent,
/// or when the cell is blank — sparse historical tables make all of these
/// ordinary outcomes, so none of them is an error.
pub fn extract(path: &Path, column: usize, row: usize) -> Option<String> {
    let records = match read_table(path) {
        Ok(records) => records,
        Err(e) => {
            warn!("Failed to read table {}: {}", path.display(), e);
            return None;
        }
    };
    extract_from_records(&records, column, row)
}

fn read_table(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b';')
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(|cell| cell.to_string()).collect());
    }
    Ok(rows)
}

pub(crate) fn extract_from_records(
    records: &[Vec<String>],
    column: usize,
    row: usize,
) -> Option<String> {
    if column == 0 || row == 0 {
        return None;
    }

    let marker_row = records
        .iter()
        .position(|r| r.first().map_or(false, |cell| cell.contains(ROW_MARKER)))?;

    // Data starts on the row after the marker.
    let target_row = marker_row + 1 + (row - 1);
    let cell = records.get(target_row)?.get(column - 1)?;

    let trimmed = cell.trim();
    if trimmed.is_empty() {
        debug!("Empty cell at row {} column {}", row, column);
        return None;
    }
    Some(trimmed.to_string())
}

/// Parse a raw cell into a number.
///
/// Source tables use a decimal comma. Anything that still fails to parse
/// is missing data, never an error — malformed cells must not abort a
/// batch.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    // "NaN" parses as a float but would poison downstream arithmetic.
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}
