//! Table listings and per-table schema dictionaries for the resolver.

use crate::error::{Result, StatGraphError};
use crate::layout::DataRoot;
use csv::ReaderBuilder;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

/// Row kind marking table entries in the listing file.
const TABLE_KIND: &str = "Таблица";

/// Rows before the column-number line in a table file's header block.
const SCHEMA_HEADER_ROWS: usize = 5;

/// One entry of the table listing shown to the LLM.
#[derive(Debug, Clone)]
pub struct TableEntry {
    pub number: String,
    pub name: String,
}

/// The `;`-delimited listing of available tables.
#[derive(Debug, Clone)]
pub struct TableCatalog {
    pub tables: Vec<TableEntry>,
}

impl TableCatalog {
    /// Load the listing; an unreadable file is fatal for the job.
    pub fn load(path: &Path) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b';')
            .flexible(true)
            .from_path(path)
            .map_err(|e| {
                StatGraphError::Config(format!(
                    "Failed to read table listing {}: {}",
                    path.display(),
                    e
                ))
            })?;

        let mut tables = Vec::new();
        for result in rdr.records() {
            let record = result?;
            if record.len() >= 2 && record.get(1).map(str::trim) == Some(TABLE_KIND) {
                let number = record.get(0).map(str::trim).unwrap_or("").to_string();
                if number.is_empty() {
                    continue;
                }
                let name = record
                    .get(2)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .unwrap_or(&number)
                    .to_string();
                tables.push(TableEntry { number, name });
            }
        }
        Ok(Self { tables })
    }

    /// Listing text for the table-selection prompt.
    pub fn prompt_listing(&self) -> String {
        self.tables
            .iter()
            .map(|t| format!("{}: {}", t.number, t.name))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn name_of(&self, number: &str) -> Option<&str> {
        self.tables
            .iter()
            .find(|t| t.number == number)
            .map(|t| t.name.as_str())
    }
}

/// Column and row dictionaries of one table file.
#[derive(Debug, Clone)]
pub struct TableSchema {
    /// Column number (as printed in the table) -> column name.
    pub columns: BTreeMap<String, String>,
    /// Row number -> row name.
    pub rows: BTreeMap<String, String>,
}

impl TableSchema {
    /// Schema text for the cell-selection prompt.
    pub fn prompt_text(&self) -> String {
        let mut text = String::from("Columns (number: name):\n");
        for (number, name) in &self.columns {
            let _ = writeln!(text, "  {}: {}", number, name);
        }
        text.push_str("Rows (number: name):\n");
        for (number, name) in &self.rows {
            let _ = writeln!(text, "  {}: {}", number, name);
        }
        text
    }
}

/// Read the schema block of a table file.
///
/// The header block has a fixed shape: the 6th line carries column numbers,
/// the 7th column names, and the row dictionary starts on the 8th (first
/// two cells: row number, row name).
pub fn read_table_schema(root: &DataRoot, table: &str, year: &str) -> Result<TableSchema> {
    let path = root.federal_table(year, table);
    if !path.exists() {
        return Err(StatGraphError::Schema(format!(
            "Table file not found: {}",
            path.display()
        )));
    }

    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b';')
        .flexible(true)
        .from_path(&path)?;
    let records: Vec<csv::StringRecord> =
        rdr.records().collect::<std::result::Result<_, _>>()?;

    if records.len() < SCHEMA_HEADER_ROWS + 2 {
        return Err(StatGraphError::Schema(format!(
            "Table {} has no schema header ({} lines)",
            table,
            records.len()
        )));
    }

    let numbers = &records[SCHEMA_HEADER_ROWS];
    let names = &records[SCHEMA_HEADER_ROWS + 1];
    let columns: BTreeMap<String, String> = numbers
        .iter()
        .zip(names.iter())
        .filter(|(number, name)| !number.trim().is_empty() && !name.trim().is_empty())
        .map(|(number, name)| (number.trim().to_string(), name.trim().to_string()))
        .collect();

    let mut rows = BTreeMap::new();
    for record in &records[SCHEMA_HEADER_ROWS + 2..] {
        let number = record.get(0).map(str::trim).unwrap_or("");
        let name = record.get(1).map(str::trim).unwrap_or("");
        if !number.is_empty() && !name.is_empty() {
            rows.insert(number.to_string(), name.to_string());
        }
    }

    Ok(TableSchema { columns, rows })
}
