//! Natural-language question to table-cell resolution.
//!
//! Two sequential LLM calls — pick a table from the catalog, then pick
//! cells from that table's schema — followed by literal value retrieval
//! from the source files. The LLM is best-effort glue: sentinels,
//! transport failures and malformed responses all collapse into a
//! structured not-found outcome. This component performs no graph writes,
//! so a retry re-runs the same computation with no side effects.

use crate::collect;
use crate::layout::DataRoot;
use crate::llm::{self, LlmClient};
use crate::schema::{self, TableCatalog, TableSchema};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Sentinel answer for "no suitable table".
pub const NO_TABLE_SENTINEL: &str = "NO_SUITABLE_TABLE";
/// Sentinel answer for "no matching cells".
pub const NO_CELLS_SENTINEL: &str = "NO_MATCHING_CELLS";

#[derive(Debug, Clone, Deserialize)]
pub struct TableChoice {
    pub table_number: String,
    #[serde(default)]
    pub table_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CellChoice {
    pub column_name: String,
    pub column_number: usize,
    pub row_name: String,
    pub row_number: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CellsChoice {
    pub cells: Vec<CellChoice>,
}

/// Literal values retrieved for one chosen cell, keyed by year.
#[derive(Debug, Clone)]
pub struct CellValues {
    pub cell: CellChoice,
    pub values: BTreeMap<String, Option<String>>,
}

/// Outcome of a resolution run.
#[derive(Debug)]
pub enum ResolverOutcome {
    Found {
        table_number: String,
        table_name: String,
        cells: Vec<CellValues>,
    },
    NoTable,
    NoCells {
        table_number: String,
    },
}

pub struct QueryResolver<'a> {
    llm: &'a LlmClient,
    catalog: &'a TableCatalog,
    root: &'a DataRoot,
}

impl<'a> QueryResolver<'a> {
    pub fn new(llm: &'a LlmClient, catalog: &'a TableCatalog, root: &'a DataRoot) -> Self {
        Self { llm, catalog, root }
    }

    /// Resolve a question to cell values over the given year range.
    pub async fn resolve(&self, user_query: &str, years: &[String]) -> ResolverOutcome {
        let table = match self.select_table(user_query).await {
            Some(table) => table,
            None => return ResolverOutcome::NoTable,
        };
        info!("Selected table {} for query", table.table_number);

        // Schema comes from the newest requested year's file.
        let schema_year = years.last().map(String::as_str).unwrap_or("2024");
        let table_schema =
            match schema::read_table_schema(self.root, &table.table_number, schema_year) {
                Ok(s) => s,
                Err(e) => {
                    warn!(
                        "Failed to read schema of table {}: {}",
                        table.table_number, e
                    );
                    return ResolverOutcome::NoCells {
                        table_number: table.table_number,
                    };
                }
            };

        let cells = match self.select_cells(user_query, &table_schema).await {
            Some(choice) if !choice.cells.is_empty() => choice.cells,
            _ => {
                return ResolverOutcome::NoCells {
                    table_number: table.table_number,
                }
            }
        };
        info!("Selected {} cells for query", cells.len());

        let cells = cells
            .into_iter()
            .map(|cell| {
                let values = collect::collect_raw_values(
                    self.root,
                    &table.table_number,
                    cell.column_number,
                    cell.row_number,
                    years,
                );
                CellValues { cell, values }
            })
            .collect();

        let table_name = self
            .catalog
            .name_of(&table.table_number)
            .unwrap_or(&table.table_name)
            .to_string();
        ResolverOutcome::Found {
            table_number: table.table_number,
            table_name,
            cells,
        }
    }

    async fn select_table(&self, user_query: &str) -> Option<TableChoice> {
        let prompt = format!(
            "Pick the table best suited to answer the user's question. \
             Only tables qualify, not sections.\n\
             Answer as JSON: {{\"table_number\": \"...\", \"table_name\": \"...\"}}. \
             If no table fits, answer {{\"table_number\": \"{NO_TABLE_SENTINEL}\"}}.\n\n\
             User question: {user_query}\n\nAvailable tables:\n{}",
            self.catalog.prompt_listing()
        );
        let content = match self.llm.complete(&prompt).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Table selection call failed: {}", e);
                return None;
            }
        };
        parse_table_choice(&content)
    }

    async fn select_cells(&self, user_query: &str, table_schema: &TableSchema) -> Option<CellsChoice> {
        let prompt = format!(
            "Using the table schema, list every cell holding information that \
             answers the user's question.\n\
             Answer as JSON: {{\"cells\": [{{\"column_name\": \"...\", \
             \"column_number\": N, \"row_name\": \"...\", \"row_number\": N}}]}}. \
             If no cells fit, answer {{\"cells\": [], \"note\": \"{NO_CELLS_SENTINEL}\"}}.\n\n\
             User question: {user_query}\n\nTable schema:\n{}",
            table_schema.prompt_text()
        );
        let content = match self.llm.complete(&prompt).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Cell selection call failed: {}", e);
                return None;
            }
        };
        parse_cells_choice(&content)
    }
}

/// Parse the table-selection response; sentinels and junk become `None`.
pub fn parse_table_choice(content: &str) -> Option<TableChoice> {
    if content.contains(NO_TABLE_SENTINEL) {
        return None;
    }
    match llm::parse_json_content::<TableChoice>(content) {
        Ok(choice) if !choice.table_number.trim().is_empty() => Some(choice),
        Ok(_) => None,
        Err(e) => {
            warn!("Unparseable table choice: {}", e);
            None
        }
    }
}

/// Parse the cell-selection response; sentinels, junk and 0-based
/// coordinates become `None`.
pub fn parse_cells_choice(content: &str) -> Option<CellsChoice> {
    if content.contains(NO_CELLS_SENTINEL) {
        return None;
    }
    match llm::parse_json_content::<CellsChoice>(content) {
        Ok(choice) => {
            let cells: Vec<CellChoice> = choice
                .cells
                .into_iter()
                .filter(|cell| cell.column_number >= 1 && cell.row_number >= 1)
                .collect();
            if cells.is_empty() {
                None
            } else {
                Some(CellsChoice { cells })
            }
        }
        Err(e) => {
            warn!("Unparseable cells choice: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_choice_parsing() {
        let choice = parse_table_choice(r#"{"table_number": "2.5.1", "table_name": "Кадры"}"#);
        assert_eq!(choice.unwrap().table_number, "2.5.1");
    }

    #[test]
    fn test_table_sentinel_is_not_found() {
        assert!(parse_table_choice(&format!(
            r#"{{"table_number": "{NO_TABLE_SENTINEL}"}}"#
        ))
        .is_none());
        assert!(parse_table_choice(NO_TABLE_SENTINEL).is_none());
    }

    #[test]
    fn test_table_garbage_is_not_found() {
        assert!(parse_table_choice("I could not find a table, sorry").is_none());
        assert!(parse_table_choice(r#"{"table_number": ""}"#).is_none());
    }

    #[test]
    fn test_cells_choice_parsing() {
        let content = r#"{"cells": [
            {"column_name": "Всего", "column_number": 3, "row_name": "Численность", "row_number": 1}
        ]}"#;
        let choice = parse_cells_choice(content).unwrap();
        assert_eq!(choice.cells.len(), 1);
        assert_eq!(choice.cells[0].column_number, 3);
    }

    #[test]
    fn test_cells_sentinel_and_empty_are_not_found() {
        assert!(parse_cells_choice(NO_CELLS_SENTINEL).is_none());
        assert!(parse_cells_choice(r#"{"cells": []}"#).is_none());
    }

    #[test]
    fn test_zero_based_cells_filtered_out() {
        let content = r#"{"cells": [
            {"column_name": "x", "column_number": 0, "row_name": "y", "row_number": 1}
        ]}"#;
        assert!(parse_cells_choice(content).is_none());
    }

    #[test]
    fn test_fenced_cells_response_accepted() {
        let content = "```json\n{\"cells\": [{\"column_name\": \"a\", \"column_number\": 1, \"row_name\": \"b\", \"row_number\": 2}]}\n```";
        assert!(parse_cells_choice(content).is_some());
    }
}
