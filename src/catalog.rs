//! Explicit cache of stored indicator summaries.

use crate::error::Result;
use crate::graph::GraphReader;
use crate::model::{IndicatorSummary, NodeId};
use std::fmt::Write as _;
use tracing::info;

/// Cached summaries of the indicator nodes currently in the store.
///
/// The catalog is owned and injected by its callers and refreshes only
/// when told to; it never reloads behind their backs.
pub struct IndicatorCatalog {
    label: String,
    entries: Vec<IndicatorSummary>,
}

impl IndicatorCatalog {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            entries: Vec::new(),
        }
    }

    /// Reload the summaries from the store.
    pub async fn refresh(&mut self, reader: &GraphReader) -> Result<usize> {
        self.entries = reader.list_indicators(&self.label).await?;
        info!(
            "Indicator catalog refreshed: {} entries with label {}",
            self.entries.len(),
            self.label
        );
        Ok(self.entries.len())
    }

    pub fn entries(&self) -> &[IndicatorSummary] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, id: &NodeId) -> Option<&IndicatorSummary> {
        self.entries.iter().find(|entry| &entry.node_id == id)
    }

    /// Listing text for the indicator-matching prompt.
    pub fn prompt_listing(&self) -> String {
        let mut text = String::new();
        for entry in &self.entries {
            let _ = write!(text, "ID: {} | Name: {}", entry.node_id, entry.name);
            if let Some(full_name) = entry
                .full_name
                .as_deref()
                .filter(|full| *full != entry.name)
            {
                let _ = write!(text, " | Full name: {}", full_name);
            }
            if let Some(table) = entry.table_number.as_deref() {
                let _ = write!(text, " | Table: {}", table);
            }
            text.push('\n');
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_listing_shape() {
        let mut catalog = IndicatorCatalog::new("Indicator");
        catalog.entries = vec![IndicatorSummary {
            node_id: NodeId::new("4:abc:7"),
            name: "Студенты".to_string(),
            full_name: Some("Численность студентов".to_string()),
            table_number: Some("2.1.1".to_string()),
        }];
        let listing = catalog.prompt_listing();
        assert!(listing.contains("ID: 4:abc:7"));
        assert!(listing.contains("Full name: Численность студентов"));
        assert!(listing.contains("Table: 2.1.1"));
    }

    #[test]
    fn test_get_by_id() {
        let mut catalog = IndicatorCatalog::new("Indicator");
        catalog.entries = vec![IndicatorSummary {
            node_id: NodeId::new("4:abc:7"),
            name: "n".to_string(),
            full_name: None,
            table_number: None,
        }];
        assert!(catalog.get(&NodeId::new("4:abc:7")).is_some());
        assert!(catalog.get(&NodeId::new("4:abc:8")).is_none());
    }
}
