//! Core data types shared across the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque store-assigned node identifier.
///
/// Wraps the Neo4j `elementId()` string so ids never get mixed up with
/// display names or table identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Data collected for one indicator: a federal time series plus a
/// per-region matrix aligned to the same year list.
///
/// `federal.len()` equals the year count, and so does every row of
/// `regional`; missing values are `None`, never zero.
#[derive(Debug, Clone, Default)]
pub struct Collected {
    pub federal: Vec<Option<f64>>,
    pub regions: Vec<String>,
    pub regional: Vec<Vec<Option<f64>>>,
}

/// A stored indicator read back from the graph.
#[derive(Debug, Clone)]
pub struct IndicatorData {
    pub node_id: NodeId,
    pub name: String,
    pub years: Vec<String>,
    pub federal_values: Vec<Option<f64>>,
    pub regions: Vec<String>,
    pub regional_values: Vec<Vec<Option<f64>>>,
}

/// Summary row for indicator listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSummary {
    pub node_id: NodeId,
    pub name: String,
    pub full_name: Option<String>,
    pub table_number: Option<String>,
}
