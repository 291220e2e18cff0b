//! Batch and connection configuration.

use crate::error::{Result, StatGraphError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Years covered by a standard collection run.
pub fn default_years() -> Vec<String> {
    (2016..=2024).map(|y| y.to_string()).collect()
}

/// Neo4j connection settings, loaded from JSON with env overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    #[serde(alias = "NEO4J_URI")]
    pub uri: String,
    #[serde(alias = "NEO4J_USERNAME")]
    pub username: String,
    #[serde(alias = "NEO4J_PASSWORD")]
    pub password: String,
    #[serde(default, alias = "NEO4J_DATABASE")]
    pub database: Option<String>,
}

impl GraphConfig {
    /// Load from a JSON file; missing credentials are fatal for the job.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            StatGraphError::Config(format!(
                "Failed to read graph config {}: {}",
                path.display(),
                e
            ))
        })?;
        let mut config: GraphConfig = serde_json::from_str(&text)
            .map_err(|e| StatGraphError::Config(format!("Invalid graph config: {}", e)))?;
        config.apply_env();
        Ok(config)
    }

    /// Build entirely from environment variables.
    pub fn from_env() -> Result<Self> {
        let uri = std::env::var("NEO4J_URI")
            .map_err(|_| StatGraphError::Config("NEO4J_URI is not set".to_string()))?;
        let username = std::env::var("NEO4J_USERNAME")
            .map_err(|_| StatGraphError::Config("NEO4J_USERNAME is not set".to_string()))?;
        let password = std::env::var("NEO4J_PASSWORD")
            .map_err(|_| StatGraphError::Config("NEO4J_PASSWORD is not set".to_string()))?;
        Ok(Self {
            uri,
            username,
            password,
            database: std::env::var("NEO4J_DATABASE").ok(),
        })
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("NEO4J_URI") {
            self.uri = v;
        }
        if let Ok(v) = std::env::var("NEO4J_USERNAME") {
            self.username = v;
        }
        if let Ok(v) = std::env::var("NEO4J_PASSWORD") {
            self.password = v;
        }
        if let Ok(v) = std::env::var("NEO4J_DATABASE") {
            self.database = Some(v);
        }
    }
}

/// A (table, column, row) cell address within one year's table file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellCoords {
    #[serde(rename = "table_number")]
    pub table: String,
    pub column: usize,
    pub row: usize,
}

impl CellCoords {
    fn validate(&self) -> Result<()> {
        if self.column == 0 || self.row == 0 {
            return Err(StatGraphError::Config(format!(
                "Cell coordinates are 1-based, got column={} row={}",
                self.column, self.row
            )));
        }
        Ok(())
    }
}

/// Coordinates for one contiguous span of years.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodCoords {
    pub from: u16,
    pub to: u16,
    #[serde(flatten)]
    pub coords: CellCoords,
}

/// Where an indicator's values come from, resolved once at config load.
///
/// Tables were renumbered between reporting periods, so one indicator may
/// need a different cell address per year span. Years covered by no period
/// stay missing — that is a data gap, not an error.
#[derive(Debug, Clone)]
pub enum CoordinatePlan {
    /// One cell address applied to every configured year.
    Single(CellCoords),
    /// Distinct addresses per year span.
    Periods(Vec<PeriodCoords>),
}

impl CoordinatePlan {
    pub fn for_year(&self, year: &str) -> Option<&CellCoords> {
        match self {
            CoordinatePlan::Single(coords) => Some(coords),
            CoordinatePlan::Periods(periods) => {
                let y: u16 = year.parse().ok()?;
                periods
                    .iter()
                    .find(|p| p.from <= y && y <= p.to)
                    .map(|p| &p.coords)
            }
        }
    }
}

/// A single label or a list of labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Labels {
    One(String),
    Many(Vec<String>),
}

impl Labels {
    pub fn as_vec(&self) -> Vec<String> {
        match self {
            Labels::One(label) => vec![label.clone()],
            Labels::Many(labels) => labels.clone(),
        }
    }
}

/// Source coordinates as they appear in batch JSON: either flat
/// table/column/row keys or a list of period blocks.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SourceSpec {
    Periods { periods: Vec<PeriodCoords> },
    Single {
        #[serde(flatten)]
        coords: CellCoords,
    },
}

/// One source-backed node in a batch config.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub node_name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(alias = "node_label")]
    pub labels: Labels,
    #[serde(flatten)]
    pub source: SourceSpec,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl NodeConfig {
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| StatGraphError::Config(format!("Invalid node config: {}", e)))
    }

    /// Resolve the coordinate plan, validating ranges up front.
    pub fn plan(&self) -> Result<CoordinatePlan> {
        match &self.source {
            SourceSpec::Single { coords } => {
                coords.validate()?;
                Ok(CoordinatePlan::Single(coords.clone()))
            }
            SourceSpec::Periods { periods } => {
                if periods.is_empty() {
                    return Err(StatGraphError::Config(format!(
                        "Node '{}' has an empty period list",
                        self.node_name
                    )));
                }
                for period in periods {
                    period.coords.validate()?;
                    if period.from > period.to {
                        return Err(StatGraphError::Config(format!(
                            "Node '{}': period {}-{} is inverted",
                            self.node_name, period.from, period.to
                        )));
                    }
                }
                for (i, a) in periods.iter().enumerate() {
                    for b in &periods[i + 1..] {
                        if a.from <= b.to && b.from <= a.to {
                            return Err(StatGraphError::Config(format!(
                                "Node '{}': periods {}-{} and {}-{} overlap",
                                self.node_name, a.from, a.to, b.from, b.to
                            )));
                        }
                    }
                }
                Ok(CoordinatePlan::Periods(periods.clone()))
            }
        }
    }
}

/// One derived node in a batch config.
#[derive(Debug, Clone, Deserialize)]
pub struct DerivedConfig {
    pub node_name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(alias = "node_label")]
    pub labels: Labels,
    pub formula: String,
    #[serde(alias = "child_nodes")]
    pub inputs: Vec<String>,
}

impl DerivedConfig {
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| StatGraphError::Config(format!("Invalid derived node config: {}", e)))
    }
}
