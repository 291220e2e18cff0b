//! Batch processing of node configurations.
//!
//! A batch keeps going past per-item failures: one bad config or one store
//! hiccup marks that node failed and the run moves on. Only file-level
//! problems (unreadable config, invalid JSON, missing top-level key) abort
//! a job, and only at startup.

use crate::collect::Collector;
use crate::config::{CoordinatePlan, DerivedConfig, NodeConfig};
use crate::derive;
use crate::error::{Result, StatGraphError};
use crate::expr::{self, Expr};
use crate::graph::{GraphReader, GraphWriter, PropValue};
use crate::layout::DataRoot;
use crate::model::NodeId;
use crate::regions::RegionMatcher;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Outcome of one batch run.
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub success: bool,
    pub total: usize,
    pub created: usize,
    pub failed: usize,
    pub created_ids: Vec<NodeId>,
    pub log: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    fn start(total: usize) -> Self {
        Self {
            success: false,
            total,
            created: 0,
            failed: 0,
            created_ids: Vec::new(),
            log: Vec::new(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    fn note(&mut self, message: String) {
        info!("{}", message);
        self.log.push(message);
    }

    fn fail(&mut self, message: String) {
        warn!("{}", message);
        self.log.push(message);
        self.failed += 1;
    }

    fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self.success = self.failed == 0;
        self.log.push(format!(
            "Batch finished: {}/{} nodes created, {} failed",
            self.created, self.total, self.failed
        ));
        self
    }
}

/// Load a batch document and pull out its item array.
///
/// Returns the raw items plus the optional `years` override; items are
/// validated one by one later so a single malformed entry cannot sink the
/// whole file.
pub fn load_batch_document(
    path: &Path,
    key: &str,
) -> Result<(Vec<serde_json::Value>, Option<Vec<String>>)> {
    let text = fs::read_to_string(path).map_err(|e| {
        StatGraphError::Config(format!(
            "Failed to read batch config {}: {}",
            path.display(),
            e
        ))
    })?;
    let doc: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| StatGraphError::Config(format!("Invalid batch config: {}", e)))?;

    let items = doc
        .get(key)
        .and_then(|v| v.as_array())
        .cloned()
        .ok_or_else(|| StatGraphError::Config(format!("Batch config has no '{}' array", key)))?;

    let years = doc.get("years").and_then(|v| v.as_array()).map(|values| {
        values
            .iter()
            .filter_map(|v| v.as_str())
            .map(String::from)
            .collect()
    });

    Ok((items, years))
}

/// Parse and plan one source-backed item without touching the store.
pub fn plan_ingest_item(item: &serde_json::Value) -> Result<(NodeConfig, CoordinatePlan)> {
    let config = NodeConfig::from_value(item)?;
    let plan = config.plan()?;
    Ok((config, plan))
}

/// Parse and compile one derived item without touching the store.
pub fn plan_derive_item(item: &serde_json::Value) -> Result<(DerivedConfig, Expr)> {
    let config = DerivedConfig::from_value(item)?;
    let compiled = Expr::parse(&config.formula)?;
    if compiled.arity() > config.inputs.len() {
        return Err(StatGraphError::Formula(format!(
            "Formula '{}' references {} inputs but only {} are configured",
            config.formula,
            compiled.arity(),
            config.inputs.len()
        )));
    }
    Ok((config, compiled))
}

/// Process a batch of source-backed node configs.
pub async fn run_ingest(
    writer: &GraphWriter,
    root: &DataRoot,
    years: &[String],
    matcher: Option<&RegionMatcher>,
    items: &[serde_json::Value],
) -> BatchReport {
    let mut report = BatchReport::start(items.len());
    for (i, item) in items.iter().enumerate() {
        let display = item
            .get("node_name")
            .and_then(|v| v.as_str())
            .unwrap_or("unnamed")
            .to_string();
        report.note(format!(
            "Processing node {}/{}: '{}'",
            i + 1,
            items.len(),
            display
        ));
        match ingest_one(writer, root, years, matcher, item).await {
            Ok(node_id) => {
                report.note(format!("Node '{}' created with id {}", display, node_id));
                report.created_ids.push(node_id);
                report.created += 1;
            }
            Err(e) => report.fail(format!("Node '{}' failed: {}", display, e)),
        }
    }
    report.finish()
}

async fn ingest_one(
    writer: &GraphWriter,
    root: &DataRoot,
    years: &[String],
    matcher: Option<&RegionMatcher>,
    item: &serde_json::Value,
) -> Result<NodeId> {
    let (config, plan) = plan_ingest_item(item)?;

    let mut collector = Collector::new(root, years);
    if let Some(matcher) = matcher {
        collector = collector.with_matcher(matcher);
    }
    let collected = collector.collect(&plan);
    info!(
        "Collected '{}': federal {:?}, {} regions",
        config.node_name,
        collected.federal,
        collected.regions.len()
    );

    let full_name = config
        .full_name
        .clone()
        .unwrap_or_else(|| config.node_name.clone());
    let mut properties: Vec<(String, PropValue)> = vec![
        ("name".to_string(), PropValue::Str(config.node_name.clone())),
        ("full_name".to_string(), PropValue::Str(full_name)),
        ("years".to_string(), PropValue::StrList(years.to_vec())),
        (
            "federal_values".to_string(),
            PropValue::Series(collected.federal.clone()),
        ),
    ];
    match &plan {
        CoordinatePlan::Single(coords) => {
            properties.push(("table_number".to_string(), PropValue::Str(coords.table.clone())));
            properties.push(("column".to_string(), PropValue::Int(coords.column as i64)));
            properties.push(("row".to_string(), PropValue::Int(coords.row as i64)));
        }
        CoordinatePlan::Periods(periods) => {
            properties.push((
                "periods_json".to_string(),
                PropValue::Str(serde_json::to_string(periods)?),
            ));
        }
    }
    for (key, value) in &config.properties {
        properties.push((key.clone(), PropValue::from_json(value)));
    }

    let node_id = writer
        .write_indicator(&config.labels.as_vec(), properties)
        .await?;
    writer
        .write_regional_edges(&node_id, years, &collected.regions, &collected.regional)
        .await?;
    Ok(node_id)
}

/// Process a batch of derived node configs.
pub async fn run_derive(
    writer: &GraphWriter,
    reader: &GraphReader,
    years: &[String],
    items: &[serde_json::Value],
) -> BatchReport {
    let mut report = BatchReport::start(items.len());
    for (i, item) in items.iter().enumerate() {
        let display = item
            .get("node_name")
            .and_then(|v| v.as_str())
            .unwrap_or("unnamed")
            .to_string();
        report.note(format!(
            "Processing derived node {}/{}: '{}'",
            i + 1,
            items.len(),
            display
        ));
        match derive_one(writer, reader, years, item).await {
            Ok(node_id) => {
                report.note(format!(
                    "Derived node '{}' created with id {}",
                    display, node_id
                ));
                report.created_ids.push(node_id);
                report.created += 1;
            }
            Err(e) => report.fail(format!("Derived node '{}' failed: {}", display, e)),
        }
    }
    report.finish()
}

async fn derive_one(
    writer: &GraphWriter,
    reader: &GraphReader,
    years: &[String],
    item: &serde_json::Value,
) -> Result<NodeId> {
    let (config, compiled) = plan_derive_item(item)?;
    info!(
        "Formula '{}' references {:?}",
        config.formula,
        expr::referenced_variables(&config.formula)
    );

    let input_ids: Vec<NodeId> = config.inputs.iter().cloned().map(NodeId::new).collect();
    let mut inputs = Vec::with_capacity(input_ids.len());
    for id in &input_ids {
        match reader.fetch_indicator(id).await? {
            Some(data) => inputs.push(data),
            None => inputs.push(derive::synthesize_missing(id, years)),
        }
    }

    let federal = derive::federal_series(&compiled, &inputs, years);
    let (regions, regional) = derive::regional_series(&compiled, &inputs, years);
    info!(
        "Derived '{}': federal {:?}, {} regions",
        config.node_name,
        federal,
        regions.len()
    );

    let full_name = config
        .full_name
        .clone()
        .unwrap_or_else(|| config.node_name.clone());
    let properties: Vec<(String, PropValue)> = vec![
        ("name".to_string(), PropValue::Str(config.node_name.clone())),
        ("full_name".to_string(), PropValue::Str(full_name)),
        ("years".to_string(), PropValue::StrList(years.to_vec())),
        ("federal_values".to_string(), PropValue::Series(federal)),
        ("formula".to_string(), PropValue::Str(config.formula.clone())),
        (
            "input_ids".to_string(),
            PropValue::StrList(config.inputs.clone()),
        ),
    ];

    let node_id = writer
        .write_indicator(&config.labels.as_vec(), properties)
        .await?;
    writer
        .write_regional_edges(&node_id, years, &regions, &regional)
        .await?;
    writer.write_derivation_edges(&node_id, &input_ids).await?;
    Ok(node_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_counts_valid_and_invalid_items() {
        let items = vec![
            json!({"node_name": "a", "labels": "Indicator",
                   "table_number": "1.1", "column": 2, "row": 3}),
            json!({"node_name": "b"}),
            json!({"node_name": "c", "labels": "Indicator",
                   "table_number": "1.2", "column": 1, "row": 1}),
            json!({"node_name": "d", "labels": "Indicator",
                   "table_number": "1.3", "column": 0, "row": 1}),
        ];
        let results: Vec<bool> = items
            .iter()
            .map(|item| plan_ingest_item(item).is_ok())
            .collect();
        assert_eq!(results, vec![true, false, true, false]);
        assert_eq!(results.iter().filter(|ok| **ok).count(), 2);
    }

    #[test]
    fn test_plan_derive_rejects_bad_formula() {
        let item = json!({
            "node_name": "ratio", "labels": "Derived",
            "formula": "node_id1 /", "inputs": ["x"]
        });
        assert!(plan_derive_item(&item).is_err());
    }

    #[test]
    fn test_plan_derive_rejects_underbound_inputs() {
        let item = json!({
            "node_name": "ratio", "labels": "Derived",
            "formula": "node_id1 / node_id2", "inputs": ["only-one"]
        });
        assert!(plan_derive_item(&item).is_err());
    }

    #[test]
    fn test_plan_derive_accepts_well_formed() {
        let item = json!({
            "node_name": "ratio", "labels": "Derived",
            "formula": "node_id1 / node_id2", "inputs": ["a", "b"]
        });
        let (config, compiled) = plan_derive_item(&item).unwrap();
        assert_eq!(config.inputs.len(), 2);
        assert_eq!(compiled.arity(), 2);
    }

    #[test]
    fn test_report_success_flag() {
        let mut report = BatchReport::start(2);
        report.created += 1;
        report.fail("boom".to_string());
        let report = report.finish();
        assert!(!report.success);
        assert_eq!(report.failed, 1);

        let mut report = BatchReport::start(1);
        report.created += 1;
        let report = report.finish();
        assert!(report.success);
    }
}
