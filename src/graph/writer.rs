//! Write side of the graph: indicator nodes, region nodes, edges.

use crate::error::{Result, StatGraphError};
use crate::graph::GraphClient;
use crate::model::NodeId;
use neo4rs::{query, Query};
use tracing::{info, warn};

/// Relationship type linking an indicator to its regional breakdown.
pub const BY_REGION: &str = "ByRegion";
/// Relationship type from a derived indicator to an input.
pub const BASED_ON: &str = "BasedOn";
/// Relationship type from an input to a derived indicator.
pub const USED_IN: &str = "UsedIn";
/// Label of region nodes.
pub const REGION_LABEL: &str = "Region";

/// A property value bound into a Cypher statement.
#[derive(Debug, Clone)]
pub enum PropValue {
    Str(String),
    Float(f64),
    Int(i64),
    Bool(bool),
    StrList(Vec<String>),
    /// Numeric series with explicit nulls for missing years.
    Series(Vec<Option<f64>>),
    Null,
}

impl PropValue {
    /// Convert an extra-property JSON value from batch config.
    pub fn from_json(value: &serde_json::Value) -> PropValue {
        match value {
            serde_json::Value::String(s) => PropValue::Str(s.clone()),
            serde_json::Value::Bool(b) => PropValue::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => PropValue::Int(i),
                None => PropValue::Float(n.as_f64().unwrap_or(0.0)),
            },
            serde_json::Value::Null => PropValue::Null,
            other => PropValue::Str(other.to_string()),
        }
    }
}

fn bind(q: Query, key: &str, value: PropValue) -> Query {
    match value {
        PropValue::Str(v) => q.param(key, v),
        PropValue::Float(v) => q.param(key, v),
        PropValue::Int(v) => q.param(key, v),
        PropValue::Bool(v) => q.param(key, v),
        PropValue::StrList(v) => q.param(key, v),
        PropValue::Series(v) => q.param(key, v),
        PropValue::Null => q.param::<Option<f64>>(key, None),
    }
}

/// Labels and property keys are interpolated into statements, so they must
/// be plain identifiers.
fn validate_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StatGraphError::Graph(format!(
            "'{}' is not a valid label or property key",
            name
        )))
    }
}

/// Write side of the graph store.
pub struct GraphWriter {
    client: GraphClient,
}

impl GraphWriter {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    /// Create one indicator node and return its store id.
    ///
    /// Every call creates a fresh node — there is no dedup by name, so
    /// re-running a batch accumulates duplicate indicators.
    pub async fn write_indicator(
        &self,
        labels: &[String],
        properties: Vec<(String, PropValue)>,
    ) -> Result<NodeId> {
        if labels.is_empty() {
            return Err(StatGraphError::Graph(
                "Indicator node needs at least one label".to_string(),
            ));
        }
        for label in labels {
            validate_identifier(label)?;
        }
        for (key, _) in &properties {
            validate_identifier(key)?;
        }

        let fragment = properties
            .iter()
            .map(|(key, _)| format!("{key}: ${key}"))
            .collect::<Vec<_>>()
            .join(", ");
        let statement = format!(
            "CREATE (n:{} {{{}}}) RETURN elementId(n) AS node_id",
            labels.join(":"),
            fragment
        );

        let mut q = query(&statement);
        for (key, value) in properties {
            q = bind(q, &key, value);
        }

        let mut stream = self.client.graph.execute(q).await?;
        let row = stream.next().await?.ok_or_else(|| {
            StatGraphError::Graph("Node creation returned no row".to_string())
        })?;
        let id: String = row
            .get("node_id")
            .map_err(|e| StatGraphError::Graph(format!("Missing node id in response: {}", e)))?;
        Ok(NodeId::new(id))
    }

    /// Find a region node by exact name or create it.
    pub async fn find_or_create_region(&self, name: &str) -> Result<NodeId> {
        let find = query(&format!(
            "MATCH (r:{REGION_LABEL} {{name: $name}}) RETURN elementId(r) AS region_id"
        ))
        .param("name", name);
        let mut stream = self.client.graph.execute(find).await?;
        if let Some(row) = stream.next().await? {
            if let Ok(id) = row.get::<String>("region_id") {
                return Ok(NodeId::new(id));
            }
        }

        let create = query(&format!(
            "CREATE (r:{REGION_LABEL} {{name: $name}}) RETURN elementId(r) AS region_id"
        ))
        .param("name", name);
        let mut stream = self.client.graph.execute(create).await?;
        let row = stream.next().await?.ok_or_else(|| {
            StatGraphError::Graph(format!("Region node creation returned no row for '{}'", name))
        })?;
        let id: String = row
            .get("region_id")
            .map_err(|e| StatGraphError::Graph(format!("Missing region id in response: {}", e)))?;
        info!("Created region node '{}'", name);
        Ok(NodeId::new(id))
    }

    /// Create `ByRegion` edges carrying one `value_<year>` property per year.
    ///
    /// Missing values are stored as explicit nulls so readers treat
    /// presence-with-null and absence identically. A region that fails to
    /// resolve is logged and skipped without rolling back the indicator
    /// node. Returns the number of edges created.
    pub async fn write_regional_edges(
        &self,
        node_id: &NodeId,
        years: &[String],
        regions: &[String],
        matrix: &[Vec<Option<f64>>],
    ) -> Result<usize> {
        for year in years {
            validate_identifier(year)?;
        }

        let mut created = 0;
        for (i, region) in regions.iter().enumerate() {
            let values = matrix.get(i).map(Vec::as_slice).unwrap_or(&[]);
            match self.write_region_edge(node_id, region, years, values).await {
                Ok(()) => created += 1,
                Err(e) => warn!("Skipping region '{}': {}", region, e),
            }
        }
        info!("Created {} {} edges for node {}", created, BY_REGION, node_id);
        Ok(created)
    }

    async fn write_region_edge(
        &self,
        node_id: &NodeId,
        region: &str,
        years: &[String],
        values: &[Option<f64>],
    ) -> Result<()> {
        let region_id = self.find_or_create_region(region).await?;

        let fragment = years
            .iter()
            .map(|year| format!("value_{year}: $value_{year}"))
            .collect::<Vec<_>>()
            .join(", ");
        let statement = format!(
            "MATCH (from), (to) \
             WHERE elementId(from) = $from_id AND elementId(to) = $to_id \
             CREATE (from)-[r:{BY_REGION} {{{fragment}}}]->(to)"
        );

        let mut q = query(&statement)
            .param("from_id", node_id.as_str())
            .param("to_id", region_id.as_str());
        for (j, year) in years.iter().enumerate() {
            let value = values.get(j).copied().flatten();
            q = q.param(&format!("value_{year}"), value);
        }

        self.client.graph.run(q).await?;
        Ok(())
    }

    /// Create the `BasedOn`/`UsedIn` pair from a derived node to each input.
    ///
    /// Edge failures are logged and skipped; returns the number of edges
    /// actually created.
    pub async fn write_derivation_edges(
        &self,
        derived: &NodeId,
        inputs: &[NodeId],
    ) -> Result<usize> {
        let mut created = 0;
        for input in inputs {
            if self.create_edge(derived, input, BASED_ON).await {
                created += 1;
            }
            if self.create_edge(input, derived, USED_IN).await {
                created += 1;
            }
        }
        info!(
            "Created {} derivation edges for node {}",
            created, derived
        );
        Ok(created)
    }

    async fn create_edge(&self, from: &NodeId, to: &NodeId, rel_type: &str) -> bool {
        let statement = format!(
            "MATCH (from), (to) \
             WHERE elementId(from) = $from_id AND elementId(to) = $to_id \
             CREATE (from)-[r:{rel_type}]->(to)"
        );
        let q = query(&statement)
            .param("from_id", from.as_str())
            .param("to_id", to.as_str());
        match self.client.graph.run(q).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to create {} edge {} -> {}: {}", rel_type, from, to, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_validation() {
        assert!(validate_identifier("federal_values").is_ok());
        assert!(validate_identifier("value_2021").is_ok());
        assert!(validate_identifier("полное_название").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("drop all; --").is_err());
        assert!(validate_identifier("a b").is_err());
    }

    #[test]
    fn test_prop_value_from_json() {
        assert!(matches!(
            PropValue::from_json(&serde_json::json!("text")),
            PropValue::Str(_)
        ));
        assert!(matches!(
            PropValue::from_json(&serde_json::json!(42)),
            PropValue::Int(42)
        ));
        assert!(matches!(
            PropValue::from_json(&serde_json::json!(2.5)),
            PropValue::Float(_)
        ));
        assert!(matches!(
            PropValue::from_json(&serde_json::json!(true)),
            PropValue::Bool(true)
        ));
        assert!(matches!(
            PropValue::from_json(&serde_json::Value::Null),
            PropValue::Null
        ));
    }
}
