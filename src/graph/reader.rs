//! Read side of the graph: stored indicator series and listings.

use crate::error::{Result, StatGraphError};
use crate::graph::writer::{BY_REGION, REGION_LABEL};
use crate::graph::GraphClient;
use crate::model::{IndicatorData, IndicatorSummary, NodeId};
use neo4rs::query;
use tracing::debug;

pub struct GraphReader {
    client: GraphClient,
}

impl GraphReader {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    /// Fetch an indicator's stored series by id.
    ///
    /// An unknown id yields `None` — the derived-metric evaluator treats
    /// that as a synthesizable gap, not a failure.
    pub async fn fetch_indicator(&self, id: &NodeId) -> Result<Option<IndicatorData>> {
        let q = query(
            "MATCH (n) WHERE elementId(n) = $node_id \
             RETURN n.name AS name, n.years AS years, n.federal_values AS federal_values",
        )
        .param("node_id", id.as_str());

        let mut stream = self.client.graph.execute(q).await?;
        let row = match stream.next().await? {
            Some(row) => row,
            None => {
                debug!("Node {} not found in the store", id);
                return Ok(None);
            }
        };
        let name: String = row.get("name").unwrap_or_default();
        let years: Vec<String> = row.get("years").unwrap_or_default();
        let federal_values: Vec<Option<f64>> = row.get("federal_values").unwrap_or_default();

        let (regions, regional_values) = self.fetch_regional(id, &years).await?;

        Ok(Some(IndicatorData {
            node_id: id.clone(),
            name,
            years,
            federal_values,
            regions,
            regional_values,
        }))
    }

    async fn fetch_regional(
        &self,
        id: &NodeId,
        years: &[String],
    ) -> Result<(Vec<String>, Vec<Vec<Option<f64>>>)> {
        let value_columns = years
            .iter()
            .map(|year| format!("r.value_{year} AS value_{year}"))
            .collect::<Vec<_>>()
            .join(", ");
        let statement = if value_columns.is_empty() {
            format!(
                "MATCH (n)-[r:{BY_REGION}]->(reg:{REGION_LABEL}) \
                 WHERE elementId(n) = $node_id \
                 RETURN reg.name AS region_name ORDER BY reg.name"
            )
        } else {
            format!(
                "MATCH (n)-[r:{BY_REGION}]->(reg:{REGION_LABEL}) \
                 WHERE elementId(n) = $node_id \
                 RETURN reg.name AS region_name, {value_columns} ORDER BY reg.name"
            )
        };

        let q = query(&statement).param("node_id", id.as_str());
        let mut stream = self.client.graph.execute(q).await?;

        let mut regions = Vec::new();
        let mut regional_values = Vec::new();
        while let Some(row) = stream.next().await? {
            let region: String = row.get("region_name").unwrap_or_default();
            let values: Vec<Option<f64>> = years
                .iter()
                .map(|year| {
                    row.get::<Option<f64>>(&format!("value_{year}"))
                        .unwrap_or(None)
                })
                .collect();
            regions.push(region);
            regional_values.push(values);
        }
        Ok((regions, regional_values))
    }

    /// List indicator summaries for one label, ordered by name.
    pub async fn list_indicators(&self, label: &str) -> Result<Vec<IndicatorSummary>> {
        let valid = !label.is_empty() && label.chars().all(|c| c.is_alphanumeric() || c == '_');
        if !valid {
            return Err(StatGraphError::Graph(format!(
                "'{}' is not a valid label",
                label
            )));
        }

        let statement = format!(
            "MATCH (n:{label}) \
             RETURN elementId(n) AS node_id, n.name AS name, \
                    n.full_name AS full_name, n.table_number AS table_number \
             ORDER BY n.name"
        );
        let mut stream = self.client.graph.execute(query(&statement)).await?;

        let mut summaries = Vec::new();
        while let Some(row) = stream.next().await? {
            let node_id: String = match row.get("node_id") {
                Ok(id) => id,
                Err(_) => continue,
            };
            summaries.push(IndicatorSummary {
                node_id: NodeId::new(node_id),
                name: row.get("name").unwrap_or_default(),
                full_name: row.get::<Option<String>>("full_name").unwrap_or(None),
                table_number: row.get::<Option<String>>("table_number").unwrap_or(None),
            });
        }
        Ok(summaries)
    }
}
