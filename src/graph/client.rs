//! Neo4j connection handling.

use crate::config::GraphConfig;
use crate::error::Result;
use neo4rs::{query, Graph};
use tracing::info;

/// Shared handle to the graph store.
///
/// `neo4rs::Graph` is internally pooled and cheap to clone.
#[derive(Clone)]
pub struct GraphClient {
    pub(crate) graph: Graph,
}

impl GraphClient {
    /// Connect and verify the connection with a round-trip.
    pub async fn connect(config: &GraphConfig) -> Result<Self> {
        let graph = match &config.database {
            Some(database) => {
                let neo4j_config = neo4rs::ConfigBuilder::default()
                    .uri(config.uri.as_str())
                    .user(config.username.as_str())
                    .password(config.password.as_str())
                    .db(database.as_str())
                    .build()?;
                Graph::connect(neo4j_config).await?
            }
            None => {
                Graph::new(
                    config.uri.as_str(),
                    config.username.as_str(),
                    config.password.as_str(),
                )
                .await?
            }
        };
        graph.run(query("RETURN 1")).await?;
        info!("Connected to graph store at {}", config.uri);
        Ok(Self { graph })
    }
}
