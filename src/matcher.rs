//! LLM matching of user queries to stored indicators.

use crate::catalog::IndicatorCatalog;
use crate::llm::{self, LlmClient};
use crate::model::NodeId;
use serde::Deserialize;
use tracing::{info, warn};

/// Confidence floor below which a reported match is rejected.
pub const CONFIDENCE_FLOOR: f64 = 0.7;

#[derive(Debug, Deserialize)]
pub struct MatchResponse {
    pub is_match: bool,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub node_name: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

pub struct IndicatorMatcher<'a> {
    llm: &'a LlmClient,
}

impl<'a> IndicatorMatcher<'a> {
    pub fn new(llm: &'a LlmClient) -> Self {
        Self { llm }
    }

    /// Match a query against the catalog; `None` on every failure path.
    pub async fn find_match(
        &self,
        user_query: &str,
        catalog: &IndicatorCatalog,
    ) -> Option<NodeId> {
        if catalog.is_empty() {
            warn!("Indicator catalog is empty; nothing to match against");
            return None;
        }

        let prompt = format!(
            "Find the stored indicator best matching the user's question. \
             Answer as JSON: {{\"is_match\": bool, \"node_id\": \"...\", \
             \"node_name\": \"...\", \"confidence\": 0.0-1.0, \
             \"reasoning\": \"...\"}}. \
             Set is_match to true only on a clear semantic match; with \
             several candidates pick the most relevant one.\n\n\
             User question: {user_query}\n\nStored indicators:\n{}",
            catalog.prompt_listing()
        );

        let content = match self.llm.complete(&prompt).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Indicator match call failed: {}", e);
                return None;
            }
        };

        let response = evaluate_match(&content)?;
        let node_id = NodeId::new(response.node_id?);
        info!(
            "Matched indicator '{}' ({}) with confidence {:.2}: {}",
            response.node_name.as_deref().unwrap_or("?"),
            node_id,
            response.confidence,
            response.reasoning
        );
        Some(node_id)
    }
}

/// Apply the confidence floor to a raw match response.
pub fn evaluate_match(content: &str) -> Option<MatchResponse> {
    let response: MatchResponse = match llm::parse_json_content(content) {
        Ok(response) => response,
        Err(e) => {
            warn!("Unparseable match response: {}", e);
            return None;
        }
    };
    if response.is_match && response.confidence >= CONFIDENCE_FLOOR && response.node_id.is_some() {
        Some(response)
    } else {
        info!(
            "No indicator match (is_match={}, confidence {:.2})",
            response.is_match, response.confidence
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confident_match_accepted() {
        let content = r#"{"is_match": true, "node_id": "4:abc:1", "node_name": "Студенты",
                          "confidence": 0.92, "reasoning": "direct match"}"#;
        let response = evaluate_match(content).unwrap();
        assert_eq!(response.node_id.as_deref(), Some("4:abc:1"));
    }

    #[test]
    fn test_low_confidence_rejected() {
        let content = r#"{"is_match": true, "node_id": "4:abc:1", "confidence": 0.55,
                          "reasoning": "weak"}"#;
        assert!(evaluate_match(content).is_none());
    }

    #[test]
    fn test_no_match_rejected() {
        let content = r#"{"is_match": false, "confidence": 0.95, "reasoning": "unrelated"}"#;
        assert!(evaluate_match(content).is_none());
    }

    #[test]
    fn test_match_without_id_rejected() {
        let content = r#"{"is_match": true, "confidence": 0.95, "reasoning": "lost the id"}"#;
        assert!(evaluate_match(content).is_none());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(evaluate_match("no JSON here").is_none());
    }
}
