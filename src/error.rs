use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatGraphError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Table error: {0}")]
    Table(String),

    #[error("Formula error: {0}")]
    Formula(String),

    #[error("Graph error: {0}")]
    Graph(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<neo4rs::Error> for StatGraphError {
    fn from(err: neo4rs::Error) -> Self {
        StatGraphError::Graph(err.to_string())
    }
}

impl From<reqwest::Error> for StatGraphError {
    fn from(err: reqwest::Error) -> Self {
        StatGraphError::Llm(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StatGraphError>;
