//! Error types shared across the engine.

use thiserror::Error;

/// Error type for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("catalog error: {0}")]
    Catalog(String),
    #[error("graph error: {0}")]
    Graph(String),
    #[error("synthesis error: {0}")]
    Synthesis(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("report error: {0}")]
    Report(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Serde(e.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(e: toml::de::Error) -> Self {
        EngineError::Config(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
