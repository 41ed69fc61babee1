use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiChainError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for ApiChainError {
    fn from(err: anyhow::Error) -> Self {
        ApiChainError::Other(err.to_string())
    }
}

/// Failures of a chain run, carried inside its terminal status.
///
/// Only `Transport`, `Timeout`, `RequestNotFound`, `UnresolvedVariable` and
/// `Storage` end a run part-way. Extraction failures are not errors; they
/// surface as `StepWarning`s carrying the `ExtractionError`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainError {
    #[error("chain '{0}' not found")]
    ChainNotFound(String),

    #[error("request '{0}' not found")]
    RequestNotFound(String),

    #[error("chain has {len} steps, the maximum is {max}")]
    ChainTooLong { len: usize, max: usize },

    #[error("invalid chain: {0}")]
    InvalidChain(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("request '{request}' references undefined variables: {}", .names.join(", "))]
    UnresolvedVariable { request: String, names: Vec<String> },

    #[error("storage error: {0}")]
    Storage(String),
}

impl ChainError {
    /// Short machine-friendly kind, used in reports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ChainError::ChainNotFound(_) => "ChainNotFound",
            ChainError::RequestNotFound(_) => "RequestNotFound",
            ChainError::ChainTooLong { .. } => "ChainTooLong",
            ChainError::InvalidChain(_) => "InvalidChain",
            ChainError::Transport(_) => "TransportError",
            ChainError::Timeout(_) => "TimeoutError",
            ChainError::UnresolvedVariable { .. } => "UnresolvedVariable",
            ChainError::Storage(_) => "StorageError",
        }
    }
}

/// Result type for apichain crate
pub type Result<T> = std::result::Result<T, ApiChainError>;
