//! Error types for the evaluation engine.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Errors that can occur while evaluating models.
#[derive(Error, Debug)]
pub enum EvalError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The ground-truth question set does not exist.
    #[error("Question set not found at '{0}'")]
    QaSetNotFound(PathBuf),

    /// The knowledge-chunk store has no chunks.
    #[error("No knowledge chunks found in '{0}'")]
    EmptyCorpus(PathBuf),

    /// No strategy is registered under the given name.
    #[error("Unknown retrieval strategy '{0}'")]
    UnknownStrategy(String),

    /// Invalid strategy or evaluation parameters.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// LLM API error.
    #[error("LLM API error: {0}")]
    LlmApi(String),

    /// The completion endpoint answered with a stream where a single response was required.
    #[error("Expected a non-streaming response but got a streaming response")]
    StreamingResponse,

    /// The completion endpoint returned no content.
    #[error("LLM response content is empty")]
    EmptyResponse,

    /// LLM response parsing error.
    #[error("Failed to parse LLM response: {0}")]
    LlmParse(String),

    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Embedding or cross-encoder model failure.
    #[error("Model error: {0}")]
    Model(String),

    /// A re-rank result carried a corpus id that is not an integer.
    #[error("Re-rank corpus id '{0}' is not a valid integer")]
    InvalidRerankIndex(String),

    /// A re-rank result pointed outside the candidate pool.
    #[error("Re-rank corpus id {index} is out of range for {candidates} candidates")]
    RerankIndexOutOfRange { index: usize, candidates: usize },

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EvalError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for EvalError {
    fn from(err: reqwest::Error) -> Self {
        EvalError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(err: serde_json::Error) -> Self {
        EvalError::LlmParse(err.to_string())
    }
}
