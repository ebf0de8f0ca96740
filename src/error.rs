//! Unified error handling for the wenzhen crate
//!
//! Collaborator failures (graph, recognizer, language model) are caught at
//! their call sites and folded into the fallback cascade, so most errors
//! never reach the caller. The variants here cover configuration problems
//! and the few genuinely unexpected failures that do surface from
//! `Pipeline::answer`.

use std::io;
use thiserror::Error;

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout)
    Network,
    /// Graph store query errors
    Graph,
    /// Entity recognizer errors
    Recognizer,
    /// LLM inference errors
    Llm,
    /// Configuration and validation errors
    Config,
    /// Other/unknown errors
    Other,
}

/// Unified error type for the wenzhen crate
#[derive(Error, Debug)]
pub enum Error {
    /// Graph store query failed
    #[error("Graph error: {0}")]
    Graph(String),

    /// Entity recognizer call failed
    #[error("Recognizer error: {0}")]
    Recognizer(String),

    /// LLM inference failed
    #[error("LLM error: {0}")]
    Llm(String),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a graph store error
    pub fn graph(msg: impl Into<String>) -> Self {
        Self::Graph(msg.into())
    }

    /// Create an LLM error
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Graph(_) | Self::Llm(_) | Self::Recognizer(_) => true,
            Self::Http(_) => true,
            Self::Io(_) => true,
            Self::Json(_) => false,
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Graph(_) => ErrorCategory::Graph,
            Self::Recognizer(_) => ErrorCategory::Recognizer,
            Self::Llm(_) => ErrorCategory::Llm,
            Self::Http(_) => ErrorCategory::Network,
            Self::Config(_) => ErrorCategory::Config,
            Self::Json(_) | Self::Io(_) | Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
