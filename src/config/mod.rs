//! Configuration management for the wenzhen pipeline
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Terminology graph store configuration
    pub graph: GraphConfig,

    /// Ollama inference configuration
    pub ollama: OllamaConfig,

    /// Clinical entity recognizer configuration
    pub recognizer: RecognizerConfig,

    /// Pipeline behavior configuration
    pub pipeline: PipelineConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Neo4j graph store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Neo4j HTTP endpoint URL
    pub url: String,

    /// Database user
    pub user: String,

    /// Database password
    pub password: String,

    /// Query timeout in seconds
    pub timeout_secs: u64,

    /// Vocabulary fetch limit for the fuzzy-match cache
    pub vocab_limit: usize,
}

/// Ollama inference configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Ollama endpoint URL
    pub endpoint: String,

    /// Default model name
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Entity recognizer sidecar configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizerConfig {
    /// Recognizer service endpoint URL
    pub endpoint: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Pipeline behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Enable the fallback cascade (LLM-only and template recovery tiers)
    pub enable_fallback: bool,

    /// Enable the low-overlap degrade tier (off by default)
    pub enable_low_overlap: bool,

    /// Overlap ratio below which the degrade tier triggers
    pub low_overlap_threshold: f64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let graph_url =
            std::env::var("WENZHEN_NEO4J_URL").unwrap_or_else(|_| String::from("http://localhost:7474"));
        let graph_user = std::env::var("WENZHEN_NEO4J_USER").unwrap_or_else(|_| String::from("neo4j"));
        let graph_password =
            std::env::var("WENZHEN_NEO4J_PASSWORD").unwrap_or_else(|_| String::from("neo4j"));
        let graph_timeout = std::env::var("WENZHEN_NEO4J_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(15);
        let vocab_limit = std::env::var("WENZHEN_VOCAB_LIMIT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(100_000);

        let ollama_endpoint = std::env::var("OLLAMA_ENDPOINT")
            .unwrap_or_else(|_| String::from("http://localhost:11434"));
        let ollama_model = std::env::var("OLLAMA_MODEL")
            .unwrap_or_else(|_| String::from("cwchang/llama-3-taiwan-8b-instruct"));
        let ollama_timeout = std::env::var("OLLAMA_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(120);

        let recognizer_endpoint = std::env::var("WENZHEN_RECOGNIZER_URL")
            .unwrap_or_else(|_| String::from("http://localhost:8090"));
        let recognizer_timeout = std::env::var("WENZHEN_RECOGNIZER_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(10);

        let enable_low_overlap = std::env::var("WENZHEN_ENABLE_LOW_OVERLAP")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);

        let log_level = std::env::var("WENZHEN_LOG_LEVEL").unwrap_or_else(|_| String::from("info"));
        let log_format = std::env::var("WENZHEN_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        Ok(Self {
            graph: GraphConfig {
                url: graph_url,
                user: graph_user,
                password: graph_password,
                timeout_secs: graph_timeout,
                vocab_limit,
            },
            ollama: OllamaConfig {
                endpoint: ollama_endpoint,
                model: ollama_model,
                timeout_secs: ollama_timeout,
            },
            recognizer: RecognizerConfig {
                endpoint: recognizer_endpoint,
                timeout_secs: recognizer_timeout,
            },
            pipeline: PipelineConfig {
                enable_fallback: true,
                enable_low_overlap,
                low_overlap_threshold: 0.008,
            },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.graph.url.is_empty() {
            anyhow::bail!("graph.url must not be empty");
        }

        if self.ollama.endpoint.is_empty() {
            anyhow::bail!("ollama.endpoint must not be empty");
        }

        if self.graph.timeout_secs == 0 || self.ollama.timeout_secs == 0 {
            anyhow::bail!("collaborator timeouts must be greater than 0");
        }

        if !(0.0..=1.0).contains(&self.pipeline.low_overlap_threshold) {
            anyhow::bail!("pipeline.low_overlap_threshold must be between 0.0 and 1.0");
        }

        Ok(())
    }

    /// Get graph query timeout as Duration
    #[must_use]
    pub fn graph_timeout(&self) -> Duration {
        Duration::from_secs(self.graph.timeout_secs)
    }

    /// Get LLM request timeout as Duration
    #[must_use]
    pub fn ollama_timeout(&self) -> Duration {
        Duration::from_secs(self.ollama.timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            graph: GraphConfig {
                url: String::from("http://localhost:7474"),
                user: String::from("neo4j"),
                password: String::from("neo4j"),
                timeout_secs: 15,
                vocab_limit: 100_000,
            },
            ollama: OllamaConfig {
                endpoint: String::from("http://localhost:11434"),
                model: String::from("cwchang/llama-3-taiwan-8b-instruct"),
                timeout_secs: 120,
            },
            recognizer: RecognizerConfig {
                endpoint: String::from("http://localhost:8090"),
                timeout_secs: 10,
            },
            pipeline: PipelineConfig {
                enable_fallback: true,
                enable_low_overlap: false,
                low_overlap_threshold: 0.008,
            },
            logging: LoggingConfig {
                level: String::from("info"),
                format: String::from("text"),
            },
        }
    }
}
