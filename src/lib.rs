//! wenzhen - Medical knowledge-graph question answering
//!
//! A facet-aware question-answering core over a SNOMED CT-style
//! terminology graph, with an LLM fallback cascade for questions the
//! graph cannot ground.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`facet`] - Keyword-scored facet classification (definition, symptoms, treatments)
//! - [`terms`] - Clinical term extraction and normalization
//! - [`recognizer`] - Biomedical entity-recognition service client
//! - [`graph`] - Terminology graph access (Neo4j HTTP transaction API)
//! - [`matcher`] - Concept matching with approximate-label fallback
//! - [`evidence`] - Evidence ranking, combination, and sufficiency evaluation
//! - [`llm`] - Language-model client (Ollama)
//! - [`prompt`] - Prompt and lite-template construction
//! - [`pipeline`] - The retrieval-and-fallback cascade
//! - [`models`] - Core data structures and types
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wenzhen::config::Config;
//! use wenzhen::graph::Neo4jStore;
//! use wenzhen::llm::OllamaClient;
//! use wenzhen::models::QueryOptions;
//! use wenzhen::pipeline::Pipeline;
//! use wenzhen::recognizer::HttpRecognizer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let pipeline = Pipeline::new(
//!         Arc::new(HttpRecognizer::new(config.recognizer.clone())?),
//!         Arc::new(Neo4jStore::new(config.graph.clone())?),
//!         Arc::new(OllamaClient::new(config.ollama.clone())?),
//!         &config,
//!     );
//!     let record = pipeline.answer("What is asthma?", QueryOptions::default()).await?;
//!     println!("{}", record.answer);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod evidence;
pub mod facet;
pub mod graph;
pub mod llm;
pub mod matcher;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod recognizer;
pub mod terms;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::models::{
        AnswerMode, AnswerRecord, Candidate, EvidenceLevel, EvidencePair, Facet, QueryOptions,
        StrategyNote,
    };
    pub use crate::pipeline::Pipeline;
}

// Direct re-exports for convenience
pub use models::{AnswerMode, AnswerRecord, EvidenceLevel, Facet, QueryOptions, StrategyNote};
