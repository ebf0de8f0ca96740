//! Language-model client for answer generation
//!
//! This module provides LLM integration using Ollama. The pipeline never
//! lets an inference failure escape: errors from [`LanguageModel::generate`]
//! are converted at the call site into a textual failure marker, which the
//! bad-answer check recognizes and the cascade recovers from.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::OllamaConfig;
use crate::error::{Error, Result};

/// Failure-marker prefix for a generation that could not complete
pub const LLM_FAILURE_MARKER: &str = "呼叫 LLM 失敗";

/// Per-call sampling parameters
#[derive(Debug, Clone, Copy)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub num_predict: u32,
    pub repeat_penalty: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            top_p: 0.9,
            num_predict: 256,
            repeat_penalty: 1.05,
        }
    }
}

impl GenerationParams {
    /// Default sampling with a facet-specific output budget
    pub fn with_num_predict(num_predict: u32) -> Self {
        Self {
            num_predict,
            ..Self::default()
        }
    }
}

/// Boundary of the language-model collaborator
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a completion; `model` overrides the configured default
    async fn generate(
        &self,
        prompt: &str,
        params: GenerationParams,
        model: Option<&str>,
    ) -> Result<String>;
}

/// Ollama generate request
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

/// Ollama generation options
#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
    repeat_penalty: f32,
}

/// Ollama generate response
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
}

/// LLM client backed by the Ollama HTTP API
pub struct OllamaClient {
    client: Client,
    config: OllamaConfig,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(Error::Http)?;

        Ok(Self { client, config })
    }

    /// Check if Ollama is reachable
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.config.endpoint.trim_end_matches('/'));
        self.client.get(&url).send().await.is_ok()
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn generate(
        &self,
        prompt: &str,
        params: GenerationParams,
        model: Option<&str>,
    ) -> Result<String> {
        let url = format!(
            "{}/api/generate",
            self.config.endpoint.trim_end_matches('/')
        );

        let request = OllamaRequest {
            model: model.unwrap_or(&self.config.model),
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: params.temperature,
                top_p: params.top_p,
                num_predict: params.num_predict,
                repeat_penalty: params.repeat_penalty,
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::llm(format!("Ollama request failed: {status} - {body}")));
        }

        let parsed: OllamaResponse = response.json().await?;
        Ok(parsed.response.trim().to_string())
    }
}

/// Convert a generation result into answer text, folding failures into
/// the marker string the bad-answer check recognizes
pub fn answer_or_marker(result: Result<String>) -> String {
    match result {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(error = %err, "LLM generation failed");
            format!("{LLM_FAILURE_MARKER}：{err}")
        }
    }
}
