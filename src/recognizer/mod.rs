//! Clinical entity recognizer collaborator
//!
//! The recognizer runs as an external sidecar service (a scispaCy model
//! behind a small HTTP endpoint). Only its boundary is specified here:
//! a text goes in, candidate clinical spans come out. Any failure is
//! treated as "no entities" by the caller; the pipeline never fails a
//! request because the recognizer is down.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::RecognizerConfig;
use crate::error::{Error, Result};

/// One candidate clinical phrase recognized in the question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySpan {
    /// Surface text of the span
    pub text: String,

    /// Recognizer-assigned entity type
    #[serde(rename = "type", default)]
    pub entity_type: String,
}

/// Boundary of the entity-recognition collaborator
#[async_trait]
pub trait EntityRecognizer: Send + Sync {
    /// Extract candidate clinical spans from free text
    async fn extract_entities(&self, text: &str) -> Result<Vec<EntitySpan>>;
}

#[derive(Debug, Serialize)]
struct ExtractRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    entities: Vec<EntitySpan>,
}

/// HTTP client for the recognizer sidecar
pub struct HttpRecognizer {
    client: Client,
    config: RecognizerConfig,
}

impl HttpRecognizer {
    pub fn new(config: RecognizerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(Error::Http)?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl EntityRecognizer for HttpRecognizer {
    async fn extract_entities(&self, text: &str) -> Result<Vec<EntitySpan>> {
        let url = format!("{}/entities", self.config.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(&ExtractRequest { text })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Recognizer(format!(
                "recognizer returned {}",
                response.status()
            )));
        }

        let parsed: ExtractResponse = response.json().await?;
        Ok(parsed.entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_extract_entities_ok() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/entities")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"entities":[{"text":"asthma","type":"ENTITY"}]}"#)
            .create_async()
            .await;

        let recognizer = HttpRecognizer::new(RecognizerConfig {
            endpoint: server.url(),
            timeout_secs: 5,
        })
        .unwrap();

        let spans = recognizer.extract_entities("what is asthma").await.unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "asthma");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_extract_entities_server_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/entities")
            .with_status(500)
            .create_async()
            .await;

        let recognizer = HttpRecognizer::new(RecognizerConfig {
            endpoint: server.url(),
            timeout_secs: 5,
        })
        .unwrap();

        assert!(recognizer.extract_entities("anything").await.is_err());
    }
}
