//! Ollama embedding backend.
//!
//! Uses the `/api/embed` endpoint of the same Ollama server that drives the
//! agent. Defaults to `nomic-embed-text` (768 dimensions); the dimension is
//! updated from the first successful response.

use super::embedding::Embedder;
use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Dimension of `nomic-embed-text`.
const DEFAULT_DIMENSION: usize = 768;

/// Connection settings for Ollama embeddings.
#[derive(Debug, Clone)]
pub struct OllamaEmbedderSettings {
    pub ollama_url: String,
    pub model_name: String,
    pub timeout_seconds: u64,
}

impl Default for OllamaEmbedderSettings {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model_name: DEFAULT_EMBEDDING_MODEL.to_string(),
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Semantic embeddings from a local Ollama model.
pub struct OllamaEmbedder {
    settings: OllamaEmbedderSettings,
    http_client: reqwest::Client,
    dimension: AtomicUsize,
}

impl OllamaEmbedder {
    pub fn new(settings: OllamaEmbedderSettings) -> Result<Self, StoreError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| StoreError::Embedding(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            settings,
            http_client,
            dimension: AtomicUsize::new(DEFAULT_DIMENSION),
        })
    }

    fn first_embedding(&self, response: EmbedResponse) -> Result<Vec<f32>, StoreError> {
        let vector = response
            .embeddings
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                StoreError::Embedding("Ollama returned no embedding".to_string())
            })?;
        self.dimension.store(vector.len(), Ordering::Relaxed);
        Ok(vector)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn dimensions(&self) -> usize {
        self.dimension.load(Ordering::Relaxed)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, StoreError> {
        let url = format!("{}/api/embed", self.settings.ollama_url.trim_end_matches('/'));
        debug!("Embedding {} chars with {}", text.len(), self.settings.model_name);

        let response = self
            .http_client
            .post(&url)
            .json(&EmbedRequest {
                model: &self.settings.model_name,
                input: text,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    StoreError::Embedding(format!(
                        "Cannot connect to Ollama at {}. Is Ollama running?",
                        self.settings.ollama_url
                    ))
                } else {
                    StoreError::Embedding(format!("Failed to send request: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Embedding(format!(
                "Ollama API error {}: {}",
                status, body
            )));
        }

        let parsed: EmbedResponse = response.json().await.map_err(|e| {
            StoreError::Embedding(format!("Failed to parse Ollama response: {}", e))
        })?;

        self.first_embedding(parsed)
    }
}
