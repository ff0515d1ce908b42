//! Reasoning backends for the THINKING step.

use crate::error::AgentError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Produces the next Thought/Action or Final Answer for a prompt.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, AgentError>;
}

/// Connection settings for an Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaSettings {
    pub ollama_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model_name: "llama3.2:latest".to_string(),
            temperature: 0.5,
            timeout_seconds: 300,
        }
    }
}

/// Message in the chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    /// Stop before the model invents its own observation.
    stop: Vec<String>,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

/// Reasoning via Ollama's `/api/chat`.
pub struct OllamaReasoner {
    settings: OllamaSettings,
    http_client: reqwest::Client,
}

impl OllamaReasoner {
    pub fn new(settings: OllamaSettings) -> Result<Self, AgentError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| AgentError::Reasoning(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            settings,
            http_client,
        })
    }
}

#[async_trait]
impl ReasoningEngine for OllamaReasoner {
    async fn complete(&self, prompt: &str) -> Result<String, AgentError> {
        let url = format!("{}/api/chat", self.settings.ollama_url.trim_end_matches('/'));

        let request = OllamaChatRequest {
            model: self.settings.model_name.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            stream: false,
            options: OllamaOptions {
                temperature: self.settings.temperature,
                stop: vec!["\nObservation:".to_string()],
            },
        };

        debug!("Sending reasoning prompt ({} chars)", prompt.len());

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentError::Reasoning(format!(
                        "Request timed out after {}s",
                        self.settings.timeout_seconds
                    ))
                } else if e.is_connect() {
                    AgentError::Reasoning(format!(
                        "Cannot connect to Ollama at {}. Is Ollama running?",
                        self.settings.ollama_url
                    ))
                } else {
                    AgentError::Reasoning(format!("Failed to send request: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Reasoning(format!(
                "Ollama API error {}: {}",
                status, body
            )));
        }

        let chat_response: OllamaChatResponse = response.json().await.map_err(|e| {
            AgentError::Reasoning(format!("Failed to parse Ollama response: {}", e))
        })?;

        Ok(chat_response.message.content)
    }
}
