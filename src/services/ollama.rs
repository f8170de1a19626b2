//! Ollama API client.
//!
//! Configuration is read from environment variables:
//! - `OLLAMA_HOST`: Ollama service URL (default: http://localhost:11434)
//! - `OLLAMA_MODEL`: Model to use (default: qwen2.5:7b)
//! - `OLLAMA_TIMEOUT`: HTTP timeout in seconds (default: 300)

use super::completion::CompletionProvider;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "qwen2.5:7b";
// CPU inference of a 7B model can take minutes; the recognizer applies its
// own, usually shorter, timeout on top of this one.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Ollama client configuration.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl OllamaConfig {
    /// Create configuration from environment variables.
    /// Falls back to defaults if not set.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let timeout_secs = std::env::var("OLLAMA_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            base_url,
            model,
            timeout_secs,
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Ollama API client.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    config: OllamaConfig,
    client: reqwest::Client,
}

/// Options for generation.
#[derive(Debug, Serialize)]
struct GenerateOptions {
    /// Temperature for sampling (0 = deterministic, 1 = creative)
    temperature: f32,
    /// Random seed for reproducibility
    seed: u32,
}

/// Generate request payload.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
    options: GenerateOptions,
}

/// Generate response.
#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
    pub model: String,
    pub done: bool,
}

/// Models list response.
#[derive(Debug, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
}

/// Model information.
#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: u64,
}

impl OllamaClient {
    /// Create a new Ollama client with configuration from the environment.
    pub fn new() -> Self {
        Self::with_config(OllamaConfig::default())
    }

    /// Create a new Ollama client with custom configuration.
    pub fn with_config(config: OllamaConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self { config, client }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Check if Ollama service is available.
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.config.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// List available models.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/api/tags", self.config.base_url);
        let resp: ModelsResponse = self.client.get(&url).send().await?.json().await?;
        Ok(resp.models)
    }

    /// Generate text with specified format (e.g., "json").
    pub async fn generate_with_format(
        &self,
        prompt: &str,
        format: Option<&str>,
    ) -> Result<GenerateResponse> {
        let url = format!("{}/api/generate", self.config.base_url);

        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            format,
            // Deterministic output: the same name always gets the same answer
            options: GenerateOptions {
                temperature: 0.0,
                seed: 42,
            },
        };

        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp)
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionProvider for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let response = self.generate_with_format(prompt, Some("json")).await?;
        if !response.done {
            return Err(crate::Error::AiCall(format!(
                "model {} returned an incomplete response",
                response.model
            )));
        }
        Ok(response.response)
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}
