//! Embedding providers
//!
//! `ollama` (default) calls the local Ollama REST API at `/api/embeddings`.
//! `openai` calls the hosted OpenAI embeddings API and needs an API key.

use crate::Embedder;
use lore_core::{LoreError, Result};
use serde_json::Value;
use std::time::Duration;

/// Embedding calls get a generous timeout; local models can be slow on
/// first load.
const EMBED_TIMEOUT: Duration = Duration::from_secs(60);

fn parse_vector(value: &Value, expected_dim: usize) -> Result<Vec<f32>> {
    let array = value
        .as_array()
        .ok_or_else(|| LoreError::Parse("embedding response is not an array".into()))?;
    let vector: Vec<f32> = array
        .iter()
        .filter_map(Value::as_f64)
        .map(|f| f as f32)
        .collect();

    if vector.len() != expected_dim {
        return Err(LoreError::Embedding(format!(
            "provider returned a {}-dimensional vector, expected {}",
            vector.len(),
            expected_dim
        )));
    }
    Ok(vector)
}

/// Local Ollama embedder.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dim: usize,
}

impl OllamaEmbedder {
    pub fn new(base_url: String, model: String, dim: usize) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(EMBED_TIMEOUT)
                .build()
                .expect("reqwest client"),
            base_url,
            model,
            dim,
        }
    }
}

#[async_trait::async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let payload = serde_json::json!({
            "model": self.model,
            "prompt": text,
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LoreError::Embedding(format!("Ollama request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| LoreError::Embedding(format!("Ollama returned an error: {}", e)))?;

        let json: Value = response
            .json()
            .await
            .map_err(|e| LoreError::Parse(e.to_string()))?;
        parse_vector(&json["embedding"], self.dim)
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

/// Hosted OpenAI embedder.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dim: usize,
}

impl OpenAiEmbedder {
    pub fn new(api_key: String, model: String, dim: usize) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(EMBED_TIMEOUT)
                .build()
                .expect("reqwest client"),
            api_key,
            model,
            dim,
        }
    }
}

#[async_trait::async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let payload = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LoreError::Embedding(format!("OpenAI request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| LoreError::Embedding(format!("OpenAI returned an error: {}", e)))?;

        let json: Value = response
            .json()
            .await
            .map_err(|e| LoreError::Parse(e.to_string()))?;
        parse_vector(&json["data"][0]["embedding"], self.dim)
    }

    fn dim(&self) -> usize {
        self.dim
    }
}
