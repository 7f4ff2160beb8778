//! Lore Inference - Embedding and chat-model capabilities
//!
//! The core never talks to a concrete model service; it holds the
//! [`Embedder`] and [`ChatModel`] traits defined here. Two families of
//! implementations are provided: a local Ollama server and the hosted
//! OpenAI API. Both are plain HTTP clients with bounded timeouts.

mod chat;
mod embedder;

pub use chat::{OllamaChat, OpenAiChat, TokenStream};
pub use embedder::{OllamaEmbedder, OpenAiEmbedder};

use lore_core::{LoreError, Message, Result, Settings};
use std::sync::Arc;

/// Turns text into a fixed-dimensionality vector.
///
/// Implementations must be deterministic for a given text within a process
/// run and fail with [`LoreError::Embedding`] when the backing service is
/// unreachable.
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Dimensionality of every vector this embedder returns.
    fn dim(&self) -> usize;
}

/// A conversational language model.
#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    /// Run the conversation to completion and return the full response.
    async fn complete(&self, messages: &[Message]) -> Result<String>;

    /// Stream the response token by token.
    ///
    /// The returned channel yields tokens in order and closes after the
    /// last one; dropping the receiver cancels the producer.
    async fn stream_complete(&self, messages: &[Message]) -> Result<TokenStream>;
}

/// Build the embedder selected by `settings.embedding_provider`.
pub fn embedder_from_settings(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    match settings.embedding_provider.as_str() {
        "openai" => {
            if settings.openai_api_key.is_empty() {
                return Err(LoreError::Validation(
                    "OPENAI_API_KEY is not set; set it or switch to EMBEDDING_PROVIDER=ollama"
                        .into(),
                ));
            }
            Ok(Arc::new(OpenAiEmbedder::new(
                settings.openai_api_key.clone(),
                settings.openai_embed_model.clone(),
                settings.embedding_dim,
            )))
        }
        _ => Ok(Arc::new(OllamaEmbedder::new(
            settings.ollama_base_url.clone(),
            settings.ollama_embed_model.clone(),
            settings.embedding_dim,
        ))),
    }
}

/// Build the chat model selected by `settings.llm_provider`.
pub fn chat_model_from_settings(settings: &Settings) -> Result<Arc<dyn ChatModel>> {
    match settings.llm_provider.as_str() {
        "openai" => {
            if settings.openai_api_key.is_empty() {
                return Err(LoreError::Validation(
                    "OPENAI_API_KEY is not set; set it or switch to LLM_PROVIDER=ollama".into(),
                ));
            }
            Ok(Arc::new(OpenAiChat::new(
                settings.openai_api_key.clone(),
                settings.openai_chat_model.clone(),
            )))
        }
        _ => Ok(Arc::new(OllamaChat::new(
            settings.ollama_base_url.clone(),
            settings.ollama_chat_model.clone(),
        ))),
    }
}
