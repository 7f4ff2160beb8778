//! Chat-model providers with blocking and streaming completions
//!
//! Streaming is modelled as an mpsc channel of tokens fed by a spawned
//! reader task. The channel closing is the end-of-stream marker; dropping
//! the receiver makes the next `send` fail, which stops the reader.

use crate::ChatModel;
use lore_core::{LoreError, Message, Result};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// A lazy, finite, non-restartable sequence of response tokens.
pub type TokenStream = mpsc::Receiver<Result<String>>;

/// Upper bound on any single chat call, streaming included.
const CHAT_TIMEOUT: Duration = Duration::from_secs(120);

fn wire_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            serde_json::json!({
                "role": m.role.as_str(),
                "content": m.content,
            })
        })
        .collect()
}

/// What a single provider line contributed to the stream.
enum LineEvent {
    Token(String),
    Done,
    Skip,
}

/// Feed a channel from the newline-delimited body of `response`.
///
/// Both providers frame their streams as lines (NDJSON for Ollama, SSE
/// `data:` frames for OpenAI); `parse` maps one line to a [`LineEvent`].
fn spawn_line_stream<F>(mut response: reqwest::Response, parse: F) -> TokenStream
where
    F: Fn(&str) -> LineEvent + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Result<String>>(32);

    tokio::spawn(async move {
        let mut buf: Vec<u8> = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    buf.extend_from_slice(&bytes);
                    while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                        let line: Vec<u8> = buf.drain(..=pos).collect();
                        let line = String::from_utf8_lossy(&line);
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match parse(line) {
                            LineEvent::Token(token) => {
                                if tx.send(Ok(token)).await.is_err() {
                                    // Receiver gone: stop reading.
                                    return;
                                }
                            }
                            LineEvent::Done => return,
                            LineEvent::Skip => {}
                        }
                    }
                }
                Ok(None) => return,
                Err(e) => {
                    let _ = tx.send(Err(LoreError::Llm(e.to_string()))).await;
                    return;
                }
            }
        }
    });

    rx
}

/// Local Ollama chat model (`/api/chat`).
pub struct OllamaChat {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaChat {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(CHAT_TIMEOUT)
                .build()
                .expect("reqwest client"),
            base_url,
            model,
        }
    }

    async fn send(&self, messages: &[Message], stream: bool) -> Result<reqwest::Response> {
        let url = format!("{}/api/chat", self.base_url);
        let payload = serde_json::json!({
            "model": self.model,
            "messages": wire_messages(messages),
            "stream": stream,
            "options": { "temperature": 0 },
        });

        self.client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LoreError::Llm(format!("Ollama request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| LoreError::Llm(format!("Ollama returned an error: {}", e)))
    }
}

#[async_trait::async_trait]
impl ChatModel for OllamaChat {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let response = self.send(messages, false).await?;
        let json: Value = response
            .json()
            .await
            .map_err(|e| LoreError::Parse(e.to_string()))?;

        json["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LoreError::Parse("invalid Ollama chat response".into()))
    }

    async fn stream_complete(&self, messages: &[Message]) -> Result<TokenStream> {
        let response = self.send(messages, true).await?;
        debug!("Streaming chat response from Ollama model {}", self.model);

        // NDJSON: one object per line, {"message":{"content":...},"done":bool}
        Ok(spawn_line_stream(response, |line| {
            match serde_json::from_str::<Value>(line) {
                Ok(json) => {
                    if json["done"].as_bool() == Some(true) {
                        return LineEvent::Done;
                    }
                    match json["message"]["content"].as_str() {
                        Some(token) if !token.is_empty() => LineEvent::Token(token.to_string()),
                        _ => LineEvent::Skip,
                    }
                }
                Err(_) => LineEvent::Skip,
            }
        }))
    }
}

/// Hosted OpenAI chat model (`/v1/chat/completions`).
pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(CHAT_TIMEOUT)
                .build()
                .expect("reqwest client"),
            api_key,
            model,
        }
    }

    async fn send(&self, messages: &[Message], stream: bool) -> Result<reqwest::Response> {
        let payload = serde_json::json!({
            "model": self.model,
            "messages": wire_messages(messages),
            "temperature": 0,
            "stream": stream,
        });

        self.client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LoreError::Llm(format!("OpenAI request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| LoreError::Llm(format!("OpenAI returned an error: {}", e)))
    }
}

#[async_trait::async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let response = self.send(messages, false).await?;
        let json: Value = response
            .json()
            .await
            .map_err(|e| LoreError::Parse(e.to_string()))?;

        json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LoreError::Parse("invalid OpenAI chat response".into()))
    }

    async fn stream_complete(&self, messages: &[Message]) -> Result<TokenStream> {
        let response = self.send(messages, true).await?;
        debug!("Streaming chat response from OpenAI model {}", self.model);

        // SSE: "data: {json}" frames, terminated by "data: [DONE]".
        Ok(spawn_line_stream(response, |line| {
            let Some(data) = line.strip_prefix("data:") else {
                return LineEvent::Skip;
            };
            let data = data.trim();
            if data == "[DONE]" {
                return LineEvent::Done;
            }
            match serde_json::from_str::<Value>(data) {
                Ok(json) => match json["choices"][0]["delta"]["content"].as_str() {
                    Some(token) if !token.is_empty() => LineEvent::Token(token.to_string()),
                    _ => LineEvent::Skip,
                },
                Err(_) => LineEvent::Skip,
            }
        }))
    }
}
