//! Shared test doubles for the integration scenarios in `tests/`
//!
//! All capabilities the core injects (embedder, chat model, search
//! provider, ingestion) have deterministic in-process stand-ins here so
//! the scenarios run without any network or model service.

use lore_agent::{SearchProvider, SourceIngestor};
use lore_core::{LoreError, Message, Node, Result};
use lore_inference::{ChatModel, Embedder, TokenStream};
use lore_rag::Ingestor;
use lore_scraper::CleanPage;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Deterministic embedder: a normalised byte histogram of the text.
pub struct HashEmbedder {
    pub dim: usize,
}

#[async_trait::async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; self.dim];
        for (i, b) in text.bytes().enumerate() {
            v[i % self.dim] += b as f32;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(v)
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

/// Chat model that pops scripted replies and errors once they run out.
pub struct ScriptedChatModel {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedChatModel {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
        }
    }
}

#[async_trait::async_trait]
impl ChatModel for ScriptedChatModel {
    async fn complete(&self, _messages: &[Message]) -> Result<String> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LoreError::Llm("scripted model exhausted".into()))
    }

    async fn stream_complete(&self, messages: &[Message]) -> Result<TokenStream> {
        let reply = self.complete(messages).await?;
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            for word in reply.split_inclusive(' ') {
                if tx.send(Ok(word.to_string())).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }
}

/// Provider answering each query with a fixed list, counting invocations.
pub struct StubProvider {
    name: &'static str,
    urls: Vec<String>,
    pub calls: Arc<AtomicUsize>,
}

impl StubProvider {
    pub fn new(name: &'static str, urls: &[&str]) -> Self {
        Self {
            name,
            urls: urls.iter().map(|s| s.to_string()).collect(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait::async_trait]
impl SearchProvider for StubProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn search(&self, _query: &str, _max_results: usize) -> Vec<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.clone()
    }
}

/// Provider deriving one URL from each query, so distinct queries yield
/// distinct results.
pub struct PerQueryProvider;

#[async_trait::async_trait]
impl SearchProvider for PerQueryProvider {
    fn name(&self) -> &'static str {
        "PerQuery"
    }

    async fn search(&self, query: &str, _max_results: usize) -> Vec<String> {
        vec![format!("https://results.example/{}", query.replace(' ', "-"))]
    }
}

/// Runs the real ingestion tail (chunk, embed, persist) against synthetic
/// pages, skipping only the network fetch.
pub struct OfflineIngestor {
    ingestor: Ingestor,
}

impl OfflineIngestor {
    pub fn new(ingestor: Ingestor) -> Self {
        Self { ingestor }
    }

    fn page_for(url: &str) -> CleanPage {
        let slug = url.rsplit('/').next().unwrap_or("page").replace('-', " ");
        CleanPage {
            url: url.to_string(),
            title: format!("Article about {}", slug),
            text: format!(
                "This article discusses {slug} in depth. {filler}",
                slug = slug,
                filler = "Detailed analysis follows with supporting evidence. ".repeat(8),
            ),
            links: Vec::new(),
        }
    }
}

#[async_trait::async_trait]
impl SourceIngestor for OfflineIngestor {
    async fn ingest_url(&self, url: &str) -> Result<Node> {
        self.ingestor.ingest_page(&Self::page_for(url)).await
    }
}

/// Ingestor that always fails (dead network).
pub struct FailingIngestor;

#[async_trait::async_trait]
impl SourceIngestor for FailingIngestor {
    async fn ingest_url(&self, url: &str) -> Result<Node> {
        Err(LoreError::Fetch(format!("cannot reach {}", url)))
    }
}
