//! Ingestion pipeline: fetch → extract → chunk → embed → persist
//!
//! Both entry points (`ingest_url`, `ingest_pdf`) share the same tail:
//! create a Source node, write its full text into the lexical index, then
//! per chunk create a Chunk node, index its text, store its embedding, and
//! connect a `HAS_CHUNK` edge. Chunk nodes appear in ascending
//! `chunk_index` order and each edge only after its target exists.

use crate::chunker::Chunker;
use lore_core::{node_type, relation, LoreError, NewNode, Node, Result, Settings};
use lore_graph::GraphStore;
use lore_inference::Embedder;
use lore_scraper::{extract_content, CleanPage, Fetcher};
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Orchestrates the full ingestion pipeline against one store.
pub struct Ingestor {
    store: Arc<GraphStore>,
    embedder: Arc<dyn Embedder>,
    fetcher: Fetcher,
    chunker: Chunker,
}

impl Ingestor {
    pub fn new(store: Arc<GraphStore>, embedder: Arc<dyn Embedder>, settings: &Settings) -> Self {
        Self {
            store,
            embedder,
            fetcher: Fetcher::new(settings),
            chunker: Chunker::from_settings(settings),
        }
    }

    /// Replace the fetcher (tests, custom renderer wiring).
    pub fn with_fetcher(mut self, fetcher: Fetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Scrape `url` and persist it as a Source with embedded Chunks.
    pub async fn ingest_url(&self, url: &str) -> Result<Node> {
        let raw = self.fetcher.fetch(url).await?;
        let clean = extract_content(&raw);
        if clean.text.trim().is_empty() {
            return Err(LoreError::Extract(format!("no readable text at {}", url)));
        }
        self.ingest_page(&clean).await
    }

    /// Persist an already-fetched page (the shared pipeline tail).
    pub async fn ingest_page(&self, page: &CleanPage) -> Result<Node> {
        let title = if page.title.trim().is_empty() {
            page.url.clone()
        } else {
            page.title.clone()
        };

        let mut metadata = Map::new();
        metadata.insert("url".into(), json!(page.url));
        metadata.insert("word_count".into(), json!(page.word_count()));
        metadata.insert("links_count".into(), json!(page.links.len()));

        self.persist_document(&title, metadata, &page.text, Map::new())
            .await
    }

    /// Extract a local PDF page-by-page and persist it as a Source.
    pub async fn ingest_pdf(&self, path: &Path) -> Result<Node> {
        if !path.exists() {
            return Err(LoreError::NotFound(format!("PDF {}", path.display())));
        }

        let pages = pdf_extract::extract_text_by_pages(path)
            .map_err(|e| LoreError::Extract(format!("PDF extraction failed: {}", e)))?;
        let full_text = pages
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        if full_text.is_empty() {
            return Err(LoreError::Extract(format!(
                "no text in PDF {}",
                path.display()
            )));
        }

        let title = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document")
            .to_string();

        let mut metadata = Map::new();
        metadata.insert("path".into(), json!(path.display().to_string()));
        metadata.insert("word_count".into(), json!(full_text.split_whitespace().count()));
        metadata.insert("source_type".into(), json!("pdf"));

        let mut chunk_extra = Map::new();
        chunk_extra.insert("source_type".into(), json!("pdf"));

        self.persist_document(&title, metadata, &full_text, chunk_extra)
            .await
    }

    /// Create the Source node, index its text, then chunk/embed/persist.
    ///
    /// A failed chunk embedding aborts the whole ingest: a Source with a
    /// partial chunk set is not a state this pipeline produces on its own.
    async fn persist_document(
        &self,
        title: &str,
        metadata: Map<String, Value>,
        text: &str,
        chunk_extra: Map<String, Value>,
    ) -> Result<Node> {
        let source = self
            .store
            .create_node(NewNode::new(title, node_type::SOURCE).with_metadata(metadata))?;
        self.store.set_content_body(&source.id, text)?;

        let chunks = self.chunker.chunk(text);
        let total = chunks.len();

        for (index, chunk_text) in chunks.iter().enumerate() {
            let embedding = self.embedder.embed(chunk_text).await?;

            let mut chunk_meta = chunk_extra.clone();
            chunk_meta.insert("source_id".into(), json!(source.id));
            chunk_meta.insert("chunk_index".into(), json!(index));
            chunk_meta.insert("text".into(), json!(chunk_text));

            let chunk_node = self.store.create_node(
                NewNode::new(
                    format!("{} [chunk {}/{}]", title, index + 1, total),
                    node_type::CHUNK,
                )
                .with_metadata(chunk_meta),
            )?;

            self.store.set_content_body(&chunk_node.id, chunk_text)?;
            self.store.upsert_embedding(&chunk_node.id, &embedding)?;
            self.store
                .connect_nodes(&source.id, &chunk_node.id, relation::HAS_CHUNK)?;
        }

        info!("Ingested '{}' ({} chunks)", title, total);
        Ok(source)
    }
}
