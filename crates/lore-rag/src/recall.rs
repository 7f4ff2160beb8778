//! Grounded question answering over the knowledge graph
//!
//! `recall` answers in one shot with a Sources section appended;
//! `chat_stream` answers as a live token stream, followed by a citation
//! payload and an end-of-turn event. Both retrieve with hybrid search,
//! optionally scoped to a project's reachable nodes.

use lore_core::{Message, Node, Result};
use lore_graph::{GraphStore, DEFAULT_SCOPE_DEPTH};
use lore_inference::{ChatModel, Embedder};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Maximum prior turns included in the chat prompt (user + assistant pairs).
pub const MAX_HISTORY_TURNS: usize = 10;

/// One retrieved node referenced by the answer.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCitation {
    pub id: String,
    pub title: String,
    pub url: String,
}

/// Events emitted by [`chat_stream`], in order: any number of `Token`s,
/// then `Citations` (when sources were found), then `Done`. An `Error`
/// ends the stream immediately.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    Token(String),
    Citations(Vec<ChatCitation>),
    Done,
    Error(String),
}

/// Resolve a project id to a scope set; an empty project means no scope.
fn resolve_scope(store: &GraphStore, project_id: Option<&str>) -> Result<Option<Vec<String>>> {
    match project_id {
        Some(pid) => {
            let scope = store.project_scope(pid, DEFAULT_SCOPE_DEPTH)?;
            Ok(if scope.is_empty() { None } else { Some(scope) })
        }
        None => Ok(None),
    }
}

fn numbered_context(results: &[Node]) -> (Vec<String>, Vec<ChatCitation>) {
    let mut context_parts = Vec::with_capacity(results.len());
    let mut citations = Vec::with_capacity(results.len());

    for (i, node) in results.iter().enumerate() {
        // Chunks carry their text in metadata; anything else falls back to
        // its title.
        let display = node
            .meta_str("text")
            .filter(|t| !t.is_empty())
            .unwrap_or(node.title.as_str());
        context_parts.push(format!("[{}] {}", i + 1, display));
        citations.push(ChatCitation {
            id: node.id.clone(),
            title: node.title.clone(),
            url: node.meta_str("url").unwrap_or("").to_string(),
        });
    }
    (context_parts, citations)
}

/// Retrieve the most relevant chunks formatted for prompt injection.
///
/// Tries hybrid search first and degrades to keyword-only search when the
/// embedder is unavailable.
pub async fn retrieve_context(
    store: &GraphStore,
    embedder: &dyn Embedder,
    query: &str,
    top_k: usize,
) -> Result<String> {
    let nodes = match embedder.embed(query).await {
        Ok(embedding) => store.hybrid_search(query, &embedding, top_k, None)?,
        Err(e) => {
            warn!("Embedder unavailable ({}); falling back to keyword search", e);
            store.fts_search(query, top_k, None)?
        }
    };

    if nodes.is_empty() {
        return Ok("No relevant content found in the knowledge base.".to_string());
    }

    let parts: Vec<String> = nodes
        .iter()
        .map(|node| match node.meta_str("text").filter(|t| !t.is_empty()) {
            Some(text) => format!("[{}] {}\n{}", node.node_type, node.title, text),
            None => format!("[{}] {}", node.node_type, node.title),
        })
        .collect();
    Ok(parts.join("\n\n---\n\n"))
}

/// Answer `question` from retrieved chunks, citing sources by number.
pub async fn recall(
    store: &GraphStore,
    embedder: &dyn Embedder,
    chat_model: &dyn ChatModel,
    question: &str,
    project_id: Option<&str>,
    top_k: usize,
) -> Result<String> {
    let scope = resolve_scope(store, project_id)?;
    let embedding = embedder.embed(question).await?;
    let results = store.hybrid_search(question, &embedding, top_k, scope.as_deref())?;

    if results.is_empty() {
        return Ok("No relevant sources found in the knowledge base.".to_string());
    }

    let (context_parts, citations) = numbered_context(&results);
    let prompt = format!(
        "You are a research assistant. Answer the question below using ONLY the \
         provided sources. Cite sources by their number (e.g. [1], [2]). \
         If the sources do not contain enough information to answer, say so.\n\n\
         Sources:\n{}\n\nQuestion: {}\n\nAnswer:",
        context_parts.join("\n\n"),
        question
    );

    let answer = chat_model.complete(&[Message::user(prompt)]).await?;

    let sources_section: Vec<String> = citations
        .iter()
        .enumerate()
        .map(|(i, c)| format!("[{}] {}", i + 1, c.title))
        .collect();
    Ok(format!(
        "{}\n\nSources:\n{}",
        answer.trim(),
        sources_section.join("\n")
    ))
}

/// Stream one chat turn: retrieval, prompt, live tokens, citations, done.
///
/// Dropping the returned receiver cancels the turn; the producer stops at
/// its next send.
pub fn chat_stream(
    store: Arc<GraphStore>,
    embedder: Arc<dyn Embedder>,
    chat_model: Arc<dyn ChatModel>,
    question: String,
    history: Vec<Message>,
    project_id: Option<String>,
    top_k: usize,
) -> mpsc::Receiver<ChatEvent> {
    let (tx, rx) = mpsc::channel::<ChatEvent>(32);

    tokio::spawn(async move {
        if let Err(e) = chat_turn(
            store, embedder, chat_model, question, history, project_id, top_k, &tx,
        )
        .await
        {
            let _ = tx.send(ChatEvent::Error(e.to_string())).await;
        }
    });

    rx
}

#[allow(clippy::too_many_arguments)]
async fn chat_turn(
    store: Arc<GraphStore>,
    embedder: Arc<dyn Embedder>,
    chat_model: Arc<dyn ChatModel>,
    question: String,
    history: Vec<Message>,
    project_id: Option<String>,
    top_k: usize,
    tx: &mpsc::Sender<ChatEvent>,
) -> Result<()> {
    let scope = resolve_scope(&store, project_id.as_deref())?;
    let embedding = embedder.embed(&question).await?;
    let results = store.hybrid_search(&question, &embedding, top_k, scope.as_deref())?;
    info!("chat: retrieved {} nodes for {:?}", results.len(), question);

    let (context_parts, citations) = numbered_context(&results);

    let system_content = if context_parts.is_empty() {
        "You are a research assistant. No relevant sources were found in the \
         knowledge base for this question. Politely let the user know and \
         offer general guidance if possible."
            .to_string()
    } else {
        format!(
            "You are a research assistant. Answer the user's question using \
             ONLY the provided sources. Cite sources by their number \
             (e.g. [1], [2]). If the sources do not contain enough \
             information to answer, say so.\n\nSources:\n{}",
            context_parts.join("\n\n")
        )
    };

    let mut messages = vec![Message::system(system_content)];
    let start = history.len().saturating_sub(MAX_HISTORY_TURNS * 2);
    messages.extend_from_slice(&history[start..]);
    messages.push(Message::user(question));

    let mut tokens = chat_model.stream_complete(&messages).await?;
    while let Some(item) = tokens.recv().await {
        let token = item?;
        if tx.send(ChatEvent::Token(token)).await.is_err() {
            // Consumer went away; stop pulling from the model.
            return Ok(());
        }
    }

    if !citations.is_empty() {
        let _ = tx.send(ChatEvent::Citations(citations)).await;
    }
    let _ = tx.send(ChatEvent::Done).await;
    Ok(())
}
