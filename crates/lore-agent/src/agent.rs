//! The autonomous research loop
//!
//! Five stages over a shared [`ResearchState`]:
//!
//! ```text
//!     START -> planner -> searcher -> scraper -> synthesiser -> evaluator
//!                ^                                                  |
//!                +----------- status != done ----------------------+
//!                                                                  v
//!                                                                 END
//! ```
//!
//! Stages never abort the run: transient failures are absorbed at the
//! stage boundary and the state transition still fires. The evaluator is
//! the only arbiter of termination. Concurrency lives *inside* the
//! searcher and scraper stages (one worker pool per stage run, torn down
//! with it); stages themselves are strictly ordered.

use crate::providers::SearchChain;
use crate::state::{ResearchState, StatePatch, Status};
use lore_core::{node_type, LoreError, Message, NewNode, Node, Result, Settings};
use lore_graph::GraphStore;
use lore_inference::{ChatModel, Embedder};
use lore_rag::{retrieve_context, Ingestor};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// How many chunks of knowledge-base context the synthesiser retrieves.
const SYNTHESIS_TOP_K: usize = 5;

/// Ingestion capability used by the scraper stage.
///
/// The concrete implementation is [`lore_rag::Ingestor`]; tests substitute
/// their own to run the loop without network access.
#[async_trait::async_trait]
pub trait SourceIngestor: Send + Sync {
    async fn ingest_url(&self, url: &str) -> Result<Node>;
}

#[async_trait::async_trait]
impl SourceIngestor for Ingestor {
    async fn ingest_url(&self, url: &str) -> Result<Node> {
        Ingestor::ingest_url(self, url).await
    }
}

/// A stage transition notification for live progress display.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub stage: &'static str,
    pub message: String,
}

/// The research agent: capabilities plus configuration, no global state.
pub struct ResearchAgent {
    store: Arc<GraphStore>,
    chain: Arc<SearchChain>,
    ingestor: Arc<dyn SourceIngestor>,
    embedder: Arc<dyn Embedder>,
    chat_model: Arc<dyn ChatModel>,
    settings: Settings,
    progress: Option<mpsc::Sender<ProgressEvent>>,
}

impl ResearchAgent {
    pub fn new(
        store: Arc<GraphStore>,
        chain: Arc<SearchChain>,
        ingestor: Arc<dyn SourceIngestor>,
        embedder: Arc<dyn Embedder>,
        chat_model: Arc<dyn ChatModel>,
        settings: Settings,
    ) -> Self {
        Self {
            store,
            chain,
            ingestor,
            embedder,
            chat_model,
            settings,
            progress: None,
        }
    }

    /// Attach a channel that receives one event per stage completion.
    pub fn with_progress(mut self, tx: mpsc::Sender<ProgressEvent>) -> Self {
        self.progress = Some(tx);
        self
    }

    async fn emit(&self, stage: &'static str, message: String) {
        info!("[{}] {}", stage, message);
        if let Some(tx) = &self.progress {
            let _ = tx.send(ProgressEvent { stage, message }).await;
        }
    }

    // ------------------------------------------------------------------
    // Stages
    // ------------------------------------------------------------------

    /// Decompose the goal into up to 3 search queries via the chat model.
    ///
    /// A model failure or an empty parse falls back to the goal itself, so
    /// the searcher always has something to run.
    async fn planner(&self, state: &ResearchState) -> StatePatch {
        let prompt = format!(
            "You are a research assistant helping gather information on a topic.\n\
             Given the research goal below, generate exactly 3 specific, concise \
             search queries (one per line, no numbering, no bullets, no extra text) \
             that will help collect diverse and relevant sources.\n\n\
             Goal: {}\n\nSearch queries:",
            state.goal
        );

        let queries: Vec<String> = match self.chat_model.complete(&[Message::user(prompt)]).await {
            Ok(raw) => raw
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .take(3)
                .map(String::from)
                .collect(),
            Err(e) => {
                warn!("planner model call failed: {}", e);
                Vec::new()
            }
        };

        let plan = if queries.is_empty() {
            vec![state.goal.clone()]
        } else {
            queries
        };
        self.emit("planner", format!("{} queries", plan.len())).await;

        StatePatch {
            plan: Some(plan),
            iteration: Some(state.iteration + 1),
            status: Some(Status::Searching),
            ..Default::default()
        }
    }

    /// Run the provider chain for every query concurrently.
    ///
    /// One worker per query; the aggregated URL list is first-seen order
    /// across workers, de-duplicated. A failed worker is logged and
    /// skipped.
    async fn searcher(&self, state: &ResearchState) -> StatePatch {
        let mut workers: JoinSet<Vec<String>> = JoinSet::new();
        for query in state.plan.clone() {
            let chain = self.chain.clone();
            let max_results = self.settings.search_max_results;
            workers.spawn(async move { chain.search(&query, max_results).await });
        }

        let mut urls: Vec<String> = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(found) => {
                    for url in found {
                        if !urls.contains(&url) {
                            urls.push(url);
                        }
                    }
                }
                Err(e) => warn!("search worker failed: {}", e),
            }
        }

        self.emit("searcher", format!("{} unique URL(s)", urls.len())).await;
        StatePatch {
            urls_found: Some(urls),
            status: Some(Status::Scraping),
            ..Default::default()
        }
    }

    /// Ingest up to `agent_max_concurrent_scrapes` new URLs concurrently.
    ///
    /// Successes append to `urls_scraped` and `findings`; failures are
    /// logged and skipped.
    async fn scraper(&self, state: &ResearchState) -> StatePatch {
        let mut scraped = state.urls_scraped.clone();
        let mut findings = state.findings.clone();

        let batch: Vec<String> = state
            .urls_found
            .iter()
            .filter(|u| !scraped.contains(*u))
            .take(self.settings.agent_max_concurrent_scrapes)
            .cloned()
            .collect();

        let mut workers: JoinSet<(String, Result<Node>)> = JoinSet::new();
        for url in batch {
            let ingestor = self.ingestor.clone();
            workers.spawn(async move {
                let outcome = ingestor.ingest_url(&url).await;
                (url, outcome)
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((url, Ok(node))) => {
                    let words = node.meta_i64("word_count").unwrap_or(0);
                    findings.push(format!("Ingested: '{}' ({} words)", node.title, words));
                    scraped.push(url);
                }
                Ok((url, Err(e))) => warn!("scrape of {} failed: {}", url, e),
                Err(e) => warn!("scrape worker failed: {}", e),
            }
        }

        self.emit("scraper", format!("{} source(s) total", scraped.len())).await;
        StatePatch {
            urls_scraped: Some(scraped),
            findings: Some(findings),
            status: Some(Status::Synthesising),
            ..Default::default()
        }
    }

    /// Retrieve knowledge-base context for the goal and write the report.
    ///
    /// A model failure leaves the report empty; the evaluator decides what
    /// that means for the run.
    async fn synthesiser(&self, state: &ResearchState) -> StatePatch {
        let context = match retrieve_context(
            &self.store,
            self.embedder.as_ref(),
            &state.goal,
            SYNTHESIS_TOP_K,
        )
        .await
        {
            Ok(context) => context,
            Err(e) => {
                warn!("context retrieval failed: {}", e);
                "No relevant content found in the knowledge base.".to_string()
            }
        };

        let findings_text = if state.findings.is_empty() {
            "(no sources ingested)".to_string()
        } else {
            state.findings.join("\n")
        };

        let prompt = format!(
            "You are a research analyst tasked with writing a comprehensive report.\n\n\
             Research Goal: {}\n\n\
             Sources ingested:\n{}\n\n\
             Relevant excerpts from the knowledge base:\n{}\n\n\
             Write a well-structured, informative report in markdown format. \
             Include an introduction, key findings, and a conclusion.",
            state.goal, findings_text, context
        );

        let report = match self.chat_model.complete(&[Message::user(prompt)]).await {
            Ok(report) => report,
            Err(e) => {
                warn!("synthesiser model call failed: {}", e);
                String::new()
            }
        };

        self.emit("synthesiser", format!("report: {} chars", report.len())).await;
        StatePatch {
            report: Some(report),
            status: Some(Status::Evaluating),
            ..Default::default()
        }
    }

    /// Terminal when anything was ingested or the iteration cap is hit;
    /// otherwise route back to the planner.
    async fn evaluator(&self, state: &ResearchState) -> StatePatch {
        let at_limit = state.iteration >= self.settings.agent_max_iterations;
        let status = if !state.findings.is_empty() || at_limit {
            Status::Done
        } else {
            Status::RePlanning
        };

        self.emit(
            "evaluator",
            format!("iteration {} -> {}", state.iteration, status),
        )
        .await;
        StatePatch {
            status: Some(status),
            ..Default::default()
        }
    }

    // ------------------------------------------------------------------
    // Runner
    // ------------------------------------------------------------------

    /// Run the loop to completion and persist the report as an Artifact.
    pub async fn run(&self, goal: &str) -> Result<ResearchState> {
        let mut state = ResearchState::new(goal);

        while state.status != Status::Done {
            let patch = match state.status {
                Status::Planning | Status::RePlanning => self.planner(&state).await,
                Status::Searching => self.searcher(&state).await,
                Status::Scraping => self.scraper(&state).await,
                Status::Synthesising => self.synthesiser(&state).await,
                Status::Evaluating => self.evaluator(&state).await,
                Status::Done => break,
            };
            state.apply(patch);
        }

        if !state.report.is_empty() {
            let artifact = self.persist_artifact(&state)?;
            self.emit("runner", format!("report saved as artifact {}", artifact.id))
                .await;
            state.artifact_id = artifact.id;
        } else {
            self.emit("runner", "completed without a report".to_string()).await;
        }

        Ok(state)
    }

    /// Create the Artifact node and write the report file next to the db.
    fn persist_artifact(&self, state: &ResearchState) -> Result<Node> {
        let title: String = state.goal.chars().take(80).collect();

        let mut metadata = serde_json::Map::new();
        metadata.insert("goal".into(), json!(state.goal));
        metadata.insert("iterations".into(), json!(state.iteration));
        metadata.insert("sources_count".into(), json!(state.urls_scraped.len()));

        let artifact = self.store.create_node(
            NewNode::new(format!("Report: {}", title), node_type::ARTIFACT)
                .with_metadata(metadata),
        )?;

        // Best effort: the report also lives on disk for editors/exports,
        // but a write failure must not lose the artifact node.
        match self.write_report_file(&artifact.id, &state.report) {
            Ok(content_path) => {
                self.store.update_node(
                    &artifact.id,
                    lore_core::NodeUpdate {
                        content_path: Some(content_path),
                        ..Default::default()
                    },
                )?;
            }
            Err(e) => warn!("could not write report file: {}", e),
        }

        self.store
            .get_node(&artifact.id)?
            .ok_or_else(|| LoreError::Database("artifact vanished after insert".into()))
    }

    fn write_report_file(&self, artifact_id: &str, report: &str) -> Result<String> {
        self.settings.ensure_workspace()?;
        let relative = format!("content/{}.md", artifact_id);
        std::fs::write(self.settings.workspace_dir.join(&relative), report)?;
        Ok(relative)
    }
}
