//! Research-agent scenarios over the real store and ingestion tail

use lore_agent::{
    ResearchAgent, SearchChain, SearchProvider, SourceIngestor, Status,
};
use lore_core::{node_type, Settings};
use lore_graph::GraphStore;
use lore_rag::Ingestor;
use lore_tests::{FailingIngestor, HashEmbedder, OfflineIngestor, ScriptedChatModel, StubProvider};
use std::sync::atomic::Ordering;
use std::sync::Arc;

const DIM: usize = 8;

fn settings(dir: &tempfile::TempDir) -> Settings {
    let mut settings = Settings::from_env();
    settings.workspace_dir = dir.path().to_path_buf();
    settings.chunk_size = 160;
    settings.chunk_overlap = 24;
    settings.rate_limit_delay_secs = 0.0;
    settings.agent_max_iterations = 5;
    settings.agent_max_concurrent_scrapes = 3;
    settings
}

fn agent(
    store: &Arc<GraphStore>,
    providers: Vec<Box<dyn SearchProvider>>,
    ingestor: Arc<dyn SourceIngestor>,
    chat: ScriptedChatModel,
    settings: Settings,
) -> ResearchAgent {
    ResearchAgent::new(
        store.clone(),
        Arc::new(SearchChain::new(providers)),
        ingestor,
        Arc::new(HashEmbedder { dim: DIM }),
        Arc::new(chat),
        settings,
    )
}

/// Happy path: three queries, three distinct URLs, real chunk/embed tail,
/// a synthesised report, and an Artifact stamped with the run's numbers.
#[tokio::test]
async fn research_run_happy_path() {
    let dir = tempfile::TempDir::new().unwrap();
    let settings = settings(&dir);
    let store = Arc::new(GraphStore::in_memory(DIM).unwrap());
    let ingestor = Arc::new(OfflineIngestor::new(Ingestor::new(
        store.clone(),
        Arc::new(HashEmbedder { dim: DIM }),
        &settings,
    )));
    let chat = ScriptedChatModel::new(&["solid state\nanode materials\nrecycling", "# Report"]);

    let agent = agent(
        &store,
        vec![Box::new(lore_tests::PerQueryProvider)],
        ingestor,
        chat,
        settings,
    );
    let state = agent.run("G").await.unwrap();

    assert_eq!(state.status, Status::Done);
    assert_eq!(state.iteration, 1);
    assert_eq!(state.report, "# Report");
    assert_eq!(state.urls_scraped.len(), 3);
    assert_eq!(state.findings.len(), 3);

    // Real Sources and Chunks exist in the store.
    assert_eq!(store.list_nodes(Some(node_type::SOURCE)).unwrap().len(), 3);
    assert!(!store.list_nodes(Some(node_type::CHUNK)).unwrap().is_empty());

    // The Artifact records the run.
    let artifact = store.get_node(&state.artifact_id).unwrap().unwrap();
    assert_eq!(artifact.meta_str("goal"), Some("G"));
    assert_eq!(artifact.meta_i64("iterations"), Some(1));
    assert_eq!(artifact.meta_i64("sources_count"), Some(3));
}

/// Everything fails: the loop re-plans until the cap and ends reportless.
#[tokio::test]
async fn research_run_replans_then_terminates() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut settings = settings(&dir);
    settings.agent_max_iterations = 3;
    let store = Arc::new(GraphStore::in_memory(DIM).unwrap());

    let empty = StubProvider::new("Empty", &[]);
    let agent = agent(
        &store,
        vec![Box::new(empty)],
        Arc::new(FailingIngestor),
        ScriptedChatModel::new(&[]),
        settings,
    );
    let state = agent.run("G").await.unwrap();

    assert_eq!(state.status, Status::Done);
    assert_eq!(state.iteration, 3);
    assert!(state.report.is_empty());
    assert!(state.artifact_id.is_empty());
    assert!(store
        .list_nodes(Some(node_type::ARTIFACT))
        .unwrap()
        .is_empty());
}

/// Chain fall-through: the first non-empty provider wins and later
/// providers are never invoked.
#[tokio::test]
async fn provider_chain_fall_through() {
    let p1 = StubProvider::new("P1", &[]);
    let p2 = StubProvider::new("P2", &["u1", "u2"]);
    let p3 = StubProvider::new("P3", &["u3"]);
    let (c1, c2, c3) = (p1.calls.clone(), p2.calls.clone(), p3.calls.clone());

    let chain = SearchChain::new(vec![Box::new(p1), Box::new(p2), Box::new(p3)]);
    let urls = chain.search("q", 5).await;

    assert_eq!(urls, vec!["u1".to_string(), "u2".to_string()]);
    assert_eq!(c1.load(Ordering::SeqCst), 1);
    assert_eq!(c2.load(Ordering::SeqCst), 1);
    assert_eq!(c3.load(Ordering::SeqCst), 0);
}

/// The searcher deduplicates across queries while the scraper skips
/// anything already ingested in a previous iteration.
#[tokio::test]
async fn urls_deduplicated_across_queries() {
    let dir = tempfile::TempDir::new().unwrap();
    let settings = settings(&dir);
    let store = Arc::new(GraphStore::in_memory(DIM).unwrap());
    let ingestor = Arc::new(OfflineIngestor::new(Ingestor::new(
        store.clone(),
        Arc::new(HashEmbedder { dim: DIM }),
        &settings,
    )));

    // Three queries, all answered with the same two URLs.
    let same = StubProvider::new("Same", &["https://dup.example/a", "https://dup.example/b"]);
    let chat = ScriptedChatModel::new(&["q1\nq2\nq3", "# R"]);

    let agent = agent(&store, vec![Box::new(same)], ingestor, chat, settings);
    let state = agent.run("G").await.unwrap();

    assert_eq!(state.urls_found.len(), 2);
    assert_eq!(state.urls_scraped.len(), 2);
    assert_eq!(store.list_nodes(Some(node_type::SOURCE)).unwrap().len(), 2);
}
