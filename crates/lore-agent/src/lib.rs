//! Lore Agent - Web search providers and the autonomous research loop
//!
//! The search side is a chain of interchangeable providers with
//! first-non-empty-wins failover. The agent side is a five-stage loop
//! (plan → search → scrape → synthesise → evaluate) over a typed state
//! record, fanning out inside the search and scrape stages and producing
//! an Artifact node on success.

mod agent;
mod providers;
mod state;

pub use agent::{ProgressEvent, ResearchAgent, SourceIngestor};
pub use providers::{
    build_default_chain, BraveSearchProvider, DuckDuckGoProvider, SearchChain, SearchProvider,
    SearxngProvider,
};
pub use state::{ResearchState, StatePatch, Status};
