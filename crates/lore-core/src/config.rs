//! Runtime settings resolved from environment variables
//!
//! All knobs live in one struct so the rest of the workspace never touches
//! the process environment directly. Loading a `.env` file is the caller's
//! concern.

use std::env;
use std::path::PathBuf;

/// Runtime configuration for every Lore component.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Root directory for the database and generated content files
    pub workspace_dir: PathBuf,

    // Embedding model
    pub embedding_provider: String,
    pub ollama_base_url: String,
    pub ollama_embed_model: String,
    pub openai_embed_model: String,
    /// Dimensionality of every stored vector
    pub embedding_dim: usize,

    // Chat / reasoning model
    pub llm_provider: String,
    pub ollama_chat_model: String,
    pub openai_chat_model: String,
    pub openai_api_key: String,

    // Scraper
    /// Per-request fetch timeout, seconds
    pub request_timeout_secs: u64,
    /// Politeness delay before each page fetch, seconds
    pub rate_limit_delay_secs: f64,
    /// Endpoint of an external headless-browser rendering service, if any
    pub render_service_url: Option<String>,

    // Chunking
    pub chunk_size: usize,
    pub chunk_overlap: usize,

    // Agent
    pub agent_max_iterations: u32,
    pub agent_max_concurrent_scrapes: usize,

    // Web search
    pub brave_api_key: String,
    pub searxng_base_url: String,
    pub search_provider_timeout_secs: u64,
    pub searxng_instance_timeout_secs: u64,
    pub search_retry_base_delay_secs: f64,
    pub search_retry_max: u32,
    pub search_max_results: usize,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Settings {
    /// Load settings from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let workspace_dir = env::var("LORE_WORKSPACE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".lore")
            });

        Self {
            workspace_dir,

            embedding_provider: var_or("EMBEDDING_PROVIDER", "ollama"),
            ollama_base_url: var_or("OLLAMA_BASE_URL", "http://localhost:11434"),
            ollama_embed_model: var_or("OLLAMA_EMBED_MODEL", "embeddinggemma:latest"),
            openai_embed_model: var_or("OPENAI_EMBED_MODEL", "text-embedding-3-small"),
            embedding_dim: parse_or("EMBEDDING_DIM", 768),

            llm_provider: var_or("LLM_PROVIDER", "ollama"),
            ollama_chat_model: var_or("OLLAMA_CHAT_MODEL", "ministral-3:8b"),
            openai_chat_model: var_or("OPENAI_CHAT_MODEL", "gpt-4o-mini"),
            openai_api_key: var_or("OPENAI_API_KEY", ""),

            request_timeout_secs: parse_or("REQUEST_TIMEOUT", 30),
            rate_limit_delay_secs: parse_or("RATE_LIMIT_DELAY", 1.0),
            render_service_url: env::var("RENDER_SERVICE_URL").ok().filter(|v| !v.is_empty()),

            chunk_size: parse_or("CHUNK_SIZE", 512),
            chunk_overlap: parse_or("CHUNK_OVERLAP", 64),

            agent_max_iterations: parse_or("AGENT_MAX_ITERATIONS", 5),
            agent_max_concurrent_scrapes: parse_or("AGENT_MAX_CONCURRENT_SCRAPES", 3),

            brave_api_key: var_or("BRAVE_API_KEY", ""),
            searxng_base_url: var_or("SEARXNG_BASE_URL", "https://searx.be"),
            search_provider_timeout_secs: parse_or("SEARCH_PROVIDER_TIMEOUT", 20),
            searxng_instance_timeout_secs: parse_or("SEARXNG_INSTANCE_TIMEOUT", 5),
            search_retry_base_delay_secs: parse_or("SEARCH_RETRY_BASE_DELAY", 2.0),
            search_retry_max: parse_or("SEARCH_RETRY_MAX", 2),
            search_max_results: parse_or("SEARCH_MAX_RESULTS", 5),
        }
    }

    /// Absolute path to the SQLite database file.
    pub fn db_path(&self) -> PathBuf {
        self.workspace_dir.join("library.db")
    }

    /// Directory for generated content files (reports).
    pub fn content_dir(&self) -> PathBuf {
        self.workspace_dir.join("content")
    }

    /// Create the workspace directories if they do not exist.
    pub fn ensure_workspace(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.content_dir())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_env()
    }
}
