//! Multi-provider web search with automatic failover
//!
//! Provider priority (highest to lowest):
//!   1. Brave Search — fast REST API; requires an API key.
//!   2. SearXNG — free metasearch, rotates public instances.
//!   3. DuckDuckGo — scraping-based; retried with exponential backoff.
//!
//! All providers share one contract: `search(query, max_results)` returns
//! a list of URLs and never errors — any failure yields `[]`. The chain
//! tries providers in order and returns the first non-empty result set.

use lore_core::Settings;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Public SearXNG instances tried in order after the configured one.
const SEARXNG_FALLBACK_INSTANCES: &[&str] = &[
    "https://search.bus-hit.me",
    "https://searx.be",
    "https://paulgo.io",
    "https://searx.tiekoetter.com",
];

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Strip surrounding double-quotes added by the planning LLM.
///
/// The planner tends to wrap queries in literal quotes, which makes some
/// engines refuse or return nothing.
pub(crate) fn normalise_query(query: &str) -> String {
    let q = query.trim();
    if q.len() > 2 && q.starts_with('"') && q.ends_with('"') {
        q[1..q.len() - 1].trim().to_string()
    } else {
        q.to_string()
    }
}

/// A single search provider.
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    /// Human-readable provider name, for logging.
    fn name(&self) -> &'static str;

    /// Return result URLs. Must return `[]` (never error) on any failure.
    async fn search(&self, query: &str, max_results: usize) -> Vec<String>;
}

// ---------------------------------------------------------------------------
// Brave
// ---------------------------------------------------------------------------

/// Brave Search REST API. Skipped (returns `[]`) without an API key.
pub struct BraveSearchProvider {
    client: reqwest::Client,
    api_key: String,
}

impl BraveSearchProvider {
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("reqwest client"),
            api_key,
        }
    }

    fn parse_results(data: &Value) -> Vec<String> {
        data["web"]["results"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item["url"].as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl SearchProvider for BraveSearchProvider {
    fn name(&self) -> &'static str {
        "Brave"
    }

    async fn search(&self, query: &str, max_results: usize) -> Vec<String> {
        if self.api_key.is_empty() {
            return Vec::new();
        }

        let query = normalise_query(query);
        let response = self
            .client
            .get("https://api.search.brave.com/res/v1/web/search")
            .query(&[("q", query.as_str()), ("count", &max_results.to_string())])
            .header("Accept", "application/json")
            .header("Accept-Encoding", "gzip")
            .header("X-Subscription-Token", &self.api_key)
            .send()
            .await;

        let data: Value = match response.and_then(|r| r.error_for_status()) {
            Ok(resp) => match resp.json().await {
                Ok(json) => json,
                Err(e) => {
                    warn!("[Brave] malformed response: {}", e);
                    return Vec::new();
                }
            },
            Err(e) => {
                warn!("[Brave] request failed: {}", e);
                return Vec::new();
            }
        };

        let results = Self::parse_results(&data);
        if !results.is_empty() {
            info!("[Brave] {} result(s)", results.len());
        }
        results
    }
}

// ---------------------------------------------------------------------------
// SearXNG
// ---------------------------------------------------------------------------

/// SearXNG metasearch over a rotation of instances.
///
/// The configured base URL is tried first, then the public fallback list.
/// Each instance gets a per-instance timeout that is deliberately shorter
/// than the overall provider timeout, so a dead instance fails fast and
/// the rotation moves on. The first instance returning a non-empty list
/// wins.
pub struct SearxngProvider {
    client: reqwest::Client,
    base_url: String,
}

impl SearxngProvider {
    pub fn new(base_url: String, instance_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(instance_timeout)
                .build()
                .expect("reqwest client"),
            base_url,
        }
    }

    fn parse_results(data: &Value, max_results: usize) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        if let Some(items) = data["results"].as_array() {
            for item in items {
                let url = item["url"].as_str().or_else(|| item["href"].as_str());
                if let Some(url) = url {
                    if !urls.iter().any(|u| u == url) {
                        urls.push(url.to_string());
                    }
                }
                if urls.len() >= max_results {
                    break;
                }
            }
        }
        urls
    }

    async fn query_instance(&self, base: &str, query: &str, max_results: usize) -> Option<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/search", base))
            .query(&[
                ("q", query),
                ("format", "json"),
                ("engines", "google,bing,brave,duckduckgo"),
            ])
            .header("Accept", "application/json, text/javascript, */*")
            .header("User-Agent", BROWSER_UA)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        match response {
            Ok(resp) => match resp.json::<Value>().await {
                Ok(data) => Some(Self::parse_results(&data, max_results)),
                Err(e) => {
                    debug!("[SearXNG] {} sent malformed JSON: {}", base, e);
                    None
                }
            },
            Err(e) => {
                debug!("[SearXNG] {} failed: {}", base, e);
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl SearchProvider for SearxngProvider {
    fn name(&self) -> &'static str {
        "SearXNG"
    }

    async fn search(&self, query: &str, max_results: usize) -> Vec<String> {
        let query = normalise_query(query);
        let primary = self.base_url.trim_end_matches('/').to_string();
        let mut instances = vec![primary.clone()];
        instances.extend(
            SEARXNG_FALLBACK_INSTANCES
                .iter()
                .filter(|u| u.trim_end_matches('/') != primary)
                .map(|u| u.to_string()),
        );

        for base in &instances {
            match self.query_instance(base, &query, max_results).await {
                Some(urls) if !urls.is_empty() => {
                    info!("[SearXNG] {} -> {} result(s)", base, urls.len());
                    return urls;
                }
                Some(_) => debug!("[SearXNG] {} returned 0 results, trying next", base),
                None => {}
            }
        }

        warn!("[SearXNG] all instances exhausted");
        Vec::new()
    }
}

// ---------------------------------------------------------------------------
// DuckDuckGo
// ---------------------------------------------------------------------------

fn ddg_redirect_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"uddg=([^&"'<>]+)"#).unwrap())
}

/// Scrapes the DuckDuckGo HTML results endpoint.
///
/// Result links are redirect URLs carrying the target in their `uddg`
/// query parameter. Rate limiting (HTTP 202/429, or a "ratelimit"
/// substring in the error) triggers exponential backoff; any other
/// failure returns `[]` immediately.
pub struct DuckDuckGoProvider {
    client: reqwest::Client,
    base_delay: Duration,
    max_retries: u32,
}

enum DdgError {
    RateLimited(String),
    Other(String),
}

impl DuckDuckGoProvider {
    pub fn new(timeout: Duration, base_delay: Duration, max_retries: u32) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("reqwest client"),
            base_delay,
            max_retries,
        }
    }

    /// Pull target URLs out of the results page markup.
    fn parse_result_urls(html: &str, max_results: usize) -> Vec<String> {
        let mut urls = Vec::new();
        for caps in ddg_redirect_re().captures_iter(html) {
            // uddg is percent-encoded; reuse the form decoder.
            let encoded = format!("u={}", &caps[1]);
            let decoded = url::form_urlencoded::parse(encoded.as_bytes())
                .next()
                .map(|(_, v)| v.into_owned());

            if let Some(target) = decoded {
                if target.starts_with("http") && !urls.contains(&target) {
                    urls.push(target);
                }
            }
            if urls.len() >= max_results {
                break;
            }
        }
        urls
    }

    async fn search_once(&self, query: &str, max_results: usize) -> Result<Vec<String>, DdgError> {
        let response = self
            .client
            .get("https://html.duckduckgo.com/html/")
            .query(&[("q", query)])
            .header("User-Agent", BROWSER_UA)
            .send()
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if msg.to_lowercase().contains("ratelimit") {
                    DdgError::RateLimited(msg)
                } else {
                    DdgError::Other(msg)
                }
            })?;

        let status = response.status().as_u16();
        if status == 202 || status == 429 {
            return Err(DdgError::RateLimited(format!("HTTP {}", status)));
        }
        let response = response
            .error_for_status()
            .map_err(|e| DdgError::Other(e.to_string()))?;
        let html = response
            .text()
            .await
            .map_err(|e| DdgError::Other(e.to_string()))?;

        Ok(Self::parse_result_urls(&html, max_results))
    }
}

#[async_trait::async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn name(&self) -> &'static str {
        "DuckDuckGo"
    }

    async fn search(&self, query: &str, max_results: usize) -> Vec<String> {
        let query = normalise_query(query);

        for attempt in 0..=self.max_retries {
            match self.search_once(&query, max_results).await {
                Ok(urls) => {
                    if !urls.is_empty() {
                        info!("[DuckDuckGo] {} result(s)", urls.len());
                    }
                    return urls;
                }
                Err(DdgError::RateLimited(msg)) => {
                    if attempt < self.max_retries {
                        let delay = self.base_delay * 2u32.pow(attempt);
                        warn!(
                            "[DuckDuckGo] rate-limited ({}); retry {}/{} in {:?}",
                            msg,
                            attempt + 1,
                            self.max_retries,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        warn!("[DuckDuckGo] exhausted {} retries", self.max_retries);
                        return Vec::new();
                    }
                }
                Err(DdgError::Other(msg)) => {
                    warn!("[DuckDuckGo] search error: {}", msg);
                    return Vec::new();
                }
            }
        }
        Vec::new()
    }
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// Try providers in order; return the first non-empty result list.
pub struct SearchChain {
    providers: Vec<Box<dyn SearchProvider>>,
}

impl SearchChain {
    pub fn new(providers: Vec<Box<dyn SearchProvider>>) -> Self {
        Self { providers }
    }

    /// Provider names in chain order, for logging and diagnostics.
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub async fn search(&self, query: &str, max_results: usize) -> Vec<String> {
        for provider in &self.providers {
            let urls = provider.search(query, max_results).await;
            if !urls.is_empty() {
                return urls;
            }
            debug!("[chain] {} returned nothing, trying next", provider.name());
        }
        info!("[chain] all providers returned no results");
        Vec::new()
    }
}

/// Brave (when keyed) → SearXNG → DuckDuckGo.
pub fn build_default_chain(settings: &Settings) -> SearchChain {
    let provider_timeout = Duration::from_secs(settings.search_provider_timeout_secs);
    let mut providers: Vec<Box<dyn SearchProvider>> = Vec::new();

    if !settings.brave_api_key.is_empty() {
        providers.push(Box::new(BraveSearchProvider::new(
            settings.brave_api_key.clone(),
            provider_timeout,
        )));
    }
    providers.push(Box::new(SearxngProvider::new(
        settings.searxng_base_url.clone(),
        Duration::from_secs(settings.searxng_instance_timeout_secs),
    )));
    providers.push(Box::new(DuckDuckGoProvider::new(
        provider_timeout,
        Duration::from_secs_f64(settings.search_retry_base_delay_secs),
        settings.search_retry_max,
    )));

    SearchChain::new(providers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubProvider {
        name: &'static str,
        urls: Vec<String>,
        calls: Arc<AtomicUsize>,
        seen_max: Arc<AtomicUsize>,
    }

    impl StubProvider {
        fn new(name: &'static str, urls: Vec<&str>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    name,
                    urls: urls.into_iter().map(String::from).collect(),
                    calls: calls.clone(),
                    seen_max: Arc::new(AtomicUsize::new(0)),
                },
                calls,
            )
        }
    }

    #[async_trait::async_trait]
    impl SearchProvider for StubProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn search(&self, _query: &str, max_results: usize) -> Vec<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_max.store(max_results, Ordering::SeqCst);
            self.urls.clone()
        }
    }

    #[test]
    fn test_normalise_strips_surrounding_quotes() {
        assert_eq!(normalise_query("\"solid state\""), "solid state");
        assert_eq!(normalise_query("  \"padded\"  "), "padded");
        assert_eq!(normalise_query("no quotes"), "no quotes");
        assert_eq!(normalise_query("\"\""), "\"\"");
        assert_eq!(normalise_query("\"inner\" quote"), "\"inner\" quote");
    }

    #[tokio::test]
    async fn test_chain_returns_first_non_empty() {
        let (p1, p1_calls) = StubProvider::new("P1", vec![]);
        let (p2, p2_calls) = StubProvider::new("P2", vec!["u1", "u2"]);
        let (p3, p3_calls) = StubProvider::new("P3", vec!["u3"]);
        let chain = SearchChain::new(vec![Box::new(p1), Box::new(p2), Box::new(p3)]);

        let urls = chain.search("q", 5).await;
        assert_eq!(urls, vec!["u1".to_string(), "u2".to_string()]);
        assert_eq!(p1_calls.load(Ordering::SeqCst), 1);
        assert_eq!(p2_calls.load(Ordering::SeqCst), 1);
        assert_eq!(p3_calls.load(Ordering::SeqCst), 0, "P3 never invoked");
    }

    #[tokio::test]
    async fn test_chain_empty_when_all_fail() {
        let (p1, _) = StubProvider::new("P1", vec![]);
        let (p2, _) = StubProvider::new("P2", vec![]);
        let chain = SearchChain::new(vec![Box::new(p1), Box::new(p2)]);
        assert!(chain.search("q", 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_chain_with_no_providers() {
        let chain = SearchChain::new(Vec::new());
        assert!(chain.search("q", 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_chain_forwards_max_results() {
        let (p1, _) = StubProvider::new("P1", vec!["u"]);
        let seen = p1.seen_max.clone();
        let chain = SearchChain::new(vec![Box::new(p1)]);
        chain.search("q", 7).await;
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_brave_parses_known_shape() {
        let data = json!({
            "web": { "results": [
                { "url": "https://a.example/one", "title": "One" },
                { "url": "https://b.example/two" },
                { "title": "no url" },
            ]}
        });
        assert_eq!(
            BraveSearchProvider::parse_results(&data),
            vec![
                "https://a.example/one".to_string(),
                "https://b.example/two".to_string(),
            ]
        );
    }

    #[test]
    fn test_brave_tolerates_malformed_shape() {
        assert!(BraveSearchProvider::parse_results(&json!({"web": 4})).is_empty());
        assert!(BraveSearchProvider::parse_results(&json!([])).is_empty());
    }

    #[test]
    fn test_searxng_parses_and_dedupes() {
        let data = json!({
            "results": [
                { "url": "https://a.example" },
                { "href": "https://b.example" },
                { "url": "https://a.example" },
                { "content": "no url at all" },
            ]
        });
        assert_eq!(
            SearxngProvider::parse_results(&data, 10),
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn test_searxng_respects_max_results() {
        let data = json!({
            "results": [
                { "url": "https://a.example" },
                { "url": "https://b.example" },
                { "url": "https://c.example" },
            ]
        });
        assert_eq!(SearxngProvider::parse_results(&data, 2).len(), 2);
    }

    #[test]
    fn test_ddg_parses_redirect_links() {
        let html = r#"
            <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fpage&amp;rut=abc">x</a>
            <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fother.org%2F&amp;rut=def">y</a>
            <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fpage&amp;rut=dup">dup</a>
        "#;
        assert_eq!(
            DuckDuckGoProvider::parse_result_urls(html, 10),
            vec![
                "https://example.com/page".to_string(),
                "https://other.org/".to_string(),
            ]
        );
    }

    #[test]
    fn test_ddg_parse_ignores_garbage() {
        assert!(DuckDuckGoProvider::parse_result_urls("<html>no results</html>", 10).is_empty());
    }

    #[test]
    fn test_default_chain_composition() {
        let mut settings = Settings::from_env();
        settings.brave_api_key = String::new();
        let chain = build_default_chain(&settings);
        assert_eq!(chain.provider_names(), vec!["SearXNG", "DuckDuckGo"]);

        settings.brave_api_key = "key".into();
        let chain = build_default_chain(&settings);
        assert_eq!(chain.provider_names(), vec!["Brave", "SearXNG", "DuckDuckGo"]);
    }
}
