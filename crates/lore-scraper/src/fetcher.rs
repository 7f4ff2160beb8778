//! HTTP fetcher with SPA detection and an optional renderer fallback

use crate::models::RawPage;
use lore_core::{LoreError, Result, Settings};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::warn;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; LoreBot/1.0; +https://github.com/lore-bot)";

/// Fingerprints of JavaScript-rendered pages that need a real browser.
fn spa_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            Regex::new(r#"(?i)<div[^>]+id=["'](?:root|app)["']"#).unwrap(),
            Regex::new(r"(?i)window\.__NEXT_DATA__").unwrap(),
            Regex::new(r"(?i)ng-version=").unwrap(),
            Regex::new(r"(?i)data-reactroot").unwrap(),
        ]
    })
}

fn script_style_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").unwrap())
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").unwrap())
}

/// True when `html` looks like a JavaScript SPA shell.
///
/// Either a known framework marker, or a large document with almost no
/// visible text once scripts, styles and tags are stripped.
pub(crate) fn is_spa(html: &str) -> bool {
    for pattern in spa_patterns() {
        if pattern.is_match(html) {
            return true;
        }
    }
    let no_scripts = script_style_re().replace_all(html, "");
    let stripped = tag_re().replace_all(&no_scripts, "");
    html.len() > 2000 && stripped.trim().len() < 200
}

/// Renders a URL in a real browser environment.
///
/// Injected like the embedder and chat model: the core cannot embed a
/// browser, so rendering is a capability provided from outside.
#[async_trait::async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<RawPage>;
}

/// Renderer backed by an HTTP rendering service.
///
/// Posts `{url, wait_until: "networkidle"}` and expects `{html}` back.
pub struct HttpRenderService {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRenderService {
    pub fn new(endpoint: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("reqwest client"),
            endpoint,
        }
    }
}

#[async_trait::async_trait]
impl PageRenderer for HttpRenderService {
    async fn render(&self, url: &str) -> Result<RawPage> {
        let payload = serde_json::json!({
            "url": url,
            "wait_until": "networkidle",
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LoreError::Fetch(format!("render service request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| LoreError::Fetch(format!("render service returned an error: {}", e)))?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LoreError::Parse(e.to_string()))?;
        let html = json["html"]
            .as_str()
            .ok_or_else(|| LoreError::Parse("render service response missing html".into()))?
            .to_string();

        Ok(RawPage {
            url: url.to_string(),
            html,
            status_code: 200,
        })
    }
}

/// Page fetcher with politeness delay and SPA fallback.
pub struct Fetcher {
    client: reqwest::Client,
    rate_limit_delay: Duration,
    renderer: Option<Arc<dyn PageRenderer>>,
}

impl Fetcher {
    pub fn new(settings: &Settings) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .expect("reqwest client");

        let renderer: Option<Arc<dyn PageRenderer>> =
            settings.render_service_url.as_ref().map(|endpoint| {
                Arc::new(HttpRenderService::new(
                    endpoint.clone(),
                    Duration::from_secs(settings.request_timeout_secs),
                )) as Arc<dyn PageRenderer>
            });

        Self {
            client,
            rate_limit_delay: Duration::from_secs_f64(settings.rate_limit_delay_secs),
            renderer,
        }
    }

    /// Override the renderer (tests, alternative services).
    pub fn with_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Fetch `url` and return its HTML.
    ///
    /// Redirects are followed; a non-2xx status fails the fetch. When the
    /// body carries an SPA fingerprint the configured renderer re-fetches
    /// the page; without a renderer the static HTML is used as-is.
    pub async fn fetch(&self, url: &str) -> Result<RawPage> {
        if !self.rate_limit_delay.is_zero() {
            tokio::time::sleep(self.rate_limit_delay).await;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LoreError::Fetch(format!("GET {} failed: {}", url, e)))?;
        let status = response.status();
        let response = response
            .error_for_status()
            .map_err(|e| LoreError::Fetch(format!("GET {} returned {}", url, e)))?;

        let html = response
            .text()
            .await
            .map_err(|e| LoreError::Fetch(format!("reading body of {} failed: {}", url, e)))?;

        let raw = RawPage {
            url: url.to_string(),
            html,
            status_code: status.as_u16(),
        };

        if is_spa(&raw.html) {
            match &self.renderer {
                Some(renderer) => return renderer.render(url).await,
                None => warn!("{} looks like a SPA but no renderer is configured", url),
            }
        }

        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_framework_markers() {
        assert!(is_spa(r#"<html><div id="root"></div></html>"#));
        assert!(is_spa(r#"<html><div id='app'></div></html>"#));
        assert!(is_spa("<script>window.__NEXT_DATA__ = {}</script>"));
        assert!(is_spa(r#"<app-root ng-version="15.0.1"></app-root>"#));
        assert!(is_spa(r#"<div data-reactroot=""></div>"#));
    }

    #[test]
    fn test_plain_article_is_not_spa() {
        let html = format!(
            "<html><body><p>{}</p></body></html>",
            "Plenty of visible text. ".repeat(40)
        );
        assert!(!is_spa(&html));
    }

    #[test]
    fn test_low_text_ratio_is_spa() {
        // Big document whose only content is script source.
        let html = format!(
            "<html><head><script>{}</script></head><body></body></html>",
            "var x = 1;".repeat(400)
        );
        assert!(is_spa(&html));
    }

    #[test]
    fn test_small_empty_page_is_not_spa() {
        assert!(!is_spa("<html><body></body></html>"));
    }
}
