//! Content extraction: turns a [`RawPage`] into a [`CleanPage`]
//!
//! Two tiers, mirroring a readability extractor with a structural fallback:
//! first a paragraph-density pass over `<p>` blocks, and when that yields
//! too little text, a container heuristic preferring `<main>` over
//! `<article>` over `<body>` with scripts, styles and navigation stripped.

use crate::models::{CleanPage, RawPage};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// Minimum characters the paragraph pass must produce to be trusted.
const READABILITY_MIN_CHARS: usize = 200;

macro_rules! cached_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).unwrap())
        }
    };
}

cached_regex!(noise_re, r"(?is)<(script|style|noscript)[^>]*>.*?</(script|style|noscript)>");
cached_regex!(comment_re, r"(?s)<!--.*?-->");
cached_regex!(chrome_re, r"(?is)<(nav|header|footer)[^>]*>.*?</(nav|header|footer)>");
cached_regex!(paragraph_re, r"(?is)<p[^>]*>(.*?)</p>");
cached_regex!(main_re, r"(?is)<main[^>]*>(.*)</main>");
cached_regex!(article_re, r"(?is)<article[^>]*>(.*)</article>");
cached_regex!(body_re, r"(?is)<body[^>]*>(.*)</body>");
cached_regex!(block_end_re, r"(?is)</(p|div|h[1-6]|li|ul|ol|section|blockquote|table|tr)>|<br\s*/?>");
cached_regex!(tag_strip_re, r"<[^>]+>");
cached_regex!(title_re, r"(?is)<title[^>]*>([^<]+)</title>");
cached_regex!(href_re, r#"(?is)<a\s[^>]*href\s*=\s*["']([^"']+)["']"#);
cached_regex!(numeric_entity_re, r"&#(\d+);");
cached_regex!(spaces_re, r"[ \t\r\x0c]+");

fn decode_entities(text: &str) -> String {
    let text = numeric_entity_re().replace_all(text, |caps: &regex::Captures| {
        caps[1]
            .parse::<u32>()
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });
    text.replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Flatten an HTML fragment to plain text with paragraph breaks.
fn html_to_text(fragment: &str) -> String {
    let cleaned = noise_re().replace_all(fragment, " ");
    let cleaned = comment_re().replace_all(&cleaned, " ");
    let broken = block_end_re().replace_all(&cleaned, "\n\n");
    let stripped = tag_strip_re().replace_all(&broken, " ");
    let decoded = decode_entities(&stripped);

    let collapsed = spaces_re().replace_all(&decoded, " ");
    let mut paragraphs: Vec<String> = Vec::new();
    for block in collapsed.split("\n\n") {
        let block = block
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !block.is_empty() {
            paragraphs.push(block);
        }
    }
    paragraphs.join("\n\n")
}

/// Readability pass: keep the page's paragraph blocks.
fn extract_paragraphs(html: &str) -> String {
    let cleaned = noise_re().replace_all(html, " ");
    let blocks: Vec<String> = paragraph_re()
        .captures_iter(&cleaned)
        .map(|caps| html_to_text(&caps[1]))
        .filter(|text| !text.is_empty())
        .collect();
    blocks.join("\n\n")
}

/// Structural fallback: prefer `<main>`, then `<article>`, then `<body>`.
fn extract_structural(html: &str) -> String {
    let cleaned = noise_re().replace_all(html, " ");
    let cleaned = chrome_re().replace_all(&cleaned, " ");

    let container = main_re()
        .captures(&cleaned)
        .or_else(|| article_re().captures(&cleaned))
        .or_else(|| body_re().captures(&cleaned))
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| cleaned.to_string());

    html_to_text(&container)
}

/// Text content of the first `<title>` tag, or empty string.
fn extract_title(html: &str) -> String {
    title_re()
        .captures(html)
        .map(|caps| decode_entities(caps[1].trim()))
        .unwrap_or_default()
}

/// De-duplicated, absolutised `<a href>` targets.
///
/// Fragment-only links and non-navigational schemes are excluded.
fn extract_links(html: &str, base_url: &str) -> Vec<String> {
    let base = Url::parse(base_url).ok();
    let mut seen = std::collections::HashSet::new();
    let mut links = Vec::new();

    for caps in href_re().captures_iter(html) {
        let href = caps[1].trim();
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        let lower = href.to_ascii_lowercase();
        if lower.starts_with("mailto:") || lower.starts_with("javascript:") {
            continue;
        }

        let absolute = match &base {
            Some(base) => match base.join(href) {
                Ok(url) => url.to_string(),
                Err(_) => continue,
            },
            None => href.to_string(),
        };

        if seen.insert(absolute.clone()) {
            links.push(absolute);
        }
    }
    links
}

/// Extract clean, readable text from a fetched page.
pub fn extract_content(raw: &RawPage) -> CleanPage {
    let mut text = extract_paragraphs(&raw.html);
    if text.len() < READABILITY_MIN_CHARS {
        let structural = extract_structural(&raw.html);
        if structural.len() > text.len() {
            text = structural;
        }
    }

    CleanPage {
        url: raw.url.clone(),
        title: extract_title(&raw.html),
        text,
        links: extract_links(&raw.html, &raw.url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(html: &str) -> RawPage {
        RawPage {
            url: "https://example.com/articles/one".into(),
            html: html.into(),
            status_code: 200,
        }
    }

    #[test]
    fn test_extracts_title_and_paragraphs() {
        let html = format!(
            "<html><head><title>The Title</title></head><body>\
             <p>{}</p><p>{}</p></body></html>",
            "First paragraph with real content. ".repeat(5),
            "Second paragraph with more content. ".repeat(5),
        );
        let clean = extract_content(&page(&html));

        assert_eq!(clean.title, "The Title");
        assert!(clean.text.contains("First paragraph"));
        assert!(clean.text.contains("\n\n"), "paragraph break preserved");
        assert!(clean.word_count() > 20);
    }

    #[test]
    fn test_structural_fallback_prefers_main() {
        let html = "<html><body>\
            <nav>Home About Contact and plenty of menu text</nav>\
            <main>Main area content here</main>\
            </body></html>";
        let clean = extract_content(&page(html));

        assert!(clean.text.contains("Main area content here"));
        assert!(!clean.text.contains("About"));
    }

    #[test]
    fn test_structural_fallback_strips_scripts() {
        let html = "<html><body><article>\
            Visible words<script>var hidden = true;</script> remain\
            </article></body></html>";
        let clean = extract_content(&page(html));

        assert!(clean.text.contains("Visible words"));
        assert!(clean.text.contains("remain"));
        assert!(!clean.text.contains("hidden"));
    }

    #[test]
    fn test_entities_are_decoded() {
        let html = "<html><body><main>Fish &amp; chips &#8212; cheap</main></body></html>";
        let clean = extract_content(&page(html));
        assert!(clean.text.contains("Fish & chips"));
        assert!(clean.text.contains('\u{2014}'));
    }

    #[test]
    fn test_links_deduped_absolutised_no_fragments() {
        let html = r##"<html><body>
            <a href="/a">A</a>
            <a href="/a">A again</a>
            <a href="https://other.org/page">B</a>
            <a href="#section">fragment</a>
            <a href="mailto:x@y.z">mail</a>
            </body></html>"##;
        let clean = extract_content(&page(html));

        assert_eq!(
            clean.links,
            vec![
                "https://example.com/a".to_string(),
                "https://other.org/page".to_string(),
            ]
        );
    }

    #[test]
    fn test_missing_title_is_empty() {
        let clean = extract_content(&page("<html><body><main>x</main></body></html>"));
        assert_eq!(clean.title, "");
    }
}
