//! Review page text extraction over HTTP.

use std::io::Read;
use std::sync::LazyLock;
use std::time::Duration;

use scraper::{ElementRef, Html, Selector};
use serde_json::{Value, json};

use super::error::{EnrichmentError, classify_ureq};
use super::{EnrichmentStep, user_agent};
use crate::model::ClaimReview;
use crate::normalize::collapse_whitespace;

/// Largest response body read from a review page.
const MAX_BODY_BYTES: u64 = 4 * 1024 * 1024;

/// Pages yielding less main text than this are treated as unextractable.
const MIN_TEXT_CHARS: usize = 40;

static ROOTS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    ["article", "main", "[role=main]", "body"]
        .iter()
        .map(|s| Selector::parse(s).expect("static selector must parse"))
        .collect()
});

static CONTENT: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("h1, h2, h3, p, li, blockquote").expect("static selector must parse")
});

/// Fetches the review page and extracts its main text.
///
/// Fingerprint input is the sanitized review URL, so every review of the
/// same page shares one fetch.
pub struct UrlTextStep {
    agent: ureq::Agent,
}

impl UrlTextStep {
    pub const NAME: &'static str = "enricher.url_text";

    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(&user_agent())
            .build();
        Self { agent }
    }

    fn malformed(message: impl Into<String>) -> EnrichmentError {
        EnrichmentError::MalformedResponse {
            step: Self::NAME.into(),
            message: message.into(),
        }
    }
}

impl EnrichmentStep for UrlTextStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn input(&self, review: &ClaimReview) -> Option<String> {
        let url = review.review_url();
        (url.starts_with("http://") || url.starts_with("https://")).then(|| url.to_string())
    }

    fn invoke(&self, input: &str) -> Result<Value, EnrichmentError> {
        let resp = self
            .agent
            .get(input)
            .set("Accept", "text/html,application/xhtml+xml")
            .call()
            .map_err(|e| classify_ureq(Self::NAME, e))?;

        let content_type = resp.content_type().to_ascii_lowercase();
        if !content_type.contains("html") {
            return Err(Self::malformed(format!(
                "expected an HTML page, got {content_type}"
            )));
        }

        let mut bytes = Vec::new();
        resp.into_reader()
            .take(MAX_BODY_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                    EnrichmentError::Timeout {
                        step: Self::NAME.into(),
                    }
                }
                _ => EnrichmentError::Transport {
                    step: Self::NAME.into(),
                    message: e.to_string(),
                },
            })?;

        let html = String::from_utf8_lossy(&bytes);
        let text = extract_main_text(&html)
            .ok_or_else(|| Self::malformed("no extractable main text"))?;
        tracing::debug!(url = input, chars = text.len(), "extracted review text");
        Ok(json!({ "text": text }))
    }

    fn apply(&self, review: &mut ClaimReview, data: &Value) -> Result<(), EnrichmentError> {
        let text = data["text"]
            .as_str()
            .ok_or_else(|| Self::malformed("cached result has no `text` field"))?;
        review.url_text = Some(text.to_string());
        Ok(())
    }
}

/// Main text of an HTML page.
///
/// Tries `<article>`, `<main>`, `[role=main]` and finally `<body>`, taking
/// headings, paragraphs, list items and quotes under the first root that
/// yields enough text.
pub fn extract_main_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    ROOTS.iter().find_map(|sel| {
        document
            .select(sel)
            .map(collect_blocks)
            .find(|text| text.chars().count() >= MIN_TEXT_CHARS)
    })
}

fn collect_blocks(root: ElementRef<'_>) -> String {
    let blocks: Vec<String> = root
        .select(&CONTENT)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .collect();
    blocks.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Claim;

    const PAGE: &str = r#"
        <html><head><title>Review</title><script>var x = 1;</script></head>
        <body>
          <nav><p>Home | About</p></nav>
          <article>
            <h1>Claim that the Arctic is ice free is incorrect</h1>
            <p>Sea ice extent   has declined, but
               the Arctic still has ice in summer.</p>
            <ul><li>Source: NSIDC</li></ul>
          </article>
        </body></html>"#;

    #[test]
    fn prefers_article_content() {
        let text = extract_main_text(PAGE).unwrap();
        assert!(text.starts_with("Claim that the Arctic"));
        assert!(text.contains("Sea ice extent has declined, but the Arctic still has ice in summer."));
        assert!(text.contains("Source: NSIDC"));
        assert!(!text.contains("Home | About"));
        assert!(!text.contains("var x"));
    }

    #[test]
    fn falls_back_to_body() {
        let html = "<html><body><p>This page has no article element but enough text to count.</p></body></html>";
        let text = extract_main_text(html).unwrap();
        assert!(text.contains("no article element"));
    }

    #[test]
    fn empty_pages_yield_nothing() {
        assert_eq!(extract_main_text("<html><body><p>hi</p></body></html>"), None);
    }

    #[test]
    fn only_http_reviews_are_eligible() {
        let step = UrlTextStep::new(Duration::from_secs(1));
        let web = ClaimReview::new(Claim::new("c").unwrap(), "example.org/r").unwrap();
        let urn = ClaimReview::new(Claim::new("c").unwrap(), "urn:x:1").unwrap();
        assert_eq!(step.input(&web).as_deref(), Some("https://example.org/r"));
        assert_eq!(step.input(&urn), None);
    }

    #[test]
    fn apply_sets_url_text() {
        let step = UrlTextStep::new(Duration::from_secs(1));
        let mut r = ClaimReview::new(Claim::new("c").unwrap(), "example.org/r").unwrap();
        step.apply(&mut r, &json!({"text": "body"})).unwrap();
        assert_eq!(r.url_text.as_deref(), Some("body"));
        assert!(step.apply(&mut r, &json!({})).is_err());
    }
}
