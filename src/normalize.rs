//! Text and URL canonicalization.
//!
//! These functions are part of the identifier format: every entity URI is a
//! digest over their output. Changing any rule here changes every URI ever
//! generated, so rule changes must bump [`NORMALIZATION_VERSION`] and be
//! treated as a data migration.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use url::Url;

/// Version of the normalization rule set. Recorded in the output graph
/// metadata so consumers can tell identifier generations apart.
pub const NORMALIZATION_VERSION: u32 = 1;

static URL_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)http\S+").expect("static regex must compile"));

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|amp|lt|gt|quot|apos|nbsp);")
        .expect("static regex must compile")
});

/// Upper bound on normalization passes. Ordinary text is stable after
/// one pass; nested entity encodings need one pass per level.
const MAX_PASSES: usize = 8;

/// Apply `pass` until the output stops changing.
fn until_stable(text: &str, pass: impl Fn(&str) -> String) -> String {
    let mut current = pass(text);
    for _ in 1..MAX_PASSES {
        let next = pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Canonical display form of free text.
///
/// Rules: HTML entity decoding, Unicode NFC, removal of non-breaking
/// spaces, removal of `http…` tokens (any case), removal of control
/// characters, whitespace collapsing and trimming. Case is preserved. The
/// rules are repeated until the text stops changing, so double-encoded
/// entities decode fully and the function is idempotent.
pub fn normalize_text(text: &str) -> String {
    until_stable(text, normalize_pass)
}

fn normalize_pass(text: &str) -> String {
    let decoded = decode_entities(text);
    let composed: String = decoded.nfc().collect();
    let without_nbsp = composed.replace('\u{a0}', "");
    let without_urls = URL_TOKEN.replace_all(&without_nbsp, "");
    let printable: String = without_urls
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    collapse_whitespace(&printable)
}

/// Identity form of free text: [`normalize_text`] with case folding.
///
/// Identifiers hash this form, so "Sea levels are RISING" and
/// "sea levels are rising" resolve to the same claim.
pub fn identity_text(text: &str) -> String {
    until_stable(text, |t| normalize_pass(t).to_lowercase())
}

/// Collapse every whitespace run into a single space and trim both ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Identity form of a review URL: lower-cased `host[:port]/path/`.
///
/// Query and fragment are dropped so tracking-parameter variants collapse
/// onto one review. A trailing slash is always present. `urn:` identifiers
/// have no host and are returned lower-cased as-is. Returns `None` when
/// the input has no usable host.
pub fn normalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim().to_lowercase();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with("urn:") {
        return Some(trimmed);
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed
    } else {
        format!("https://{trimmed}")
    };
    let parsed = Url::parse(&with_scheme).ok()?;
    let host = parsed.host_str()?;

    let mut out = String::with_capacity(with_scheme.len());
    out.push_str(host);
    if let Some(port) = parsed.port() {
        out.push(':');
        out.push_str(&port.to_string());
    }
    out.push_str(parsed.path());
    if !out.ends_with('/') {
        out.push('/');
    }
    Some(out)
}

/// Make a URL safe to emit as an IRI.
///
/// Adds `https://` when no scheme is present, rejects non-HTTP schemes and
/// host-less inputs, and percent-encodes whatever the WHATWG parser
/// considers invalid.
pub fn sanitize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else if trimmed.contains("://") {
        return None;
    } else {
        format!("https://{trimmed}")
    };
    match Url::parse(&candidate) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {
            Some(url.into())
        }
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(url = raw, error = %e, "discarding unparseable URL");
            None
        }
    }
}

/// URI path segment for a closed-vocabulary label: trimmed, lower-cased,
/// spaces replaced by underscores.
pub fn slugify(label: &str) -> String {
    collapse_whitespace(label).to_lowercase().replace(' ', "_")
}

/// Parse a publication date into `YYYY-MM-DD`.
///
/// Accepts plain dates, RFC 3339 timestamps, and `YYYY-MM-DDTHH:MM:SS`
/// timestamps without offset.
pub fn parse_date(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ts.date_naive().format("%Y-%m-%d").to_string());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = chrono::NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(ts.date().format("%Y-%m-%d").to_string());
        }
    }
    None
}

pub(crate) fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    ENTITY
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let body = &caps[1];
            let decoded = match body {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => {
                    let code = if let Some(hex) = body
                        .strip_prefix("#x")
                        .or_else(|| body.strip_prefix("#X"))
                    {
                        u32::from_str_radix(hex, 16).ok()
                    } else {
                        body[1..].parse::<u32>().ok()
                    };
                    code.and_then(char::from_u32)
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), |c| c.to_string())
        })
        .into_owned()
}
