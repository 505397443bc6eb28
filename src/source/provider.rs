//! Where a source document comes from.

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use super::{SourceError, SourceResult};

/// Default HTTP timeout for remote documents.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Upper bound on a downloaded document.
const MAX_DOCUMENT_BYTES: u64 = 512 * 1024 * 1024;

/// A local file or an HTTP(S) URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    File(PathBuf),
    Http { url: String, timeout: Duration },
}

impl Provider {
    /// `http://` and `https://` locations are fetched, anything else is a path.
    pub fn from_location(location: &str) -> Self {
        let trimmed = location.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Self::Http {
                url: trimmed.to_string(),
                timeout: DEFAULT_FETCH_TIMEOUT,
            }
        } else {
            Self::File(PathBuf::from(trimmed))
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Http { .. })
    }

    pub fn location(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Http { url, .. } => url.clone(),
        }
    }

    /// Read the whole document.
    pub fn fetch(&self) -> SourceResult<Vec<u8>> {
        match self {
            Self::File(path) => std::fs::read(path).map_err(|source| SourceError::Read {
                path: path.display().to_string(),
                source,
            }),
            Self::Http { url, timeout } => {
                let fetch_err = |message: String| SourceError::Fetch {
                    location: url.clone(),
                    message,
                };
                let agent = ureq::AgentBuilder::new()
                    .timeout(*timeout)
                    .user_agent(&crate::enrich::user_agent())
                    .build();
                let response = agent.get(url).call().map_err(|e| match e {
                    ureq::Error::Status(code, resp) => {
                        fetch_err(format!("HTTP {code}: {}", resp.status_text()))
                    }
                    ureq::Error::Transport(t) => fetch_err(t.to_string()),
                })?;
                let mut body = Vec::new();
                response
                    .into_reader()
                    .take(MAX_DOCUMENT_BYTES)
                    .read_to_end(&mut body)
                    .map_err(|e| fetch_err(e.to_string()))?;
                tracing::debug!(url = %url, bytes = body.len(), "fetched source document");
                Ok(body)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locations_pick_the_provider() {
        assert!(matches!(
            Provider::from_location("https://example.org/data.json"),
            Provider::Http { .. }
        ));
        assert_eq!(
            Provider::from_location("data/misinfome.json"),
            Provider::File(PathBuf::from("data/misinfome.json"))
        );
    }

    #[test]
    fn reads_files_and_reports_missing_ones() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, b"[]").unwrap();
        assert_eq!(Provider::File(path).fetch().unwrap(), b"[]");

        let missing = Provider::File(dir.path().join("nope.json"));
        assert!(matches!(missing.fetch(), Err(SourceError::Read { .. })));
    }
}
