//! Enrichment step failures and their cacheable classification.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A failed enrichment call.
///
/// Retryable failures (timeouts, throttling, transport errors, 5xx) are
/// re-attempted within a run; terminal ones are cached and honoured until
/// their TTL expires.
#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum EnrichmentError {
    #[error("{step}: call timed out")]
    #[diagnostic(
        code(kg::enrich::timeout),
        help("Raise `timeout_secs` for this step or check the endpoint's health.")
    )]
    Timeout { step: String },

    #[error("{step}: rate limited by the endpoint")]
    #[diagnostic(
        code(kg::enrich::rate_limited),
        help("Increase `rate_limit_delay_ms` or lower `concurrency` for this step.")
    )]
    RateLimited { step: String },

    #[error("{step}: HTTP {status}: {message}")]
    #[diagnostic(code(kg::enrich::http))]
    Http {
        step: String,
        status: u16,
        message: String,
    },

    #[error("{step}: transport error: {message}")]
    #[diagnostic(
        code(kg::enrich::transport),
        help("The endpoint could not be reached. Check connectivity and the configured URL.")
    )]
    Transport { step: String, message: String },

    #[error("{step}: malformed response: {message}")]
    #[diagnostic(
        code(kg::enrich::malformed_response),
        help("The endpoint answered with content this step cannot interpret.")
    )]
    MalformedResponse { step: String, message: String },

    #[error("{step}: model error: {message}")]
    #[diagnostic(code(kg::enrich::model))]
    Model { step: String, message: String },

    #[error("{step}: invalid input: {message}")]
    #[diagnostic(code(kg::enrich::invalid_input))]
    InvalidInput { step: String, message: String },
}

impl EnrichmentError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::RateLimited { .. } => FailureKind::RateLimited,
            Self::Http { .. } => FailureKind::Http,
            Self::Transport { .. } => FailureKind::Transport,
            Self::MalformedResponse { .. } => FailureKind::MalformedResponse,
            Self::Model { .. } => FailureKind::Model,
            Self::InvalidInput { .. } => FailureKind::InvalidInput,
        }
    }

    fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable(self.status())
    }

    /// Persistable form of this failure.
    pub fn to_record(&self) -> FailureRecord {
        FailureRecord {
            kind: self.kind(),
            status: self.status(),
            message: self.to_string(),
        }
    }
}

/// Failure classification stored alongside a failed cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    RateLimited,
    Http,
    Transport,
    MalformedResponse,
    Model,
    InvalidInput,
}

impl FailureKind {
    /// HTTP failures are retryable for 408 and 5xx only.
    pub fn is_retryable(self, status: Option<u16>) -> bool {
        match self {
            Self::Timeout | Self::RateLimited | Self::Transport => true,
            Self::Http => status.is_some_and(|s| s == 408 || s >= 500),
            Self::MalformedResponse | Self::Model | Self::InvalidInput => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Http => "http",
            Self::Transport => "transport",
            Self::MalformedResponse => "malformed_response",
            Self::Model => "model",
            Self::InvalidInput => "invalid_input",
        }
    }
}

/// A failed attempt as recorded in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub kind: FailureKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub message: String,
}

impl FailureRecord {
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable(self.status)
    }
}

/// Map a `ureq` error onto the enrichment taxonomy.
pub(crate) fn classify_ureq(step: &str, err: ureq::Error) -> EnrichmentError {
    let step = step.to_string();
    match err {
        ureq::Error::Status(429, _) => EnrichmentError::RateLimited { step },
        ureq::Error::Status(status, resp) => {
            let message = resp.status_text().to_string();
            EnrichmentError::Http {
                step,
                status,
                message,
            }
        }
        ureq::Error::Transport(t) => {
            let message = t.to_string();
            if matches!(t.kind(), ureq::ErrorKind::Io) && message.contains("timed out") {
                EnrichmentError::Timeout { step }
            } else {
                EnrichmentError::Transport { step, message }
            }
        }
    }
}
