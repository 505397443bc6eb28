//! Source adapters: raw provider payloads to claim reviews.
//!
//! Each adapter turns one document into a [`ParsedBatch`]. A document that
//! cannot be read at all is a [`SourceError`]; a single bad record is
//! reported in [`ParsedBatch::rejected`] with its index and the rest of the
//! document still parses.

pub mod climafacts;
pub mod climate_fever;
pub mod dbkf;
pub mod defacto;
pub mod desmog;
pub mod error;
pub mod euroclimatecheck;
pub mod misinfome;
pub mod provider;
mod turtle;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::model::ClaimReview;

pub use error::SourceError;
pub use provider::Provider;

/// Result type for source operations.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// The input formats the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Misinfome,
    Dbkf,
    Defacto,
    ClimateFever,
    Climafacts,
    Desmog,
    #[serde(rename = "euroclimatecheck")]
    EuroClimateCheck,
}

impl SourceKind {
    pub const ALL: [SourceKind; 7] = [
        Self::Misinfome,
        Self::Dbkf,
        Self::Defacto,
        Self::ClimateFever,
        Self::Climafacts,
        Self::Desmog,
        Self::EuroClimateCheck,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Misinfome => "misinfome",
            Self::Dbkf => "dbkf",
            Self::Defacto => "defacto",
            Self::ClimateFever => "climate-fever",
            Self::Climafacts => "climafacts",
            Self::Desmog => "desmog",
            Self::EuroClimateCheck => "euroclimatecheck",
        }
    }

    /// The adapter registered for this kind.
    pub fn adapter(self) -> Box<dyn SourceAdapter> {
        match self {
            Self::Misinfome => Box::new(misinfome::MisinfomeAdapter),
            Self::Dbkf => Box::new(dbkf::DbkfAdapter),
            Self::Defacto => Box::new(defacto::DefactoAdapter),
            Self::ClimateFever => Box::new(climate_fever::ClimateFeverAdapter),
            Self::Climafacts => Box::new(climafacts::ClimafactsAdapter),
            Self::Desmog => Box::new(desmog::DesmogAdapter),
            Self::EuroClimateCheck => Box::new(euroclimatecheck::EuroClimateCheckAdapter),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| SourceError::UnknownKind {
                kind: s.to_string(),
            })
    }
}

/// Parses one source format.
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Parse a raw document. `source_name` labels errors and logs.
    fn parse(&self, source_name: &str, raw: &[u8]) -> SourceResult<ParsedBatch>;
}

/// Output of one adapter run.
#[derive(Debug, Default)]
pub struct ParsedBatch {
    pub reviews: Vec<ClaimReview>,
    /// Record-level errors, in document order.
    pub rejected: Vec<SourceError>,
}

impl ParsedBatch {
    /// Total records seen.
    pub fn records(&self) -> usize {
        self.reviews.len() + self.rejected.len()
    }
}

/// Why a single record could not be mapped.
#[derive(Debug)]
pub(crate) enum RecordFault {
    Shape(String),
    Invalid(ValidationError),
}

impl From<ValidationError> for RecordFault {
    fn from(e: ValidationError) -> Self {
        Self::Invalid(e)
    }
}

impl From<serde_json::Error> for RecordFault {
    fn from(e: serde_json::Error) -> Self {
        Self::Shape(e.to_string())
    }
}

/// Accumulates mapped records and per-record errors for one document.
pub(crate) struct BatchBuilder<'a> {
    source_name: &'a str,
    batch: ParsedBatch,
}

impl<'a> BatchBuilder<'a> {
    pub(crate) fn new(source_name: &'a str) -> Self {
        Self {
            source_name,
            batch: ParsedBatch::default(),
        }
    }

    pub(crate) fn push(&mut self, index: usize, result: Result<ClaimReview, RecordFault>) {
        match result {
            Ok(review) => self.batch.reviews.push(review),
            Err(fault) => {
                let err = match fault {
                    RecordFault::Shape(message) => SourceError::MalformedRecord {
                        source_name: self.source_name.to_string(),
                        index,
                        message,
                    },
                    RecordFault::Invalid(source) => SourceError::InvalidRecord {
                        source_name: self.source_name.to_string(),
                        index,
                        source,
                    },
                };
                tracing::warn!(source = self.source_name, index, error = %err, "rejected record");
                self.batch.rejected.push(err);
            }
        }
    }

    pub(crate) fn finish(self) -> ParsedBatch {
        tracing::debug!(
            source = self.source_name,
            reviews = self.batch.reviews.len(),
            rejected = self.batch.rejected.len(),
            "parsed source document"
        );
        self.batch
    }
}

/// Decode a JSON array document.
pub(crate) fn json_array(
    source_name: &str,
    kind: SourceKind,
    raw: &[u8],
) -> SourceResult<Vec<Value>> {
    let malformed = |message: String| SourceError::MalformedDocument {
        source_name: source_name.to_string(),
        kind: kind.to_string(),
        message,
    };
    match serde_json::from_slice::<Value>(raw).map_err(|e| malformed(e.to_string()))? {
        Value::Array(items) => Ok(items),
        other => Err(malformed(format!(
            "expected a JSON array, found {}",
            json_type(&other)
        ))),
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A string that may arrive as a list, a scalar or null.
pub(crate) fn first_string(v: &Value) -> Option<String> {
    let s = match v {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(first_string),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    s.filter(|s| !s.trim().is_empty())
}

/// `scheme://host[:port]` of an article URL.
pub(crate) fn site_root(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed.host_str()?;
    Some(parsed.origin().ascii_serialization())
}
