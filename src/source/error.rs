//! Source adapter and provider errors.

use miette::Diagnostic;
use thiserror::Error;

use crate::error::ValidationError;

#[derive(Debug, Error, Diagnostic)]
pub enum SourceError {
    #[error("source \"{source_name}\" ({kind}) is not a parseable document: {message}")]
    #[diagnostic(
        code(kg::source::malformed_document),
        help("Check that the provider returns the format the source's `kind` expects.")
    )]
    MalformedDocument {
        source_name: String,
        kind: String,
        message: String,
    },

    #[error("source \"{source_name}\" record {index}: {message}")]
    #[diagnostic(code(kg::source::malformed_record))]
    MalformedRecord {
        source_name: String,
        index: usize,
        message: String,
    },

    #[error("source \"{source_name}\" record {index}: {source}")]
    #[diagnostic(code(kg::source::invalid_record))]
    InvalidRecord {
        source_name: String,
        index: usize,
        #[source]
        source: ValidationError,
    },

    #[error("unknown source kind \"{kind}\"")]
    #[diagnostic(
        code(kg::source::unknown_kind),
        help(
            "Known kinds: misinfome, dbkf, defacto, climate-fever, climafacts, desmog, \
             euroclimatecheck."
        )
    )]
    UnknownKind { kind: String },

    #[error("failed to fetch {location}: {message}")]
    #[diagnostic(
        code(kg::source::fetch),
        help("Check the provider URL and network connectivity.")
    )]
    Fetch { location: String, message: String },

    #[error("no cached copy of {location} for an offline run")]
    #[diagnostic(
        code(kg::source::offline),
        help("Run once with network access so the document is cached, or drop --offline.")
    )]
    Offline { location: String },

    #[error("failed to read {path}: {source}")]
    #[diagnostic(code(kg::source::read))]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl SourceError {
    /// Record index for record-level errors.
    pub fn record_index(&self) -> Option<usize> {
        match self {
            Self::MalformedRecord { index, .. } | Self::InvalidRecord { index, .. } => Some(*index),
            _ => None,
        }
    }
}
