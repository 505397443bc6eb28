//! Rich diagnostic error types for the knowledge graph pipeline.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. The severity of each family differs:
//! validation and enrichment errors are isolated to one entity, serialization
//! errors to one source graph, while cache and configuration errors abort the run.

use miette::Diagnostic;
use thiserror::Error;

pub use crate::enrich::error::EnrichmentError;
pub use crate::source::error::SourceError;

/// Top-level error type for the pipeline.
#[derive(Debug, Error, Diagnostic)]
pub enum KgError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Enrichment(#[from] EnrichmentError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Serialization(#[from] SerializationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Paths(#[from] crate::paths::PathError),
}

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ValidationError {
    #[error("{entity} is missing its identity field `{field}`")]
    #[diagnostic(
        code(kg::validation::missing_identity),
        help(
            "Identifiers are derived from this field. An empty value would hash to \
             the same URI as every other empty record, so the record is skipped."
        )
    )]
    MissingIdentity {
        entity: &'static str,
        field: &'static str,
    },

    #[error("invalid date \"{value}\" on {entity}")]
    #[diagnostic(
        code(kg::validation::invalid_date),
        help("Dates must be parseable as YYYY-MM-DD or an RFC 3339 timestamp.")
    )]
    InvalidDate { entity: &'static str, value: String },

    #[error("invalid review URL \"{value}\"")]
    #[diagnostic(
        code(kg::validation::invalid_url),
        help("Review URLs need a host, e.g. `https://example.org/review/1`, or a `urn:` identifier.")
    )]
    InvalidUrl { value: String },
}

// ---------------------------------------------------------------------------
// Cache errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum CacheError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(kg::cache::io),
        help(
            "A filesystem operation failed. Check that the cache directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("enrichment cache unavailable at {path}: {message}")]
    #[diagnostic(
        code(kg::cache::unavailable),
        help(
            "The run cannot continue without memoized enrichment results. \
             Check that no other process holds the cache database open."
        )
    )]
    Unavailable { path: String, message: String },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(kg::cache::redb),
        help(
            "The embedded database encountered a transaction error. \
             If the problem persists, clear the cache with `climatesense-kg cache clear`."
        )
    )]
    Redb { message: String },

    #[error("corrupt cache entry for {step}/{fingerprint}: {message}")]
    #[diagnostic(
        code(kg::cache::corrupt),
        help("Delete the step's entries with `climatesense-kg cache clear --step {step}`.")
    )]
    Corrupt {
        step: String,
        fingerprint: String,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Serialization errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SerializationError {
    #[error("invalid IRI \"{iri}\": {message}")]
    #[diagnostic(
        code(kg::rdf::invalid_iri),
        help("Check the configured base URI and the source data for characters not allowed in IRIs.")
    )]
    InvalidIri { iri: String, message: String },

    #[error("unsupported RDF format \"{format}\"")]
    #[diagnostic(
        code(kg::rdf::unsupported_format),
        help("Supported formats are: nt, nq, ttl, trig.")
    )]
    UnsupportedFormat { format: String },

    #[error("failed to serialize graph for source \"{source_name}\": {message}")]
    #[diagnostic(code(kg::rdf::serialize))]
    Serialize {
        source_name: String,
        message: String,
    },

    #[error("failed to write {path}: {source}")]
    #[diagnostic(
        code(kg::rdf::write),
        help("Check that the output directory is writable.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Deployment errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum DeployError {
    #[error("failed to read graph {path}: {message}")]
    #[diagnostic(
        code(kg::deploy::read_graph),
        help("The previously deployed snapshot is unreadable. Remove it to force a full redeploy.")
    )]
    ReadGraph { path: String, message: String },

    #[error("graph store rejected {graph}: {message}")]
    #[diagnostic(
        code(kg::deploy::load),
        help("Check that the graph store endpoint is reachable and accepts SPARQL Graph Store PUT requests.")
    )]
    Load { graph: String, message: String },

    #[error("failed to record deployed snapshot at {path}: {source}")]
    #[diagnostic(code(kg::deploy::snapshot))]
    Snapshot {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias for functions returning pipeline results.
pub type KgResult<T> = std::result::Result<T, KgError>;
