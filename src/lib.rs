// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # climatesense-kg
//!
//! Builds a knowledge graph of climate-related fact-checks from several
//! heterogeneous sources.
//!
//! ## Architecture
//!
//! - **Model** (`model`, `normalize`, `hash`): claims, reviews, ratings,
//!   organizations and persons with content-derived, deterministic identifiers
//! - **Sources** (`source`): adapters mapping each source's records onto the model
//! - **Enrichment** (`enrich`, `cache`): external steps memoized in a TTL cache
//!   backed by redb; downloaded source documents kept on disk
//! - **RDF** (`rdf`): one named graph per source, serialized with oxigraph
//! - **Deployment** (`deploy`): triple-set diff against the last deployed
//!   snapshot, then a Graph Store load
//! - **Pipeline** (`pipeline`, `config`, `paths`): the end-to-end run
//!
//! ## Library usage
//!
//! ```no_run
//! use climatesense_kg::model::{Claim, ClaimReview, Entity};
//!
//! let review = ClaimReview::new(
//!     Claim::new("Global warming stopped in 1998").unwrap(),
//!     "https://www.example.org/fact-check/1998",
//! )
//! .unwrap()
//! .with_date("2019-05-02")
//! .unwrap();
//! println!("{}", Entity::ClaimReview(&review).uri("http://data.climatesense-project.eu"));
//! ```

pub mod cache;
pub mod config;
pub mod deploy;
pub mod enrich;
pub mod error;
pub mod hash;
pub mod model;
pub mod normalize;
pub mod paths;
pub mod pipeline;
pub mod rdf;
pub mod source;
