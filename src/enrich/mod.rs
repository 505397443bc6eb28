//! Enrichment steps and the orchestrator that drives them.
//!
//! A step is an external capability (page text extraction, entity linking,
//! knowledge-base properties, factor classification) applied to each claim
//! review. The
//! [`Orchestrator`] runs steps in declared order, memoizing every outcome in
//! the [`EnrichmentCache`](crate::cache::EnrichmentCache) so repeated runs
//! only pay for inputs they have not seen within the TTL window.

pub mod dbpedia_property;
pub mod entity_linking;
pub mod error;
pub mod factors;
pub mod orchestrator;
pub mod rate;
pub mod url_text;

use std::time::Duration;

use serde_json::Value;

use crate::model::ClaimReview;

pub use dbpedia_property::DbpediaPropertyStep;
pub use entity_linking::EntityLinkingStep;
pub use error::{EnrichmentError, FailureKind, FailureRecord};
pub use factors::FactorStep;
pub use orchestrator::{ConfiguredStep, Orchestrator, StepReport};
pub use rate::RateGate;
pub use url_text::UrlTextStep;

/// An external enrichment capability.
///
/// Steps are stateless with respect to the entities they enrich: the same
/// input always maps to the same cache line. A step may read what earlier
/// steps applied (property lookup reads linked entities), so its input is
/// taken only once those steps have finished.
pub trait EnrichmentStep: Send + Sync {
    /// Stable step name, `enricher.<name>`. Part of every fingerprint, so
    /// renaming a step orphans its cache rows.
    fn name(&self) -> &str;

    /// The input this step consumes from `review`, or `None` when the
    /// review is not eligible.
    fn input(&self, review: &ClaimReview) -> Option<String>;

    /// Perform the external call.
    fn invoke(&self, input: &str) -> Result<Value, EnrichmentError>;

    /// Merge a successful result into `review`.
    fn apply(&self, review: &mut ClaimReview, data: &Value) -> Result<(), EnrichmentError>;
}

/// Per-step run settings.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSettings {
    /// Minimum delay between consecutive external calls.
    pub rate_limit_delay: Duration,
    /// Retries after the first attempt for retryable failures.
    pub max_retries: u32,
    /// Worker threads for this step.
    pub concurrency: usize,
}

impl Default for StepSettings {
    fn default() -> Self {
        Self {
            rate_limit_delay: Duration::from_millis(100),
            max_retries: 2,
            concurrency: 4,
        }
    }
}

/// Whether cached outcomes may be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Reuse every unexpired cache entry.
    #[default]
    UseCache,
    /// Re-attempt cached successes and retryable failures. Cached terminal
    /// failures are still honoured until they expire.
    Force,
}

pub(crate) fn user_agent() -> String {
    format!("climatesense-kg/{}", env!("CARGO_PKG_VERSION"))
}
