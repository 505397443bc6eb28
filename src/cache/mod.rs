//! Enrichment cache: memoized step outcomes keyed by `(step, fingerprint)`.
//!
//! Both successes and failures are recorded. A cached failure stops the
//! orchestrator from hammering a broken endpoint until the entry's TTL runs
//! out; the failure's classification decides whether a forced refresh may
//! re-attempt it.
//!
//! Two backends implement [`CacheStore`]:
//!
//! - [`MemCacheStore`]: DashMap, process lifetime only
//! - [`DurableCacheStore`]: redb, survives across runs
//!
//! [`EnrichmentCache`] layers TTL policy on top of either. Downloaded source
//! documents live separately, in the file-backed [`PayloadCache`].

pub mod durable;
pub mod mem;
pub mod payload;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::enrich::error::FailureRecord;
use crate::error::CacheError;

pub use durable::DurableCacheStore;
pub use mem::MemCacheStore;
pub use payload::{PayloadCache, PayloadMeta, PayloadStats};

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Outcome of one enrichment attempt sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CacheOutcome {
    Success { data: serde_json::Value },
    Failure(FailureRecord),
}

/// One cache row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub step: String,
    pub fingerprint: String,
    pub outcome: CacheOutcome,
    /// Seconds since the Unix epoch.
    pub created_at: u64,
}

impl CacheEntry {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CacheOutcome::Success { .. })
    }

    pub fn failure(&self) -> Option<&FailureRecord> {
        match &self.outcome {
            CacheOutcome::Failure(f) => Some(f),
            CacheOutcome::Success { .. } => None,
        }
    }
}

/// Physical storage for cache rows. Implementations must be safe to call
/// from many worker threads at once; writes to one key are last-write-wins.
pub trait CacheStore: Send + Sync {
    fn get(&self, step: &str, fingerprint: &str) -> CacheResult<Option<CacheEntry>>;

    /// Insert or overwrite the row for `(entry.step, entry.fingerprint)`.
    fn put(&self, entry: &CacheEntry) -> CacheResult<()>;

    /// Delete every row of `step`, or every row when `None`. Returns the
    /// number of rows removed.
    fn clear(&self, step: Option<&str>) -> CacheResult<usize>;

    fn entries(&self) -> CacheResult<Vec<CacheEntry>>;
}

/// Per-step row counts, as consumed by external telemetry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepCounts {
    pub total: usize,
    pub success: usize,
    pub failure: usize,
    /// Rows past their TTL that are still physically present.
    pub expired: usize,
    /// Failure counts keyed by failure kind.
    pub failure_kinds: BTreeMap<String, usize>,
}

/// Current seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// TTL-aware handle over a [`CacheStore`].
///
/// Cheap to clone; every clone shares the same store.
#[derive(Clone)]
pub struct EnrichmentCache {
    store: Arc<dyn CacheStore>,
    default_ttl: Option<Duration>,
    step_ttl: HashMap<String, Option<Duration>>,
}

impl EnrichmentCache {
    /// `default_ttl` of `None` means entries never expire.
    pub fn new(store: Arc<dyn CacheStore>, default_ttl: Option<Duration>) -> Self {
        Self {
            store,
            default_ttl,
            step_ttl: HashMap::new(),
        }
    }

    /// In-memory cache with a 24 hour TTL.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemCacheStore::new()),
            Some(Duration::from_secs(24 * 3600)),
        )
    }

    /// Override the TTL for one step.
    pub fn with_step_ttl(mut self, step: impl Into<String>, ttl: Option<Duration>) -> Self {
        self.step_ttl.insert(step.into(), ttl);
        self
    }

    pub fn ttl_for(&self, step: &str) -> Option<Duration> {
        self.step_ttl
            .get(step)
            .copied()
            .unwrap_or(self.default_ttl)
    }

    /// Whether `entry` is past its step's TTL at `now` (Unix seconds).
    pub fn is_expired(&self, entry: &CacheEntry, now: u64) -> bool {
        match self.ttl_for(&entry.step) {
            Some(ttl) => now.saturating_sub(entry.created_at) >= ttl.as_secs(),
            None => false,
        }
    }

    /// Unexpired entry for `(step, fingerprint)`, if any.
    pub fn get(&self, step: &str, fingerprint: &str) -> CacheResult<Option<CacheEntry>> {
        self.get_at(step, fingerprint, unix_now())
    }

    pub fn get_at(
        &self,
        step: &str,
        fingerprint: &str,
        now: u64,
    ) -> CacheResult<Option<CacheEntry>> {
        let entry = self.store.get(step, fingerprint)?;
        Ok(entry.filter(|e| !self.is_expired(e, now)))
    }

    /// Record an outcome, overwriting any previous row for the key.
    pub fn put(
        &self,
        step: &str,
        fingerprint: &str,
        outcome: CacheOutcome,
    ) -> CacheResult<CacheEntry> {
        self.put_at(step, fingerprint, outcome, unix_now())
    }

    pub fn put_at(
        &self,
        step: &str,
        fingerprint: &str,
        outcome: CacheOutcome,
        now: u64,
    ) -> CacheResult<CacheEntry> {
        let entry = CacheEntry {
            step: step.to_string(),
            fingerprint: fingerprint.to_string(),
            outcome,
            created_at: now,
        };
        self.store.put(&entry)?;
        Ok(entry)
    }

    pub fn clear(&self, step: Option<&str>) -> CacheResult<usize> {
        let removed = self.store.clear(step)?;
        tracing::info!(step = step.unwrap_or("*"), removed, "cleared enrichment cache");
        Ok(removed)
    }

    pub fn status(&self) -> CacheResult<BTreeMap<String, StepCounts>> {
        self.status_at(unix_now())
    }

    pub fn status_at(&self, now: u64) -> CacheResult<BTreeMap<String, StepCounts>> {
        let mut out: BTreeMap<String, StepCounts> = BTreeMap::new();
        for entry in self.store.entries()? {
            let expired = self.is_expired(&entry, now);
            let counts = out.entry(entry.step.clone()).or_default();
            counts.total += 1;
            if expired {
                counts.expired += 1;
            }
            match &entry.outcome {
                CacheOutcome::Success { .. } => counts.success += 1,
                CacheOutcome::Failure(f) => {
                    counts.failure += 1;
                    *counts
                        .failure_kinds
                        .entry(f.kind.as_str().to_string())
                        .or_default() += 1;
                }
            }
        }
        Ok(out)
    }
}

impl std::fmt::Debug for EnrichmentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrichmentCache")
            .field("default_ttl", &self.default_ttl)
            .field("step_ttl", &self.step_ttl)
            .finish()
    }
}
