//! Cache-aware, rate-limited execution of enrichment steps.
//!
//! Per step:
//!
//! 1. Every review's input is fingerprinted; reviews sharing a fingerprint
//!    share one resolution, so duplicate inputs within a run never cost
//!    more than one external call.
//! 2. Unique fingerprints are resolved on a rayon pool sized by the step's
//!    `concurrency`: cache hit, or up to `1 + max_retries` gated attempts
//!    followed by exactly one cache write.
//! 3. Outcomes are applied to the reviews sequentially.
//!
//! Enrichment failures are recorded and counted, never propagated. Only a
//! [`CacheError`] aborts, since continuing without memoization would
//! re-bill every external call on the next run.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::Serialize;

use super::rate::RateGate;
use super::{EnrichmentStep, RefreshPolicy, StepSettings};
use crate::cache::{CacheOutcome, EnrichmentCache};
use crate::error::CacheError;
use crate::hash::fingerprint;
use crate::model::ClaimReview;

/// A step together with its run settings.
pub struct ConfiguredStep {
    pub step: Box<dyn EnrichmentStep>,
    pub settings: StepSettings,
}

impl ConfiguredStep {
    pub fn new(step: Box<dyn EnrichmentStep>, settings: StepSettings) -> Self {
        Self { step, settings }
    }
}

/// Counts for one step over one batch of reviews.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: String,
    /// Reviews the step had an input for.
    pub eligible: usize,
    /// Distinct fingerprints among eligible reviews.
    pub unique_inputs: usize,
    /// Fingerprints answered from the cache.
    pub cache_hits: usize,
    /// External invocations, retries included.
    pub calls: usize,
    /// Reviews that received data.
    pub succeeded: usize,
    /// Reviews left without data because of a failure.
    pub failed: usize,
    /// Failed fingerprints by failure kind.
    pub failure_kinds: BTreeMap<String, usize>,
}

impl StepReport {
    fn merge(&mut self, other: &StepReport) {
        self.eligible += other.eligible;
        self.unique_inputs += other.unique_inputs;
        self.cache_hits += other.cache_hits;
        self.calls += other.calls;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        for (k, v) in &other.failure_kinds {
            *self.failure_kinds.entry(k.clone()).or_default() += v;
        }
    }
}

/// Merge per-source reports into one report per step, in step order.
pub fn merge_reports<'a>(reports: impl IntoIterator<Item = &'a StepReport>) -> Vec<StepReport> {
    let mut out: Vec<StepReport> = Vec::new();
    for r in reports {
        match out.iter_mut().find(|o| o.step == r.step) {
            Some(existing) => existing.merge(r),
            None => out.push(r.clone()),
        }
    }
    out
}

struct Job {
    fingerprint: String,
    input: String,
    reviews: Vec<usize>,
}

struct Resolution {
    outcome: CacheOutcome,
    from_cache: bool,
}

/// Runs configured steps over batches of claim reviews.
pub struct Orchestrator {
    cache: EnrichmentCache,
    steps: Vec<(ConfiguredStep, RateGate)>,
    refresh: RefreshPolicy,
}

impl Orchestrator {
    pub fn new(cache: EnrichmentCache, steps: Vec<ConfiguredStep>) -> Self {
        let steps = steps
            .into_iter()
            .map(|s| {
                let gate = RateGate::new(s.settings.rate_limit_delay);
                (s, gate)
            })
            .collect();
        Self {
            cache,
            steps,
            refresh: RefreshPolicy::default(),
        }
    }

    pub fn with_refresh(mut self, refresh: RefreshPolicy) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn cache(&self) -> &EnrichmentCache {
        &self.cache
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|(s, _)| s.step.name()).collect()
    }

    /// Apply every step, in declared order, to `reviews`.
    pub fn enrich(&self, reviews: &mut [ClaimReview]) -> Result<Vec<StepReport>, CacheError> {
        let mut reports = Vec::with_capacity(self.steps.len());
        for (configured, gate) in &self.steps {
            let report = self.run_step(configured, gate, reviews)?;
            tracing::info!(
                step = %report.step,
                eligible = report.eligible,
                cache_hits = report.cache_hits,
                calls = report.calls,
                succeeded = report.succeeded,
                failed = report.failed,
                "enrichment step finished"
            );
            reports.push(report);
        }
        Ok(reports)
    }

    fn run_step(
        &self,
        configured: &ConfiguredStep,
        gate: &RateGate,
        reviews: &mut [ClaimReview],
    ) -> Result<StepReport, CacheError> {
        let step = configured.step.as_ref();
        let mut report = StepReport {
            step: step.name().to_string(),
            ..StepReport::default()
        };

        let mut jobs: Vec<Job> = Vec::new();
        let mut by_fingerprint: HashMap<String, usize> = HashMap::new();
        for (idx, review) in reviews.iter().enumerate() {
            let Some(input) = step.input(review) else {
                continue;
            };
            report.eligible += 1;
            let fp = fingerprint(step.name(), &input);
            match by_fingerprint.get(&fp) {
                Some(&j) => jobs[j].reviews.push(idx),
                None => {
                    by_fingerprint.insert(fp.clone(), jobs.len());
                    jobs.push(Job {
                        fingerprint: fp,
                        input,
                        reviews: vec![idx],
                    });
                }
            }
        }
        report.unique_inputs = jobs.len();
        if jobs.is_empty() {
            return Ok(report);
        }

        let calls = AtomicUsize::new(0);
        let resolve_all = || {
            jobs.par_iter()
                .map(|job| self.resolve(configured, gate, job, &calls))
                .collect::<Result<Vec<_>, CacheError>>()
        };
        let resolutions = match rayon::ThreadPoolBuilder::new()
            .num_threads(configured.settings.concurrency.max(1))
            .thread_name({
                let name = step.name().to_string();
                move |i| format!("{name}-{i}")
            })
            .build()
        {
            Ok(pool) => pool.install(resolve_all)?,
            Err(e) => {
                tracing::warn!(step = step.name(), error = %e, "falling back to the global pool");
                resolve_all()?
            }
        };
        report.calls = calls.load(Ordering::Relaxed);

        for (job, resolution) in jobs.iter().zip(resolutions) {
            if resolution.from_cache {
                report.cache_hits += 1;
            }
            match &resolution.outcome {
                CacheOutcome::Success { data } => {
                    for &idx in &job.reviews {
                        match step.apply(&mut reviews[idx], data) {
                            Ok(()) => report.succeeded += 1,
                            Err(e) => {
                                tracing::warn!(
                                    step = step.name(),
                                    fingerprint = %job.fingerprint,
                                    error = %e,
                                    "could not apply enrichment result"
                                );
                                report.failed += 1;
                                *report
                                    .failure_kinds
                                    .entry(e.kind().as_str().to_string())
                                    .or_default() += 1;
                            }
                        }
                    }
                }
                CacheOutcome::Failure(failure) => {
                    report.failed += job.reviews.len();
                    *report
                        .failure_kinds
                        .entry(failure.kind.as_str().to_string())
                        .or_default() += 1;
                }
            }
        }
        Ok(report)
    }

    /// Cache lookup, then gated attempts on a miss. Writes the cache at
    /// most once.
    fn resolve(
        &self,
        configured: &ConfiguredStep,
        gate: &RateGate,
        job: &Job,
        calls: &AtomicUsize,
    ) -> Result<Resolution, CacheError> {
        let step = configured.step.as_ref();
        let name = step.name();

        if let Some(entry) = self.cache.get(name, &job.fingerprint)? {
            let reuse = match self.refresh {
                RefreshPolicy::UseCache => true,
                RefreshPolicy::Force => entry.failure().is_some_and(|f| !f.is_retryable()),
            };
            if reuse {
                tracing::debug!(step = name, fingerprint = %job.fingerprint, "cache hit");
                return Ok(Resolution {
                    outcome: entry.outcome,
                    from_cache: true,
                });
            }
        }
        tracing::debug!(step = name, fingerprint = %job.fingerprint, "cache miss");

        let max_attempts = configured.settings.max_retries.saturating_add(1);
        let mut attempt = 0;
        let outcome = loop {
            attempt += 1;
            gate.wait();
            calls.fetch_add(1, Ordering::Relaxed);
            match step.invoke(&job.input) {
                Ok(data) => break CacheOutcome::Success { data },
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    tracing::debug!(
                        step = name,
                        attempt,
                        error = %e,
                        "retryable enrichment failure"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        step = name,
                        fingerprint = %job.fingerprint,
                        attempts = attempt,
                        error = %e,
                        "enrichment failed"
                    );
                    break CacheOutcome::Failure(e.to_record());
                }
            }
        };

        let entry = self.cache.put(name, &job.fingerprint, outcome)?;
        Ok(Resolution {
            outcome: entry.outcome,
            from_cache: false,
        })
    }
}
