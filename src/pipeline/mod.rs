//! End-to-end run: fetch, parse, enrich, generate, write, diff, deploy.
//!
//! Sources are processed one after another and isolated from each other:
//! a source that cannot be fetched, parsed or serialized is reported as
//! failed and the run moves on. Only run-level failures (cache
//! unavailable, invalid configuration) abort the run.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::cache::PayloadCache;
use crate::config::PipelineConfig;
use crate::deploy::{DeployDecision, Deployer, GraphLoader, GraphStoreLoader, SnapshotStore};
use crate::enrich::orchestrator::merge_reports;
use crate::enrich::{Orchestrator, RefreshPolicy, StepReport};
use crate::error::{KgResult, SerializationError};
use crate::paths::KgPaths;
use crate::rdf::{OutputFormat, RdfGenerator};
use crate::source::{Provider, SourceError, SourceKind, SourceResult};

/// Per-invocation switches.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Deploy even when a graph is unchanged.
    pub force_deploy: bool,
    pub refresh: RefreshPolicy,
    /// Restrict the run to one source name.
    pub source: Option<String>,
    /// Serve remote sources from the payload cache only, expired or not.
    pub offline: bool,
}

/// A source to process.
#[derive(Debug, Clone)]
pub struct SourceSpec {
    pub name: String,
    pub kind: SourceKind,
    pub provider: Provider,
}

/// How one source ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    /// Every record mapped.
    Complete,
    /// Some records were rejected.
    Partial { failed: usize },
    /// Nothing usable came out of the source.
    Failed { reason: String },
    /// The generated graph equals the last deployed one. `failed` counts
    /// records rejected on this run, as for `Partial`.
    Unchanged { failed: usize },
}

/// Per-source section of a [`RunSummary`].
#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub name: String,
    pub kind: SourceKind,
    pub records: usize,
    pub reviews: usize,
    pub rejected: usize,
    pub triples: usize,
    pub file: Option<PathBuf>,
    pub deployment: Option<DeployDecision>,
    pub deploy_error: Option<String>,
    pub steps: Vec<StepReport>,
    pub outcome: SourceOutcome,
}

impl SourceSummary {
    fn failed(spec: &SourceSpec, reason: String) -> Self {
        Self {
            name: spec.name.clone(),
            kind: spec.kind,
            records: 0,
            reviews: 0,
            rejected: 0,
            triples: 0,
            file: None,
            deployment: None,
            deploy_error: None,
            steps: Vec::new(),
            outcome: SourceOutcome::Failed { reason },
        }
    }
}

/// End-of-run report.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub sources: Vec<SourceSummary>,
    /// Step counts across all sources.
    pub steps: Vec<StepReport>,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

mod duration_ms {
    use std::time::Duration;

    pub fn serialize<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

impl RunSummary {
    pub fn triples(&self) -> usize {
        self.sources.iter().map(|s| s.triples).sum()
    }

    pub fn files_written(&self) -> Vec<&PathBuf> {
        self.sources.iter().filter_map(|s| s.file.as_ref()).collect()
    }

    pub fn failed_sources(&self) -> Vec<&SourceSummary> {
        self.sources
            .iter()
            .filter(|s| matches!(s.outcome, SourceOutcome::Failed { .. }))
            .collect()
    }

    /// True when no source failed outright.
    pub fn is_success(&self) -> bool {
        self.failed_sources().is_empty()
    }

    /// Emit the summary through `tracing`.
    pub fn log(&self) {
        for step in &self.steps {
            tracing::info!(
                step = %step.step,
                eligible = step.eligible,
                cache_hits = step.cache_hits,
                calls = step.calls,
                succeeded = step.succeeded,
                failed = step.failed,
                "step summary"
            );
        }
        for s in &self.sources {
            match &s.outcome {
                SourceOutcome::Failed { reason } => {
                    tracing::error!(source = %s.name, reason = %reason, "source failed")
                }
                outcome => tracing::info!(
                    source = %s.name,
                    reviews = s.reviews,
                    rejected = s.rejected,
                    triples = s.triples,
                    outcome = ?outcome,
                    deployment = ?s.deployment,
                    "source summary"
                ),
            }
        }
        tracing::info!(
            sources = self.sources.len(),
            failed = self.failed_sources().len(),
            triples = self.triples(),
            files = self.files_written().len(),
            elapsed_ms = self.elapsed.as_millis() as u64,
            "run finished"
        );
    }
}

/// Everything a run needs, assembled up front.
pub struct Pipeline {
    sources: Vec<SourceSpec>,
    orchestrator: Orchestrator,
    generator: RdfGenerator,
    format: OutputFormat,
    output_dir: PathBuf,
    deployer: Deployer,
    force_deploy: bool,
    payloads: Option<PayloadCache>,
    offline: bool,
}

impl Pipeline {
    pub fn new(
        orchestrator: Orchestrator,
        generator: RdfGenerator,
        format: OutputFormat,
        output_dir: PathBuf,
        deployer: Deployer,
    ) -> Self {
        Self {
            sources: Vec::new(),
            orchestrator,
            generator,
            format,
            output_dir,
            deployer,
            force_deploy: false,
            payloads: None,
            offline: false,
        }
    }

    pub fn with_source(mut self, name: &str, kind: SourceKind, provider: Provider) -> Self {
        self.sources.push(SourceSpec {
            name: name.to_string(),
            kind,
            provider,
        });
        self
    }

    pub fn with_force_deploy(mut self, force: bool) -> Self {
        self.force_deploy = force;
        self
    }

    /// Keep downloaded documents of remote sources in `cache`.
    pub fn with_payload_cache(mut self, cache: PayloadCache) -> Self {
        self.payloads = Some(cache);
        self
    }

    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Assemble a pipeline from validated configuration. Opens the durable
    /// cache, so an unreachable cache fails here.
    pub fn from_config(
        config: &PipelineConfig,
        paths: &KgPaths,
        options: &RunOptions,
    ) -> KgResult<Self> {
        config.validate()?;
        let selected = config.selected_sources(options.source.as_deref());
        if let Some(name) = options.source.as_deref() {
            if selected.is_empty() {
                return Err(crate::config::ConfigError::Invalid {
                    field: "--source".into(),
                    message: format!("no enabled source named \"{name}\""),
                }
                .into());
            }
        }

        let cache = config.open_cache(paths)?;
        let orchestrator =
            Orchestrator::new(cache, config.build_steps()).with_refresh(options.refresh);
        let generator = RdfGenerator::new(config.namespaces(), &config.deployment.graph_template);

        let loader: Option<Box<dyn GraphLoader>> = match (
            config.deployment.enabled,
            config.deployment.graph_store_url.as_deref(),
        ) {
            (true, Some(url)) => {
                let mut loader =
                    GraphStoreLoader::new(url, Duration::from_secs(config.deployment.timeout_secs));
                if let (Some(user), Some(password)) =
                    (&config.deployment.user, &config.deployment.password)
                {
                    loader = loader.with_credentials(user, password);
                }
                Some(Box::new(loader))
            }
            _ => None,
        };
        let deployer = Deployer::new(loader, SnapshotStore::new(&config.state_dir(paths)));

        let pipeline = selected.into_iter().fold(
            Self::new(
                orchestrator,
                generator,
                config.output_format()?,
                config.output_dir(paths),
                deployer,
            ),
            |p, s| p.with_source(&s.name, s.kind, s.provider()),
        );
        Ok(pipeline
            .with_force_deploy(options.force_deploy)
            .with_payload_cache(config.payload_cache(paths))
            .with_offline(options.offline))
    }

    pub fn sources(&self) -> &[SourceSpec] {
        &self.sources
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Process every source. Only a cache failure aborts.
    pub fn run(&self) -> KgResult<RunSummary> {
        let started = Instant::now();
        tracing::info!(
            sources = self.sources.len(),
            steps = ?self.orchestrator.step_names(),
            "starting run"
        );
        let mut sources = Vec::with_capacity(self.sources.len());
        for spec in &self.sources {
            sources.push(self.run_source(spec)?);
        }
        let steps = merge_reports(sources.iter().flat_map(|s| s.steps.iter()));
        Ok(RunSummary {
            sources,
            steps,
            elapsed: started.elapsed(),
        })
    }

    /// Local files are always read afresh. Remote documents come from the
    /// payload cache while fresh, or whenever the run is offline.
    fn fetch(&self, spec: &SourceSpec) -> SourceResult<Vec<u8>> {
        if !spec.provider.is_remote() {
            return spec.provider.fetch();
        }
        let location = spec.provider.location();
        if let Some(body) = self
            .payloads
            .as_ref()
            .and_then(|cache| cache.get(&spec.name, &location, self.offline))
        {
            tracing::info!(bytes = body.len(), "using cached source document");
            return Ok(body);
        }
        if self.offline {
            return Err(SourceError::Offline { location });
        }
        let body = spec.provider.fetch()?;
        if let Some(cache) = &self.payloads {
            cache.put(&spec.name, &location, &body);
        }
        Ok(body)
    }

    fn run_source(&self, spec: &SourceSpec) -> KgResult<SourceSummary> {
        let _span = tracing::info_span!("source", source = %spec.name).entered();

        let raw = match self.fetch(spec) {
            Ok(raw) => raw,
            Err(e) => return Ok(self.source_failed(spec, &e)),
        };
        let batch = match spec.kind.adapter().parse(&spec.name, &raw) {
            Ok(batch) => batch,
            Err(e) => return Ok(self.source_failed(spec, &e)),
        };
        let records = batch.records();
        let rejected = batch.rejected.len();
        let mut reviews = batch.reviews;
        tracing::info!(records, reviews = reviews.len(), rejected, "parsed source");
        if reviews.is_empty() && records > 0 {
            let reason = format!("all {records} records were rejected");
            tracing::error!(reason = %reason, "source failed");
            let mut summary = SourceSummary::failed(spec, reason);
            summary.records = records;
            summary.rejected = rejected;
            return Ok(summary);
        }

        let steps = self.orchestrator.enrich(&mut reviews)?;

        let written = self.generator.generate(&spec.name, &reviews).and_then(|graph| {
            let path = graph.write_to(&self.output_dir, self.format, self.generator.namespaces())?;
            Ok::<_, SerializationError>((graph, path))
        });
        let (graph, path) = match written {
            Ok(written) => written,
            Err(e) => {
                let mut summary = self.source_failed(spec, &e);
                summary.records = records;
                summary.reviews = reviews.len();
                summary.rejected = rejected;
                summary.steps = steps;
                return Ok(summary);
            }
        };

        let (deployment, deploy_error, changed) =
            match self
                .deployer
                .deploy(&graph, self.generator.namespaces(), self.force_deploy)
            {
                Ok(d) => (Some(d.decision), None, d.changed),
                Err(e) => {
                    tracing::error!(error = %e, "deployment failed");
                    (None, Some(e.to_string()), true)
                }
            };

        let outcome = if !changed {
            SourceOutcome::Unchanged { failed: rejected }
        } else if rejected > 0 {
            SourceOutcome::Partial { failed: rejected }
        } else {
            SourceOutcome::Complete
        };

        Ok(SourceSummary {
            name: spec.name.clone(),
            kind: spec.kind,
            records,
            reviews: reviews.len(),
            rejected,
            triples: graph.len(),
            file: Some(path),
            deployment,
            deploy_error,
            steps,
            outcome,
        })
    }

    fn source_failed(&self, spec: &SourceSpec, error: &dyn std::fmt::Display) -> SourceSummary {
        tracing::error!(error = %error, "source failed");
        SourceSummary::failed(spec, error.to_string())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("sources", &self.sources)
            .field("steps", &self.orchestrator.step_names())
            .field("format", &self.format)
            .field("output_dir", &self.output_dir)
            .field("deployer", &self.deployer)
            .finish()
    }
}
