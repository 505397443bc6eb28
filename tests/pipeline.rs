//! End-to-end pipeline tests: file sources, a scripted enrichment step,
//! the in-memory cache and a recording graph loader.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};

use climatesense_kg::cache::{EnrichmentCache, PayloadCache};
use climatesense_kg::config::PipelineConfig;
use climatesense_kg::deploy::{
    DeployDecision, DeployResult, Deployer, GraphLoader, SnapshotStore, read_graph,
};
use climatesense_kg::enrich::{
    ConfiguredStep, EnrichmentError, EnrichmentStep, Orchestrator, RefreshPolicy, StepSettings,
};
use climatesense_kg::model::ClaimReview;
use climatesense_kg::paths::KgPaths;
use climatesense_kg::pipeline::{Pipeline, RunOptions, SourceOutcome};
use climatesense_kg::rdf::{Namespaces, OutputFormat, RdfGenerator};
use climatesense_kg::source::{Provider, SourceKind};

const DBKF: &str = r#"[
    {"id": "1", "externalUrl": "https://www.dw.com/en/fact-check-sea-level/a-1",
     "headline": "Fact check: sea levels", "reviewBody": "Sea levels are rising.",
     "itemReviewed": {"text": "Sea levels are not rising"},
     "publisher": {"name": "DW"}, "dateCreated": "2022-03-04", "language": "en"},
    {"id": "2", "externalUrl": "https://www.dw.com/en/fact-check-co2/a-2",
     "headline": "Fact check: CO2", "itemReviewed": {"text": "CO2 is plant food, so more is better"},
     "publisher": {"name": "DW"}, "dateCreated": "2022-05-06", "language": "en"},
    {"id": "3", "headline": "No claim, no url"}
]"#;

const CLIMAFACTS: &str = r#"
    @prefix schema: <http://schema.org/> .
    <https://climafacts.eu/review/7> a schema:ClaimReview ;
        schema:url "https://climafacts.eu/fc/ice" ;
        schema:claimReviewed "Arctic ice is at a record high" ;
        schema:datePublished "2023-09-01" ;
        schema:reviewRating [ schema:name "False" ] .
"#;

/// Answers with a fixed page text for every review URL.
struct PageText;

impl EnrichmentStep for PageText {
    fn name(&self) -> &str {
        "enricher.url_text"
    }

    fn input(&self, review: &ClaimReview) -> Option<String> {
        Some(review.review_url().to_string())
    }

    fn invoke(&self, input: &str) -> Result<Value, EnrichmentError> {
        Ok(json!({ "text": format!("page text of {input}") }))
    }

    fn apply(&self, review: &mut ClaimReview, data: &Value) -> Result<(), EnrichmentError> {
        review.url_text = data["text"].as_str().map(str::to_string);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct SharedLoader(Arc<Mutex<Vec<String>>>);

impl GraphLoader for SharedLoader {
    fn load(&self, graph_iri: &str, _ntriples: &[u8]) -> DeployResult<()> {
        self.0.lock().unwrap().push(graph_iri.to_string());
        Ok(())
    }
}

fn settings() -> StepSettings {
    StepSettings {
        rate_limit_delay: Duration::ZERO,
        max_retries: 0,
        concurrency: 2,
    }
}

fn pipeline(dir: &Path, cache: EnrichmentCache, loader: SharedLoader) -> Pipeline {
    let dbkf = dir.join("dbkf.json");
    let climafacts = dir.join("climafacts.ttl");
    std::fs::write(&dbkf, DBKF).unwrap();
    std::fs::write(&climafacts, CLIMAFACTS).unwrap();

    Pipeline::new(
        Orchestrator::new(cache, vec![ConfiguredStep::new(Box::new(PageText), settings())]),
        RdfGenerator::new(
            Namespaces::new("http://data.climatesense-project.eu", "climatesense"),
            "http://data.climatesense-project.eu/graph/{SOURCE}",
        ),
        OutputFormat::NTriples,
        dir.join("rdf"),
        Deployer::new(Some(Box::new(loader)), SnapshotStore::new(&dir.join("state"))),
    )
    .with_source("dbkf", SourceKind::Dbkf, Provider::File(dbkf))
    .with_source("climafacts", SourceKind::Climafacts, Provider::File(climafacts))
}

#[test]
fn run_enriches_writes_and_deploys_every_source() {
    let dir = tempfile::TempDir::new().unwrap();
    let loader = SharedLoader::default();
    let summary = pipeline(dir.path(), EnrichmentCache::in_memory(), loader.clone())
        .run()
        .unwrap();

    assert!(summary.is_success());
    let dbkf = &summary.sources[0];
    assert_eq!(dbkf.reviews, 2);
    assert_eq!(dbkf.rejected, 1);
    assert_eq!(dbkf.outcome, SourceOutcome::Partial { failed: 1 });
    assert_eq!(dbkf.deployment, Some(DeployDecision::Loaded));
    assert_eq!(summary.sources[1].outcome, SourceOutcome::Complete);

    let step = &summary.steps[0];
    assert_eq!(step.step, "enricher.url_text");
    assert_eq!(step.calls, 3);
    assert_eq!(step.succeeded, 3);

    let nt = std::fs::read_to_string(dir.path().join("rdf/dbkf.nt")).unwrap();
    assert!(nt.contains("page text of https://www.dw.com/en/fact-check-sea-level/a-1"));
    assert!(nt.contains("<http://schema.org/ClaimReview>"));

    let loads = loader.0.lock().unwrap().clone();
    assert_eq!(
        loads,
        [
            "http://data.climatesense-project.eu/graph/dbkf",
            "http://data.climatesense-project.eu/graph/climafacts",
        ]
    );
}

#[test]
fn second_run_is_served_from_cache_and_skips_deployment() {
    let dir = tempfile::TempDir::new().unwrap();
    let cache = EnrichmentCache::in_memory();
    let loader = SharedLoader::default();

    pipeline(dir.path(), cache.clone(), loader.clone()).run().unwrap();
    let first = std::fs::read(dir.path().join("rdf/dbkf.nt")).unwrap();

    let summary = pipeline(dir.path(), cache, loader.clone()).run().unwrap();
    let step = &summary.steps[0];
    assert_eq!(step.calls, 0);
    assert_eq!(step.cache_hits, 3);
    assert_eq!(step.succeeded, 3);

    for s in &summary.sources {
        assert_eq!(s.deployment, Some(DeployDecision::SkippedUnchanged), "{}", s.name);
    }
    assert_eq!(summary.sources[0].outcome, SourceOutcome::Unchanged { failed: 1 });
    assert_eq!(summary.sources[1].outcome, SourceOutcome::Unchanged { failed: 0 });
    assert_eq!(loader.0.lock().unwrap().len(), 2);
    assert_eq!(std::fs::read(dir.path().join("rdf/dbkf.nt")).unwrap(), first);
}

#[test]
fn forced_deploy_reloads_unchanged_graphs() {
    let dir = tempfile::TempDir::new().unwrap();
    let cache = EnrichmentCache::in_memory();
    let loader = SharedLoader::default();

    pipeline(dir.path(), cache.clone(), loader.clone()).run().unwrap();
    let summary = pipeline(dir.path(), cache, loader.clone())
        .with_force_deploy(true)
        .run()
        .unwrap();

    assert_eq!(summary.sources[0].outcome, SourceOutcome::Unchanged { failed: 1 });
    assert_eq!(summary.sources[0].deployment, Some(DeployDecision::Loaded));
    assert_eq!(loader.0.lock().unwrap().len(), 4);
}

#[test]
fn from_config_uses_durable_cache_and_configured_format() {
    let dir = tempfile::TempDir::new().unwrap();
    let doc = dir.path().join("dbkf.json");
    std::fs::write(&doc, DBKF).unwrap();
    let config = PipelineConfig::parse(
        &format!(
            r#"
            [output]
            base_uri = "https://kg.example.org"
            format = "ttl"

            [[sources]]
            name = "dw"
            kind = "dbkf"
            provider = "{}"

            [[sources]]
            name = "off"
            kind = "dbkf"
            enabled = false
            provider = "missing.json"
            "#,
            doc.display()
        ),
        "inline",
    )
    .unwrap();
    let paths = KgPaths::under(dir.path());

    let pipeline = Pipeline::from_config(&config, &paths, &RunOptions::default()).unwrap();
    assert_eq!(pipeline.sources().len(), 1);
    let summary = pipeline.run().unwrap();

    assert!(paths.cache_file().exists());
    let triples = read_graph(&paths.output_dir().join("dw.ttl")).unwrap();
    assert_eq!(triples.len(), summary.sources[0].triples);
    assert!(triples.iter().any(|t| {
        t.subject.to_string().starts_with("<https://kg.example.org/claim-review/")
    }));
    assert_eq!(summary.sources[0].deployment, Some(DeployDecision::Disabled));
}

#[test]
fn unknown_source_filter_is_a_config_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = PipelineConfig::default();
    let options = RunOptions {
        source: Some("nope".into()),
        refresh: RefreshPolicy::Force,
        ..RunOptions::default()
    };
    let err = Pipeline::from_config(&config, &KgPaths::under(dir.path()), &options).unwrap_err();
    assert!(err.to_string().contains("nope"), "{err}");
}

fn remote_pipeline(dir: &Path, payloads: PayloadCache) -> Pipeline {
    Pipeline::new(
        Orchestrator::new(EnrichmentCache::in_memory(), Vec::new()),
        RdfGenerator::new(
            Namespaces::new("http://data.climatesense-project.eu", "climatesense"),
            "http://data.climatesense-project.eu/graph/{SOURCE}",
        ),
        OutputFormat::NTriples,
        dir.join("rdf"),
        Deployer::new(None, SnapshotStore::new(&dir.join("state"))),
    )
    .with_source(
        "dbkf",
        SourceKind::Dbkf,
        Provider::Http {
            url: "http://127.0.0.1:9/dbkf.json".into(),
            timeout: Duration::from_secs(1),
        },
    )
    .with_payload_cache(payloads)
}

#[test]
fn remote_documents_are_served_from_the_payload_cache() {
    let dir = tempfile::TempDir::new().unwrap();
    let payloads = PayloadCache::new(dir.path().join("sources"), None);
    payloads.put("dbkf", "http://127.0.0.1:9/dbkf.json", DBKF.as_bytes());

    let summary = remote_pipeline(dir.path(), payloads.clone()).run().unwrap();
    assert_eq!(summary.sources[0].reviews, 2);
    assert_eq!(summary.sources[0].outcome, SourceOutcome::Partial { failed: 1 });
    assert_eq!(payloads.status().unwrap()["dbkf"].entries, 1);
}

#[test]
fn offline_run_without_a_cached_copy_fails_the_source() {
    let dir = tempfile::TempDir::new().unwrap();
    let payloads = PayloadCache::new(dir.path().join("sources"), None);

    let summary = remote_pipeline(dir.path(), payloads)
        .with_offline(true)
        .run()
        .unwrap();
    assert!(!summary.is_success());
    match &summary.sources[0].outcome {
        SourceOutcome::Failed { reason } => {
            assert!(reason.contains("offline"), "{reason}");
        }
        other => panic!("expected a failed source, got {other:?}"),
    }
}
