//! Pipeline configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file is a valid (if useless)
//! configuration. [`PipelineConfig::validate`] runs before anything else
//! touches the network or the cache; a failure aborts the run.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::{CacheResult, DurableCacheStore, EnrichmentCache, PayloadCache};
use crate::enrich::{
    ConfiguredStep, DbpediaPropertyStep, EntityLinkingStep, FactorStep, StepSettings, UrlTextStep,
};
use crate::paths::KgPaths;
use crate::rdf::{Namespaces, OutputFormat, SOURCE_PLACEHOLDER};
use crate::source::{Provider, SourceKind};

/// Errors from loading or validating the configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(kg::config::read),
        help("Ensure the config file exists, or pass one with `--config`.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(kg::config::parse),
        help("Check the TOML syntax and field types in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("invalid config value for `{field}`: {message}")]
    #[diagnostic(code(kg::config::invalid))]
    Invalid { field: String, message: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.into(),
        message: message.into(),
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub deployment: DeploymentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_base_uri")]
    pub base_uri: String,
    /// `nt`, `nq`, `ttl` or `trig`.
    #[serde(default = "default_format")]
    pub format: String,
    /// Defaults to `$XDG_DATA_HOME/climatesense-kg/rdf`.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Prefix bound to `{base_uri}/ontology#`.
    #[serde(default = "default_ontology_prefix")]
    pub ontology_prefix: String,
}

fn default_base_uri() -> String {
    "http://data.climatesense-project.eu".into()
}
fn default_format() -> String {
    "nt".into()
}
fn default_ontology_prefix() -> String {
    "climatesense".into()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_uri: default_base_uri(),
            format: default_format(),
            output_dir: None,
            ontology_prefix: default_ontology_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Defaults to `$XDG_DATA_HOME/climatesense-kg/enrichment-cache.redb`.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// `0` keeps entries forever.
    #[serde(default = "default_ttl_hours")]
    pub default_ttl_hours: f64,
    /// Per-step overrides, keyed by step name with or without the
    /// `enricher.` prefix.
    #[serde(default)]
    pub step_ttl_hours: BTreeMap<String, f64>,
    /// Downloaded source documents. Defaults to
    /// `$XDG_DATA_HOME/climatesense-kg/sources`.
    #[serde(default)]
    pub payload_dir: Option<PathBuf>,
    /// Reuse window for downloaded documents; sources may override it.
    /// `0` keeps them forever.
    #[serde(default = "default_ttl_hours")]
    pub source_ttl_hours: f64,
}

fn default_ttl_hours() -> f64 {
    24.0
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            default_ttl_hours: default_ttl_hours(),
            step_ttl_hours: BTreeMap::new(),
            payload_dir: None,
            source_ttl_hours: default_ttl_hours(),
        }
    }
}

/// TTL from hours; zero means no expiry. Values [`check_ttl`] rejects
/// also map to no expiry.
fn ttl_from_hours(hours: f64) -> Option<Duration> {
    if hours > 0.0 {
        Duration::try_from_secs_f64(hours * 3600.0).ok()
    } else {
        None
    }
}

fn check_ttl(field: String, hours: f64) -> ConfigResult<()> {
    if !hours.is_finite() || hours < 0.0 {
        return Err(invalid(field, "must be a finite, non-negative number of hours"));
    }
    if Duration::try_from_secs_f64(hours * 3600.0).is_err() {
        return Err(invalid(field, "is too large"));
    }
    Ok(())
}

fn is_http_iri(value: &str) -> bool {
    url::Url::parse(value)
        .is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
}

pub fn full_step_name(key: &str) -> String {
    if key.starts_with("enricher.") {
        key.to_string()
    } else {
        format!("enricher.{key}")
    }
}

/// Settings shared by every enrichment step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepConfig {
    pub enabled: bool,
    pub rate_limit_delay_ms: u64,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub concurrency: usize,
}

impl StepConfig {
    fn settings(&self) -> StepSettings {
        StepSettings {
            rate_limit_delay: Duration::from_millis(self.rate_limit_delay_ms),
            max_retries: self.max_retries,
            concurrency: self.concurrency,
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Each step table carries the [`StepConfig`] fields plus its own.
macro_rules! step_config {
    ($ty:ident) => {
        impl $ty {
            pub fn step(&self) -> StepConfig {
                StepConfig {
                    enabled: self.enabled,
                    rate_limit_delay_ms: self.rate_limit_delay_ms,
                    timeout_secs: self.timeout_secs,
                    max_retries: self.max_retries,
                    concurrency: self.concurrency,
                }
            }
        }
    };
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlTextConfig {
    pub enabled: bool,
    pub rate_limit_delay_ms: u64,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub concurrency: usize,
}

impl Default for UrlTextConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rate_limit_delay_ms: 500,
            timeout_secs: 15,
            max_retries: 2,
            concurrency: 4,
        }
    }
}

step_config!(UrlTextConfig);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityLinkingConfig {
    pub enabled: bool,
    pub rate_limit_delay_ms: u64,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub concurrency: usize,
    /// DBpedia Spotlight compatible `annotate` endpoint.
    pub api_url: String,
    pub confidence: f64,
    pub support: u32,
}

impl Default for EntityLinkingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rate_limit_delay_ms: 100,
            timeout_secs: 20,
            max_retries: 2,
            concurrency: 4,
            api_url: "https://api.dbpedia-spotlight.org/en/annotate".into(),
            confidence: 0.5,
            support: 20,
        }
    }
}

step_config!(EntityLinkingConfig);

/// Properties looked up for every linked entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DbpediaPropertyConfig {
    pub enabled: bool,
    pub rate_limit_delay_ms: u64,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub concurrency: usize,
    pub sparql_endpoint: String,
    /// Full property IRIs, e.g. `http://dbpedia.org/ontology/abstract`.
    pub properties: Vec<String>,
}

impl Default for DbpediaPropertyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rate_limit_delay_ms: 100,
            timeout_secs: 20,
            max_retries: 2,
            concurrency: 4,
            sparql_endpoint: "https://dbpedia.org/sparql".into(),
            properties: Vec::new(),
        }
    }
}

step_config!(DbpediaPropertyConfig);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorsConfig {
    pub enabled: bool,
    pub rate_limit_delay_ms: u64,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub concurrency: usize,
    /// Server root; requests go to `{api_url}/predict`.
    pub api_url: String,
    pub max_length: usize,
}

impl Default for FactorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rate_limit_delay_ms: 100,
            timeout_secs: 60,
            max_retries: 2,
            concurrency: 4,
            api_url: "http://localhost:8000".into(),
            max_length: 128,
        }
    }
}

step_config!(FactorsConfig);

/// Enrichment steps, applied in the order of the fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default)]
    pub url_text: UrlTextConfig,
    #[serde(default)]
    pub entity_linking: EntityLinkingConfig,
    #[serde(default)]
    pub dbpedia_property: DbpediaPropertyConfig,
    #[serde(default)]
    pub factors: FactorsConfig,
}

impl EnrichmentConfig {
    fn steps(&self) -> [(&'static str, StepConfig); 4] {
        [
            ("enrichment.url_text", self.url_text.step()),
            ("enrichment.entity_linking", self.entity_linking.step()),
            ("enrichment.dbpedia_property", self.dbpedia_property.step()),
            ("enrichment.factors", self.factors.step()),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub kind: SourceKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// A file path or an `http(s)://` URL.
    pub provider: String,
    /// HTTP provider timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Overrides `cache.source_ttl_hours` for this source.
    #[serde(default)]
    pub cache_ttl_hours: Option<f64>,
}

fn default_true() -> bool {
    true
}

impl SourceConfig {
    pub fn provider(&self) -> Provider {
        match (Provider::from_location(&self.provider), self.timeout_secs) {
            (Provider::Http { url, .. }, Some(secs)) => Provider::Http {
                url,
                timeout: Duration::from_secs(secs),
            },
            (provider, _) => provider,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Named graph IRI template; `{SOURCE}` is replaced by the source name.
    #[serde(default = "default_graph_template")]
    pub graph_template: String,
    /// SPARQL 1.1 Graph Store endpoint.
    #[serde(default)]
    pub graph_store_url: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_deploy_timeout")]
    pub timeout_secs: u64,
    /// Defaults to `$XDG_STATE_HOME/climatesense-kg`.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

fn default_graph_template() -> String {
    format!("http://data.climatesense-project.eu/graph/{SOURCE_PLACEHOLDER}")
}
fn default_deploy_timeout() -> u64 {
    300
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            graph_template: default_graph_template(),
            graph_store_url: None,
            user: None,
            password: None,
            timeout_secs: default_deploy_timeout(),
            state_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse and validate TOML text. `origin` labels errors.
    pub fn parse(content: &str, origin: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let base = self.output.base_uri.trim();
        match url::Url::parse(base) {
            Ok(u) if matches!(u.scheme(), "http" | "https") && u.host_str().is_some() => {}
            Ok(_) => return Err(invalid("output.base_uri", "must be an absolute http(s) URI")),
            Err(e) => return Err(invalid("output.base_uri", e.to_string())),
        }
        self.output_format()?;
        if self.output.ontology_prefix.is_empty()
            || !self
                .output
                .ontology_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid("output.ontology_prefix", "must be a non-empty prefix name"));
        }

        check_ttl("cache.default_ttl_hours".into(), self.cache.default_ttl_hours)?;
        for (step, hours) in &self.cache.step_ttl_hours {
            check_ttl(format!("cache.step_ttl_hours.{step}"), *hours)?;
        }
        check_ttl("cache.source_ttl_hours".into(), self.cache.source_ttl_hours)?;

        for (field, step) in self.enrichment.steps() {
            if step.concurrency == 0 {
                return Err(invalid(format!("{field}.concurrency"), "must be at least 1"));
            }
            if step.timeout_secs == 0 {
                return Err(invalid(format!("{field}.timeout_secs"), "must be at least 1"));
            }
        }
        let linking = &self.enrichment.entity_linking;
        if !(0.0..=1.0).contains(&linking.confidence) {
            return Err(invalid("enrichment.entity_linking.confidence", "must be within 0..=1"));
        }
        let lookup = &self.enrichment.dbpedia_property;
        for property in &lookup.properties {
            if !is_http_iri(property) {
                return Err(invalid(
                    "enrichment.dbpedia_property.properties",
                    format!("\"{property}\" is not a full http(s) IRI"),
                ));
            }
        }
        if lookup.enabled && !is_http_iri(&lookup.sparql_endpoint) {
            return Err(invalid(
                "enrichment.dbpedia_property.sparql_endpoint",
                "must be an absolute http(s) URL",
            ));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            let name = source.name.as_str();
            if name.is_empty()
                || !name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            {
                return Err(invalid(
                    "sources.name",
                    format!("\"{name}\" must be non-empty and use only letters, digits, '-', '_' or '.'"),
                ));
            }
            if !seen.insert(name) {
                return Err(invalid("sources.name", format!("duplicate source \"{name}\"")));
            }
            if source.provider.trim().is_empty() {
                return Err(invalid(format!("sources.{name}.provider"), "must not be empty"));
            }
            if let Some(hours) = source.cache_ttl_hours {
                check_ttl(format!("sources.{name}.cache_ttl_hours"), hours)?;
            }
        }

        if !self.deployment.graph_template.contains(SOURCE_PLACEHOLDER) {
            return Err(invalid(
                "deployment.graph_template",
                format!("must contain the {SOURCE_PLACEHOLDER} placeholder"),
            ));
        }
        if self.deployment.enabled && self.deployment.graph_store_url.is_none() {
            return Err(invalid(
                "deployment.graph_store_url",
                "required when deployment is enabled",
            ));
        }
        Ok(())
    }

    pub fn output_format(&self) -> ConfigResult<OutputFormat> {
        self.output
            .format
            .parse()
            .map_err(|e: crate::error::SerializationError| invalid("output.format", e.to_string()))
    }

    pub fn namespaces(&self) -> Namespaces {
        Namespaces::new(&self.output.base_uri, &self.output.ontology_prefix)
    }

    pub fn output_dir(&self, paths: &KgPaths) -> PathBuf {
        self.output.output_dir.clone().unwrap_or_else(|| paths.output_dir())
    }

    pub fn state_dir(&self, paths: &KgPaths) -> PathBuf {
        self.deployment
            .state_dir
            .clone()
            .unwrap_or_else(|| paths.state_dir.clone())
    }

    pub fn cache_path(&self, paths: &KgPaths) -> PathBuf {
        self.cache.path.clone().unwrap_or_else(|| paths.cache_file())
    }

    /// Apply the configured TTLs to a cache backed by `store`.
    pub fn cache_with_store(&self, store: Arc<dyn crate::cache::CacheStore>) -> EnrichmentCache {
        self.cache.step_ttl_hours.iter().fold(
            EnrichmentCache::new(store, ttl_from_hours(self.cache.default_ttl_hours)),
            |cache, (step, hours)| cache.with_step_ttl(full_step_name(step), ttl_from_hours(*hours)),
        )
    }

    pub fn payload_dir(&self, paths: &KgPaths) -> PathBuf {
        self.cache
            .payload_dir
            .clone()
            .unwrap_or_else(|| paths.payload_dir())
    }

    /// Payload cache with the configured per-source TTLs.
    pub fn payload_cache(&self, paths: &KgPaths) -> PayloadCache {
        self.sources.iter().fold(
            PayloadCache::new(
                self.payload_dir(paths),
                ttl_from_hours(self.cache.source_ttl_hours),
            ),
            |cache, source| match source.cache_ttl_hours {
                Some(hours) => cache.with_source_ttl(&source.name, ttl_from_hours(hours)),
                None => cache,
            },
        )
    }

    /// Open the durable cache. Failure here aborts the run.
    pub fn open_cache(&self, paths: &KgPaths) -> CacheResult<EnrichmentCache> {
        let store = DurableCacheStore::open(&self.cache_path(paths))?;
        Ok(self.cache_with_store(Arc::new(store)))
    }

    /// Enabled steps in their fixed order.
    pub fn build_steps(&self) -> Vec<ConfiguredStep> {
        let e = &self.enrichment;
        let mut steps = Vec::new();
        let url_text = e.url_text.step();
        if url_text.enabled {
            steps.push(ConfiguredStep::new(
                Box::new(UrlTextStep::new(url_text.timeout())),
                url_text.settings(),
            ));
        }
        let linking = e.entity_linking.step();
        if linking.enabled {
            let c = &e.entity_linking;
            steps.push(ConfiguredStep::new(
                Box::new(EntityLinkingStep::new(
                    c.api_url.clone(),
                    c.confidence,
                    c.support,
                    linking.timeout(),
                )),
                linking.settings(),
            ));
        }
        let lookup = e.dbpedia_property.step();
        if lookup.enabled {
            let c = &e.dbpedia_property;
            steps.push(ConfiguredStep::new(
                Box::new(DbpediaPropertyStep::new(
                    c.sparql_endpoint.clone(),
                    c.properties.clone(),
                    lookup.timeout(),
                )),
                lookup.settings(),
            ));
        }
        let factors = e.factors.step();
        if factors.enabled {
            let c = &e.factors;
            steps.push(ConfiguredStep::new(
                Box::new(FactorStep::new(&c.api_url, c.max_length, factors.timeout())),
                factors.settings(),
            ));
        }
        steps
    }

    /// Enabled sources, optionally restricted to one name.
    pub fn selected_sources(&self, only: Option<&str>) -> Vec<&SourceConfig> {
        self.sources
            .iter()
            .filter(|s| s.enabled)
            .filter(|s| only.is_none_or(|name| s.name == name))
            .collect()
    }
}
