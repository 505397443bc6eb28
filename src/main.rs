//! climatesense-kg CLI: build, inspect and deploy the fact-check knowledge graph.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use climatesense_kg::config::PipelineConfig;
use climatesense_kg::deploy::{has_changes, read_graph};
use climatesense_kg::enrich::RefreshPolicy;
use climatesense_kg::model::{Claim, ClaimReview, Entity, Rating};
use climatesense_kg::paths::KgPaths;
use climatesense_kg::pipeline::{Pipeline, RunOptions, SourceOutcome};

#[derive(Parser)]
#[command(
    name = "climatesense-kg",
    version,
    about = "Climate fact-check knowledge graph builder"
)]
struct Cli {
    /// Configuration file [default: $XDG_CONFIG_HOME/climatesense-kg/config.toml].
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, enrich and convert every enabled source, then deploy changed graphs.
    Run {
        /// Load graphs into the store even when unchanged.
        #[arg(long)]
        force_deploy: bool,

        /// Ignore cached enrichment successes and retryable failures.
        #[arg(long)]
        refresh: bool,

        /// Process only this source.
        #[arg(long)]
        source: Option<String>,

        /// Read remote sources from the payload cache, however old.
        #[arg(long)]
        offline: bool,

        /// Print the run summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Inspect or clear the enrichment and payload caches.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Print the identifier a claim review would receive.
    Uri {
        /// Claim text.
        #[arg(long)]
        claim: String,

        /// Review URL.
        #[arg(long)]
        url: String,

        /// Rating label, as written by the fact-checker.
        #[arg(long)]
        rating: Option<String>,

        /// Publication date.
        #[arg(long)]
        date: Option<String>,
    },

    /// Compare two RDF files as triple sets.
    Diff {
        previous: PathBuf,
        new: PathBuf,
    },

    /// Validate the configuration and print it with defaults filled in.
    Config,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Per-step entry counts and stored source documents.
    Status,
    /// Delete entries.
    Clear {
        /// Only this step (`url_text`, `enricher.url_text`, ...).
        #[arg(long, conflicts_with = "payloads")]
        step: Option<String>,

        /// Delete stored source documents instead, optionally for one source.
        #[arg(long, value_name = "SOURCE", num_args = 0..=1, default_missing_value = "")]
        payloads: Option<String>,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let paths = KgPaths::resolve()?;
    let config = load_config(cli.config.as_deref(), &paths)?;

    match cli.command {
        Commands::Run {
            force_deploy,
            refresh,
            source,
            offline,
            json,
        } => {
            paths.ensure_dirs()?;
            let options = RunOptions {
                force_deploy,
                refresh: if refresh {
                    RefreshPolicy::Force
                } else {
                    RefreshPolicy::UseCache
                },
                source,
                offline,
            };
            let pipeline = Pipeline::from_config(&config, &paths, &options)?;
            if pipeline.sources().is_empty() {
                println!("No enabled sources configured.");
                return Ok(());
            }
            let summary = pipeline.run()?;
            summary.log();

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&summary).into_diagnostic()?
                );
            } else {
                for s in &summary.sources {
                    let status = match &s.outcome {
                        SourceOutcome::Complete => "complete".to_string(),
                        SourceOutcome::Partial { failed } => format!("partial ({failed} rejected)"),
                        SourceOutcome::Failed { reason } => format!("FAILED: {reason}"),
                        SourceOutcome::Unchanged { failed: 0 } => "unchanged".to_string(),
                        SourceOutcome::Unchanged { failed } => {
                            format!("unchanged ({failed} rejected)")
                        }
                    };
                    println!(
                        "  {:<20} {:>6} reviews {:>8} triples  {status}",
                        s.name, s.reviews, s.triples
                    );
                }
                println!(
                    "{} triples in {} files ({:.1}s)",
                    summary.triples(),
                    summary.files_written().len(),
                    summary.elapsed.as_secs_f64()
                );
            }

            if !summary.is_success() {
                miette::bail!(
                    "{} of {} sources failed",
                    summary.failed_sources().len(),
                    summary.sources.len()
                );
            }
        }

        Commands::Cache { action } => {
            match action {
                CacheAction::Status => {
                    let status = config.open_cache(&paths)?.status()?;
                    if status.is_empty() {
                        println!("Cache is empty.");
                    }
                    for (step, counts) in &status {
                        println!(
                            "{step}: {} entries ({} success, {} failure, {} expired)",
                            counts.total, counts.success, counts.failure, counts.expired
                        );
                        for (kind, n) in &counts.failure_kinds {
                            println!("    {kind}: {n}");
                        }
                    }
                    for (source, stats) in &config.payload_cache(&paths).status()? {
                        println!(
                            "source {source}: {} documents, {} bytes ({} expired)",
                            stats.entries, stats.bytes, stats.expired
                        );
                    }
                }
                CacheAction::Clear {
                    payloads: Some(source),
                    ..
                } => {
                    let only = Some(source.as_str()).filter(|s| !s.is_empty());
                    let removed = config.payload_cache(&paths).clear(only)?;
                    println!("Removed {removed} source documents.");
                }
                CacheAction::Clear { step, .. } => {
                    let step = step.map(|s| climatesense_kg::config::full_step_name(&s));
                    let removed = config.open_cache(&paths)?.clear(step.as_deref())?;
                    println!("Removed {removed} entries.");
                }
            }
        }

        Commands::Uri {
            claim,
            url,
            rating,
            date,
        } => {
            let mut review = ClaimReview::new(Claim::new(&claim)?, &url)?;
            if let Some(date) = date {
                review = review.with_date(&date)?;
            }
            if let Some(label) = rating {
                review = review.with_rating(Rating::new(None, Some(&label))?);
            }
            println!("{}", Entity::ClaimReview(&review).uri(&config.output.base_uri));
        }

        Commands::Diff { previous, new } => {
            let before = read_graph(&previous)?;
            let after = read_graph(&new)?;
            if has_changes(&before, &after) {
                let added = after.difference(&before).count();
                let removed = before.difference(&after).count();
                println!("changed: +{added} -{removed}");
                std::process::exit(1);
            }
            println!("unchanged ({} triples)", after.len());
        }

        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config).into_diagnostic()?);
        }
    }

    Ok(())
}

/// An explicit `--config` must exist; the default location may be absent,
/// in which case built-in defaults apply.
fn load_config(explicit: Option<&Path>, paths: &KgPaths) -> Result<PipelineConfig> {
    if let Some(path) = explicit {
        return Ok(PipelineConfig::load(path)?);
    }
    let default = paths.config_file();
    if default.exists() {
        Ok(PipelineConfig::load(&default)?)
    } else {
        tracing::debug!(path = %default.display(), "no configuration file, using defaults");
        Ok(PipelineConfig::default())
    }
}
