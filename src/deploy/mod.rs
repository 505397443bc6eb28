//! Deployment diff and graph loading.
//!
//! Every successfully loaded graph is snapshotted as N-Quads under
//! `<state_dir>/deployed/<source>.nq`. The next run compares its freshly
//! generated triple set against that snapshot and skips the load when the
//! sets are equal, unless the caller forces it.

pub mod loader;

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::Triple;
use serde::Serialize;

use crate::error::DeployError;
use crate::rdf::{Namespaces, OutputFormat, SourceGraph};

pub use loader::{GraphLoader, GraphStoreLoader};

/// Result type for deployment operations.
pub type DeployResult<T> = std::result::Result<T, DeployError>;

/// True when the two triple sets differ. Order never matters.
pub fn has_changes(previous: &HashSet<Triple>, new: &HashSet<Triple>) -> bool {
    previous != new
}

/// Read an RDF file into a triple set, ignoring graph names. The format
/// is taken from the file extension.
pub fn read_graph(path: &Path) -> DeployResult<HashSet<Triple>> {
    let read_err = |message: String| DeployError::ReadGraph {
        path: path.display().to_string(),
        message,
    };
    let format = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(RdfFormat::from_extension)
        .ok_or_else(|| read_err("unrecognized RDF file extension".into()))?;
    let file = File::open(path).map_err(|e| read_err(e.to_string()))?;

    let mut triples = HashSet::new();
    for quad in RdfParser::from_format(format).for_reader(BufReader::new(file)) {
        let quad = quad.map_err(|e| read_err(e.to_string()))?;
        triples.insert(Triple::new(quad.subject, quad.predicate, quad.object));
    }
    Ok(triples)
}

/// What happened to one source's graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployDecision {
    /// Loaded into the graph store.
    Loaded,
    /// Same triples as the last deployed snapshot; nothing sent.
    SkippedUnchanged,
    /// No graph store configured.
    Disabled,
}

/// Outcome of [`Deployer::deploy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Deployment {
    /// Whether the graph differs from the last deployed snapshot.
    pub changed: bool,
    pub decision: DeployDecision,
}

/// Last-deployed graph snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            dir: state_dir.join("deployed"),
        }
    }

    pub fn path(&self, source: &str) -> PathBuf {
        self.dir.join(format!("{source}.{}", OutputFormat::NQuads.extension()))
    }

    /// The last deployed triples for `source`, if any. An unreadable
    /// snapshot is reported and treated as absent.
    pub fn previous(&self, source: &str) -> Option<HashSet<Triple>> {
        let path = self.path(source);
        if !path.exists() {
            return None;
        }
        match read_graph(&path) {
            Ok(triples) => Some(triples),
            Err(e) => {
                tracing::warn!(source, error = %e, "ignoring unreadable deployed snapshot");
                None
            }
        }
    }

    pub fn record(&self, graph: &SourceGraph, namespaces: &Namespaces) -> DeployResult<PathBuf> {
        let path = self.path(&graph.source);
        let snapshot_err = |source: std::io::Error| DeployError::Snapshot {
            path: path.display().to_string(),
            source,
        };
        let bytes = graph
            .to_bytes(OutputFormat::NQuads, namespaces)
            .map_err(|e| snapshot_err(std::io::Error::other(e.to_string())))?;
        std::fs::create_dir_all(&self.dir).map_err(snapshot_err)?;
        std::fs::write(&path, bytes).map_err(snapshot_err)?;
        Ok(path)
    }
}

/// Diffs generated graphs against their snapshots and loads the changed
/// ones.
pub struct Deployer {
    loader: Option<Box<dyn GraphLoader>>,
    snapshots: SnapshotStore,
}

impl Deployer {
    pub fn new(loader: Option<Box<dyn GraphLoader>>, snapshots: SnapshotStore) -> Self {
        Self { loader, snapshots }
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    /// Load `graph` if it changed since the last deployment or `force` is
    /// set, then record it as the new snapshot.
    pub fn deploy(
        &self,
        graph: &SourceGraph,
        namespaces: &Namespaces,
        force: bool,
    ) -> DeployResult<Deployment> {
        let changed = self
            .snapshots
            .previous(&graph.source)
            .is_none_or(|previous| has_changes(&previous, &graph.triples));

        let Some(loader) = self.loader.as_ref() else {
            return Ok(Deployment {
                changed,
                decision: DeployDecision::Disabled,
            });
        };
        if !changed && !force {
            tracing::info!(source = %graph.source, "graph unchanged, skipping deployment");
            return Ok(Deployment {
                changed,
                decision: DeployDecision::SkippedUnchanged,
            });
        }

        let body = graph
            .to_bytes(OutputFormat::NTriples, namespaces)
            .map_err(|e| DeployError::Load {
                graph: graph.graph.as_str().to_string(),
                message: e.to_string(),
            })?;
        loader.load(graph.graph.as_str(), &body)?;
        self.snapshots.record(graph, namespaces)?;
        tracing::info!(
            source = %graph.source,
            graph = %graph.graph.as_str(),
            triples = graph.len(),
            forced = force && !changed,
            "deployed graph"
        );
        Ok(Deployment {
            changed,
            decision: DeployDecision::Loaded,
        })
    }
}

impl std::fmt::Debug for Deployer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deployer")
            .field("loader", &self.loader.is_some())
            .field("snapshots", &self.snapshots)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use oxigraph::model::{Literal, NamedNode};

    use super::*;
    use crate::model::{Claim, ClaimReview};
    use crate::rdf::RdfGenerator;

    fn triple(s: &str, o: &str) -> Triple {
        Triple::new(
            NamedNode::new(format!("http://x.org/{s}")).unwrap(),
            NamedNode::new("http://schema.org/name").unwrap(),
            Literal::new_simple_literal(o),
        )
    }

    #[test]
    fn identical_sets_have_no_changes() {
        let g: HashSet<_> = [triple("a", "1"), triple("b", "2")].into_iter().collect();
        let reordered: HashSet<_> = [triple("b", "2"), triple("a", "1")].into_iter().collect();
        assert!(!has_changes(&g, &g));
        assert!(!has_changes(&g, &reordered));

        let mut one_off = g.clone();
        one_off.remove(&triple("b", "2"));
        one_off.insert(triple("b", "3"));
        assert!(has_changes(&g, &one_off));
    }

    #[derive(Default)]
    struct RecordingLoader {
        loads: Mutex<Vec<String>>,
    }

    impl GraphLoader for RecordingLoader {
        fn load(&self, graph_iri: &str, _ntriples: &[u8]) -> DeployResult<()> {
            self.loads.lock().unwrap().push(graph_iri.to_string());
            Ok(())
        }
    }

    impl GraphLoader for std::sync::Arc<RecordingLoader> {
        fn load(&self, graph_iri: &str, ntriples: &[u8]) -> DeployResult<()> {
            self.as_ref().load(graph_iri, ntriples)
        }
    }

    fn source_graph(text: &str) -> (SourceGraph, Namespaces) {
        let ns = Namespaces::new("http://data.climatesense-project.eu", "climatesense");
        let review = ClaimReview::new(Claim::new(text).unwrap(), "https://example.org/r").unwrap();
        let graph = RdfGenerator::new(ns.clone(), "http://data.climatesense-project.eu/graph/{SOURCE}")
            .generate("dbkf", &[review])
            .unwrap();
        (graph, ns)
    }

    #[test]
    fn unchanged_graphs_are_not_reloaded() {
        let dir = tempfile::TempDir::new().unwrap();
        let loader = std::sync::Arc::new(RecordingLoader::default());
        let deployer = Deployer::new(
            Some(Box::new(loader.clone())),
            SnapshotStore::new(dir.path()),
        );
        let (graph, ns) = source_graph("Sea ice is expanding");

        let first = deployer.deploy(&graph, &ns, false).unwrap();
        assert_eq!(first.decision, DeployDecision::Loaded);
        assert!(first.changed);
        assert!(deployer.snapshots().path("dbkf").exists());

        let second = deployer.deploy(&graph, &ns, false).unwrap();
        assert_eq!(second.decision, DeployDecision::SkippedUnchanged);
        assert!(!second.changed);

        let forced = deployer.deploy(&graph, &ns, true).unwrap();
        assert_eq!(forced.decision, DeployDecision::Loaded);

        let (edited, _) = source_graph("Sea ice is shrinking");
        assert!(deployer.deploy(&edited, &ns, false).unwrap().changed);
        assert_eq!(loader.loads.lock().unwrap().len(), 3);
    }

    #[test]
    fn snapshots_round_trip_through_read_graph() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        let (graph, ns) = source_graph("It is the sun");
        let path = store.record(&graph, &ns).unwrap();
        assert_eq!(read_graph(&path).unwrap(), graph.triples);
        assert_eq!(store.previous("dbkf").unwrap(), graph.triples);
        assert!(store.previous("other").is_none());
    }

    #[test]
    fn disabled_deployment_still_reports_changes() {
        let dir = tempfile::TempDir::new().unwrap();
        let deployer = Deployer::new(None, SnapshotStore::new(dir.path()));
        let (graph, ns) = source_graph("CO2 lags temperature");
        let d = deployer.deploy(&graph, &ns, false).unwrap();
        assert_eq!(d.decision, DeployDecision::Disabled);
        assert!(d.changed);
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("graph.bin");
        std::fs::write(&path, b"").unwrap();
        assert!(matches!(read_graph(&path), Err(DeployError::ReadGraph { .. })));
    }
}
