//! Byte-stable serialization of [`SourceGraph`]s.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use oxigraph::io::{RdfFormat, RdfSerializer};
use oxigraph::model::{GraphName, Quad};
use serde::{Deserialize, Serialize};

use super::{Namespaces, SourceGraph};
use crate::error::SerializationError;

/// Output formats the generator writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutputFormat {
    #[default]
    NTriples,
    NQuads,
    Turtle,
    TriG,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::NTriples => "nt",
            Self::NQuads => "nq",
            Self::Turtle => "ttl",
            Self::TriG => "trig",
        }
    }

    fn rdf_format(self) -> RdfFormat {
        match self {
            Self::NTriples => RdfFormat::NTriples,
            Self::NQuads => RdfFormat::NQuads,
            Self::Turtle => RdfFormat::Turtle,
            Self::TriG => RdfFormat::TriG,
        }
    }

    /// Whether the named graph is written into the file.
    pub fn is_quads(self) -> bool {
        matches!(self, Self::NQuads | Self::TriG)
    }

    fn uses_prefixes(self) -> bool {
        matches!(self, Self::Turtle | Self::TriG)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = SerializationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nt" | "ntriples" | "n-triples" => Ok(Self::NTriples),
            "nq" | "nquads" | "n-quads" => Ok(Self::NQuads),
            "ttl" | "turtle" => Ok(Self::Turtle),
            "trig" => Ok(Self::TriG),
            _ => Err(SerializationError::UnsupportedFormat {
                format: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = SerializationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<OutputFormat> for String {
    fn from(f: OutputFormat) -> Self {
        f.extension().to_string()
    }
}

impl SourceGraph {
    /// Serialize in sorted order. Equal triple sets give equal bytes.
    pub fn to_bytes(
        &self,
        format: OutputFormat,
        namespaces: &Namespaces,
    ) -> Result<Vec<u8>, SerializationError> {
        let err = |message: String| SerializationError::Serialize {
            source_name: self.source.clone(),
            message,
        };

        let mut serializer = RdfSerializer::from_format(format.rdf_format());
        if format.uses_prefixes() {
            for (prefix, ns) in namespaces.iter() {
                serializer = serializer
                    .with_prefix(prefix, ns)
                    .map_err(|e| err(e.to_string()))?;
            }
        }

        let graph_name = if format.is_quads() {
            GraphName::NamedNode(self.graph.clone())
        } else {
            GraphName::DefaultGraph
        };
        let mut writer = serializer.for_writer(Vec::new());
        for triple in self.sorted_triples() {
            let quad = Quad::new(
                triple.subject.clone(),
                triple.predicate.clone(),
                triple.object.clone(),
                graph_name.clone(),
            );
            writer
                .serialize_quad(&quad)
                .map_err(|e| err(e.to_string()))?;
        }
        writer.finish().map_err(|e| err(e.to_string()))
    }

    /// Write `<dir>/<source>.<ext>`, creating `dir` if needed.
    pub fn write_to(
        &self,
        dir: &Path,
        format: OutputFormat,
        namespaces: &Namespaces,
    ) -> Result<PathBuf, SerializationError> {
        let bytes = self.to_bytes(format, namespaces)?;
        let path = dir.join(format!("{}.{}", self.source, format.extension()));
        let write_err = |source: std::io::Error| SerializationError::Write {
            path: path.display().to_string(),
            source,
        };
        std::fs::create_dir_all(dir).map_err(write_err)?;
        std::fs::write(&path, &bytes).map_err(write_err)?;
        tracing::info!(
            source = %self.source,
            path = %path.display(),
            triples = self.len(),
            "wrote graph"
        );
        Ok(path)
    }
}
