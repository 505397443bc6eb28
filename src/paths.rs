//! XDG-compliant path resolution for climatesense-kg.
//!
//! Provides [`KgPaths`], the default locations for configuration, generated
//! graphs, both caches and deployment state, following the XDG Base
//! Directory Specification.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

const APP_DIR: &str = "climatesense-kg";

/// Errors from path resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(kg::paths::no_home),
        help("Set the HOME environment variable or pass explicit paths in the configuration file.")
    )]
    NoHome,

    #[error("failed to create directory: {path}")]
    #[diagnostic(
        code(kg::paths::create_dir),
        help("Check that the parent directory exists and you have write permissions.")
    )]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PathResult<T> = std::result::Result<T, PathError>;

/// Global XDG directories for climatesense-kg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KgPaths {
    /// `$XDG_CONFIG_HOME/climatesense-kg/`
    pub config_dir: PathBuf,
    /// `$XDG_DATA_HOME/climatesense-kg/`
    pub data_dir: PathBuf,
    /// `$XDG_STATE_HOME/climatesense-kg/`
    pub state_dir: PathBuf,
}

impl KgPaths {
    /// Resolve XDG directories from environment variables with standard fallbacks.
    pub fn resolve() -> PathResult<Self> {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .map_err(|_| PathError::NoHome)?;

        let xdg = |var: &str, fallback: &str| {
            std::env::var(var)
                .map(PathBuf::from)
                .unwrap_or_else(|_| home.join(fallback))
                .join(APP_DIR)
        };

        Ok(Self {
            config_dir: xdg("XDG_CONFIG_HOME", ".config"),
            data_dir: xdg("XDG_DATA_HOME", ".local/share"),
            state_dir: xdg("XDG_STATE_HOME", ".local/state"),
        })
    }

    /// Rooted at an explicit directory; used when `HOME` is unavailable and
    /// in tests.
    pub fn under(root: &std::path::Path) -> Self {
        Self {
            config_dir: root.join("config"),
            data_dir: root.join("data"),
            state_dir: root.join("state"),
        }
    }

    /// Default configuration file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Default directory for generated graph files.
    pub fn output_dir(&self) -> PathBuf {
        self.data_dir.join("rdf")
    }

    /// Default durable enrichment cache.
    pub fn cache_file(&self) -> PathBuf {
        self.data_dir.join("enrichment-cache.redb")
    }

    /// Default root of the source payload cache.
    pub fn payload_dir(&self) -> PathBuf {
        self.data_dir.join("sources")
    }

    /// Create all base directories. Idempotent.
    pub fn ensure_dirs(&self) -> PathResult<()> {
        for dir in [&self.config_dir, &self.data_dir, &self.state_dir] {
            std::fs::create_dir_all(dir).map_err(|e| PathError::CreateDir {
                path: dir.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }
}
