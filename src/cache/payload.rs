//! Raw source documents kept on disk between runs.
//!
//! Layout: `<root>/<source>/<key>.bin` holds the body and
//! `<root>/<source>/<key>.meta.json` its [`PayloadMeta`], where `key`
//! digests the provider location. A fresh entry spares the download; an
//! offline run accepts stale ones too.
//!
//! The payload cache never fails a run: unreadable entries are misses and
//! failed writes are logged.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{CacheResult, unix_now};
use crate::error::CacheError;
use crate::hash::uri_hash;

const BODY_EXT: &str = "bin";
const META_EXT: &str = "meta.json";

/// Sidecar describing a stored body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadMeta {
    pub location: String,
    /// Seconds since the Unix epoch.
    pub fetched_at: u64,
    pub bytes: u64,
}

/// Per-source totals for `cache status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PayloadStats {
    pub entries: usize,
    pub bytes: u64,
    pub expired: usize,
}

/// File-backed store of downloaded source documents.
#[derive(Debug, Clone)]
pub struct PayloadCache {
    root: PathBuf,
    default_ttl: Option<Duration>,
    source_ttl: HashMap<String, Option<Duration>>,
}

impl PayloadCache {
    /// `ttl` of `None` keeps entries forever.
    pub fn new(root: impl Into<PathBuf>, ttl: Option<Duration>) -> Self {
        Self {
            root: root.into(),
            default_ttl: ttl,
            source_ttl: HashMap::new(),
        }
    }

    pub fn with_source_ttl(mut self, source: impl Into<String>, ttl: Option<Duration>) -> Self {
        self.source_ttl.insert(source.into(), ttl);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ttl_for(&self, source: &str) -> Option<Duration> {
        self.source_ttl
            .get(source)
            .copied()
            .unwrap_or(self.default_ttl)
    }

    fn entry_paths(&self, source: &str, location: &str) -> (PathBuf, PathBuf) {
        let key = uri_hash([Some("payload"), Some(location)]);
        let dir = self.root.join(source);
        (
            dir.join(format!("{key}.{BODY_EXT}")),
            dir.join(format!("{key}.{META_EXT}")),
        )
    }

    fn is_expired(&self, source: &str, meta: &PayloadMeta, now: u64) -> bool {
        self.ttl_for(source)
            .is_some_and(|ttl| now.saturating_sub(meta.fetched_at) > ttl.as_secs())
    }

    /// The stored body for `location`. Expired entries are returned only
    /// with `allow_stale`.
    pub fn get(&self, source: &str, location: &str, allow_stale: bool) -> Option<Vec<u8>> {
        let (body_path, meta_path) = self.entry_paths(source, location);
        let meta = match read_meta(&meta_path) {
            Ok(Some(meta)) => meta,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(source, path = %meta_path.display(), error = %e, "ignoring unreadable payload metadata");
                return None;
            }
        };
        if meta.location != location {
            return None;
        }
        let expired = self.is_expired(source, &meta, unix_now());
        if expired && !allow_stale {
            tracing::debug!(source, location, "cached payload expired");
            return None;
        }
        match std::fs::read(&body_path) {
            Ok(body) if body.len() as u64 == meta.bytes => {
                tracing::debug!(source, location, bytes = body.len(), expired, "using cached payload");
                Some(body)
            }
            Ok(body) => {
                tracing::warn!(
                    source,
                    expected = meta.bytes,
                    found = body.len(),
                    "cached payload is truncated"
                );
                None
            }
            Err(e) => {
                tracing::warn!(source, path = %body_path.display(), error = %e, "ignoring unreadable payload");
                None
            }
        }
    }

    /// Store `body`. Failures are logged, never returned.
    pub fn put(&self, source: &str, location: &str, body: &[u8]) {
        if let Err(e) = self.put_at(source, location, body, unix_now()) {
            tracing::warn!(source, location, error = %e, "could not cache source payload");
        }
    }

    fn put_at(&self, source: &str, location: &str, body: &[u8], fetched_at: u64) -> CacheResult<()> {
        let (body_path, meta_path) = self.entry_paths(source, location);
        if let Some(dir) = body_path.parent() {
            std::fs::create_dir_all(dir).map_err(io)?;
        }
        let meta = PayloadMeta {
            location: location.to_string(),
            fetched_at,
            bytes: body.len() as u64,
        };
        let meta_json = serde_json::to_vec_pretty(&meta).map_err(|e| CacheError::Io {
            source: std::io::Error::other(e),
        })?;
        write_replace(&body_path, body)?;
        write_replace(&meta_path, &meta_json)
    }

    /// Entry counts per source directory.
    pub fn status(&self) -> CacheResult<BTreeMap<String, PayloadStats>> {
        let mut out = BTreeMap::new();
        let now = unix_now();
        for (source, dir) in self.source_dirs(None)? {
            let mut stats = PayloadStats::default();
            for path in meta_files(&dir)? {
                let Ok(Some(meta)) = read_meta(&path) else {
                    continue;
                };
                stats.entries += 1;
                stats.bytes += meta.bytes;
                if self.is_expired(&source, &meta, now) {
                    stats.expired += 1;
                }
            }
            if stats.entries > 0 {
                out.insert(source, stats);
            }
        }
        Ok(out)
    }

    /// Delete stored payloads, for one source or all. Returns the number of
    /// entries removed.
    pub fn clear(&self, source: Option<&str>) -> CacheResult<usize> {
        let mut removed = 0;
        for (_, dir) in self.source_dirs(source)? {
            removed += meta_files(&dir)?.len();
            std::fs::remove_dir_all(&dir).map_err(io)?;
        }
        Ok(removed)
    }

    fn source_dirs(&self, only: Option<&str>) -> CacheResult<Vec<(String, PathBuf)>> {
        if let Some(source) = only {
            let dir = self.root.join(source);
            return Ok(if dir.is_dir() {
                vec![(source.to_string(), dir)]
            } else {
                Vec::new()
            });
        }
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io(e)),
        };
        let mut dirs = Vec::new();
        for entry in entries {
            let path = entry.map_err(io)?.path();
            if !path.is_dir() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                dirs.push((name.to_string(), path.clone()));
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}

fn io(source: std::io::Error) -> CacheError {
    CacheError::Io { source }
}

fn read_meta(path: &Path) -> std::io::Result<Option<PayloadMeta>> {
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(std::io::Error::other),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn meta_files(dir: &Path) -> CacheResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io)? {
        let path = entry.map_err(io)?.path();
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(META_EXT))
        {
            files.push(path);
        }
    }
    Ok(files)
}

/// Write through a sibling temp file so readers never see half a body.
fn write_replace(path: &Path, bytes: &[u8]) -> CacheResult<()> {
    let tmp = path.with_extension("tmp");
    let mut file = std::fs::File::create(&tmp).map_err(io)?;
    file.write_all(bytes).map_err(io)?;
    file.sync_all().map_err(io)?;
    std::fs::rename(&tmp, path).map_err(io)
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://example.org/claims.json";

    fn cache(dir: &Path) -> PayloadCache {
        PayloadCache::new(dir.join("sources"), Some(Duration::from_secs(3600)))
    }

    #[test]
    fn stored_payloads_are_served_until_they_expire() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = cache(dir.path());
        assert_eq!(cache.get("dbkf", URL, false), None);

        cache.put("dbkf", URL, b"[1, 2]");
        assert_eq!(cache.get("dbkf", URL, false).as_deref(), Some(&b"[1, 2]"[..]));
        assert_eq!(cache.get("dbkf", "https://example.org/other.json", false), None);
        assert_eq!(cache.get("climafacts", URL, false), None);

        cache.put_at("dbkf", URL, b"[3]", unix_now().saturating_sub(7200)).unwrap();
        assert_eq!(cache.get("dbkf", URL, false), None);
        assert_eq!(cache.get("dbkf", URL, true).as_deref(), Some(&b"[3]"[..]));

        let forever = cache.clone().with_source_ttl("dbkf", None);
        assert!(forever.get("dbkf", URL, false).is_some());
    }

    #[test]
    fn damaged_entries_are_misses() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = cache(dir.path());
        cache.put("dbkf", URL, b"[1, 2]");
        let (body, meta) = cache.entry_paths("dbkf", URL);

        std::fs::write(&body, b"[1").unwrap();
        assert_eq!(cache.get("dbkf", URL, true), None);

        std::fs::write(&meta, b"{not json").unwrap();
        assert_eq!(cache.get("dbkf", URL, true), None);
    }

    #[test]
    fn status_and_clear_work_per_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = cache(dir.path());
        assert!(cache.status().unwrap().is_empty());

        cache.put("dbkf", URL, b"abc");
        cache.put("dbkf", "https://example.org/2.json", b"de");
        cache
            .put_at("climafacts", "https://example.org/c.ttl", b"x", 0)
            .unwrap();

        let status = cache.status().unwrap();
        assert_eq!(
            status["dbkf"],
            PayloadStats {
                entries: 2,
                bytes: 5,
                expired: 0
            }
        );
        assert_eq!(status["climafacts"].expired, 1);

        assert_eq!(cache.clear(Some("dbkf")).unwrap(), 2);
        assert_eq!(cache.clear(Some("dbkf")).unwrap(), 0);
        assert_eq!(cache.get("dbkf", URL, true), None);
        assert_eq!(cache.clear(None).unwrap(), 1);
        assert!(cache.status().unwrap().is_empty());
    }
}
