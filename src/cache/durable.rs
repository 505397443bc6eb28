//! Durable cache store backed by redb.
//!
//! One table keyed by `step \x1f fingerprint` with JSON-encoded
//! [`CacheEntry`] values. The unit separator sorts below every printable
//! character, so all rows of one step form a contiguous key range.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};

use super::{CacheEntry, CacheResult, CacheStore};
use crate::error::CacheError;

const ENTRIES: TableDefinition<&str, &[u8]> = TableDefinition::new("enrichment_cache");

const SEP: char = '\u{1f}';

fn key(step: &str, fingerprint: &str) -> String {
    format!("{step}{SEP}{fingerprint}")
}

/// Bounds of the key range holding every row of `step`.
fn step_range(step: &str) -> (String, String) {
    (format!("{step}{SEP}"), format!("{step}\u{20}"))
}

fn redb_err<E: std::fmt::Display>(op: &'static str) -> impl FnOnce(E) -> CacheError {
    move |e| CacheError::Redb {
        message: format!("{op} failed: {e}"),
    }
}

/// ACID-durable enrichment cache.
pub struct DurableCacheStore {
    db: Arc<Database>,
    path: PathBuf,
}

impl DurableCacheStore {
    /// Open or create the cache database at `path`.
    ///
    /// Failure here is [`CacheError::Unavailable`]: a run cannot proceed
    /// without memoization.
    pub fn open(path: &Path) -> CacheResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::Unavailable {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        }
        let db = Database::create(path).map_err(|e| CacheError::Unavailable {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let txn = db.begin_write().map_err(redb_err("begin_write"))?;
        txn.open_table(ENTRIES).map_err(redb_err("open_table"))?;
        txn.commit().map_err(redb_err("commit"))?;

        Ok(Self {
            db: Arc::new(db),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of rows physically stored, expired or not.
    pub fn len(&self) -> CacheResult<u64> {
        let txn = self.db.begin_read().map_err(redb_err("begin_read"))?;
        let table = txn.open_table(ENTRIES).map_err(redb_err("open_table"))?;
        table.len().map_err(redb_err("len"))
    }

    fn decode(step: &str, fingerprint: &str, bytes: &[u8]) -> CacheResult<CacheEntry> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::Corrupt {
            step: step.to_string(),
            fingerprint: fingerprint.to_string(),
            message: e.to_string(),
        })
    }
}

impl CacheStore for DurableCacheStore {
    fn get(&self, step: &str, fingerprint: &str) -> CacheResult<Option<CacheEntry>> {
        let txn = self.db.begin_read().map_err(redb_err("begin_read"))?;
        let table = txn.open_table(ENTRIES).map_err(redb_err("open_table"))?;
        let row = table
            .get(key(step, fingerprint).as_str())
            .map_err(redb_err("get"))?;
        row.map(|guard| Self::decode(step, fingerprint, guard.value()))
            .transpose()
    }

    fn put(&self, entry: &CacheEntry) -> CacheResult<()> {
        let bytes = serde_json::to_vec(entry).map_err(|e| CacheError::Corrupt {
            step: entry.step.clone(),
            fingerprint: entry.fingerprint.clone(),
            message: e.to_string(),
        })?;
        let txn = self.db.begin_write().map_err(redb_err("begin_write"))?;
        {
            let mut table = txn.open_table(ENTRIES).map_err(redb_err("open_table"))?;
            table
                .insert(key(&entry.step, &entry.fingerprint).as_str(), bytes.as_slice())
                .map_err(redb_err("insert"))?;
        }
        txn.commit().map_err(redb_err("commit"))
    }

    fn clear(&self, step: Option<&str>) -> CacheResult<usize> {
        let txn = self.db.begin_write().map_err(redb_err("begin_write"))?;
        let removed = {
            let mut table = txn.open_table(ENTRIES).map_err(redb_err("open_table"))?;
            let keys: Vec<String> = match step {
                Some(step) => {
                    let (start, end) = step_range(step);
                    table
                        .range(start.as_str()..end.as_str())
                        .map_err(redb_err("range"))?
                        .map(|row| row.map(|(k, _)| k.value().to_string()))
                        .collect::<Result<_, _>>()
                        .map_err(redb_err("range"))?
                }
                None => table
                    .iter()
                    .map_err(redb_err("iter"))?
                    .map(|row| row.map(|(k, _)| k.value().to_string()))
                    .collect::<Result<_, _>>()
                    .map_err(redb_err("iter"))?,
            };
            for k in &keys {
                table.remove(k.as_str()).map_err(redb_err("remove"))?;
            }
            keys.len()
        };
        txn.commit().map_err(redb_err("commit"))?;
        Ok(removed)
    }

    fn entries(&self) -> CacheResult<Vec<CacheEntry>> {
        let txn = self.db.begin_read().map_err(redb_err("begin_read"))?;
        let table = txn.open_table(ENTRIES).map_err(redb_err("open_table"))?;
        let mut out = Vec::new();
        for row in table.iter().map_err(redb_err("iter"))? {
            let (k, v) = row.map_err(redb_err("iter"))?;
            let raw_key = k.value();
            let (step, fingerprint) = raw_key.split_once(SEP).unwrap_or((raw_key, ""));
            out.push(Self::decode(step, fingerprint, v.value())?);
        }
        Ok(out)
    }
}

impl std::fmt::Debug for DurableCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableCacheStore")
            .field("path", &self.path)
            .finish()
    }
}
