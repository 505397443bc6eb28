//! In-memory cache store backed by DashMap.
//!
//! Used by tests and dry runs. All entries are lost on process exit.

use dashmap::DashMap;

use super::{CacheEntry, CacheResult, CacheStore};

/// Concurrent in-memory cache using a sharded hashmap.
#[derive(Debug, Default)]
pub struct MemCacheStore {
    data: DashMap<(String, String), CacheEntry>,
}

impl MemCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl CacheStore for MemCacheStore {
    fn get(&self, step: &str, fingerprint: &str) -> CacheResult<Option<CacheEntry>> {
        Ok(self
            .data
            .get(&(step.to_string(), fingerprint.to_string()))
            .map(|e| e.value().clone()))
    }

    fn put(&self, entry: &CacheEntry) -> CacheResult<()> {
        self.data.insert(
            (entry.step.clone(), entry.fingerprint.clone()),
            entry.clone(),
        );
        Ok(())
    }

    fn clear(&self, step: Option<&str>) -> CacheResult<usize> {
        let mut removed = 0;
        self.data.retain(|(s, _), _| {
            let hit = step.is_none_or(|step| s == step);
            removed += usize::from(hit);
            !hit
        });
        Ok(removed)
    }

    fn entries(&self) -> CacheResult<Vec<CacheEntry>> {
        Ok(self.data.iter().map(|e| e.value().clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheOutcome;

    fn entry(step: &str, fp: &str) -> CacheEntry {
        CacheEntry {
            step: step.into(),
            fingerprint: fp.into(),
            outcome: CacheOutcome::Success {
                data: serde_json::json!({"ok": true}),
            },
            created_at: 0,
        }
    }

    #[test]
    fn put_get_overwrite() {
        let store = MemCacheStore::new();
        store.put(&entry("a", "1")).unwrap();
        assert!(store.get("a", "1").unwrap().is_some());
        assert!(store.get("a", "2").unwrap().is_none());

        let mut e = entry("a", "1");
        e.created_at = 5;
        store.put(&e).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a", "1").unwrap().unwrap().created_at, 5);
    }

    #[test]
    fn clear_by_step() {
        let store = MemCacheStore::new();
        store.put(&entry("a", "1")).unwrap();
        store.put(&entry("a", "2")).unwrap();
        store.put(&entry("b", "1")).unwrap();
        assert_eq!(store.clear(Some("a")).unwrap(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.clear(None).unwrap(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn clear_counts_only_removed_rows_under_concurrent_puts() {
        let store = std::sync::Arc::new(MemCacheStore::new());
        for i in 0..200 {
            store.put(&entry("a", &i.to_string())).unwrap();
        }
        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..2000 {
                    store.put(&entry("b", &i.to_string())).unwrap();
                }
            })
        };
        let removed = store.clear(Some("a")).unwrap();
        writer.join().unwrap();
        assert_eq!(removed, 200);
        assert_eq!(store.len(), 2000);
    }
}
