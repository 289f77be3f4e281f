//! Memoization of engine results.
//!
//! Results are stored as encoded bytes under a key made of the owner, the
//! dataset revision, the engine name and a canonical parameter string. A
//! key is computed at most once at a time: concurrent callers wait on the
//! same `OnceCell` and read the winner's value. A failed computation leaves
//! the slot empty so the next caller retries.

use once_cell::sync::OnceCell;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::error::{Result, StatsError};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub owner: String,
    pub revision: u64,
    pub engine: String,
    pub params: String,
}

impl CacheKey {
    pub fn new(owner: &str, revision: u64, engine: &str, params: impl Into<String>) -> Self {
        Self {
            owner: owner.to_string(),
            revision,
            engine: engine.to_string(),
            params: params.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:016x}/{}[{}]", self.owner, self.revision, self.engine, self.params)
    }
}

/// Counter snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub computations: u64,
    pub recoveries: u64,
}

type Slot = Arc<OnceCell<Arc<[u8]>>>;

#[derive(Default)]
pub struct ResultCache {
    slots: Mutex<FxHashMap<CacheKey, Slot>>,
    hits: AtomicU64,
    computations: AtomicU64,
    recoveries: AtomicU64,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FxHashMap<CacheKey, Slot>> {
        // Every update is a single map call, so a poisoned map is still consistent
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn slot(&self, key: &CacheKey) -> Slot {
        self.lock().entry(key.clone()).or_default().clone()
    }

    /// Return the cached value for `key`, computing it with `compute` if
    /// absent. Corrupt cached bytes are dropped and recomputed.
    pub fn get_or_compute<T, F>(&self, key: &CacheKey, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Result<T>,
    {
        loop {
            let slot = self.slot(key);
            let mut fresh: Option<T> = None;
            let bytes = slot.get_or_try_init(|| -> Result<Arc<[u8]>> {
                let value = compute()?;
                let encoded = serde_json::to_vec(&value).map_err(StatsError::CacheEncoding)?;
                self.computations.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, bytes = encoded.len(), "Cached result");
                fresh = Some(value);
                Ok(Arc::from(encoded))
            })?;

            if let Some(value) = fresh {
                return Ok(value);
            }

            match serde_json::from_slice::<T>(bytes) {
                Ok(value) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(value);
                }
                Err(err) => {
                    warn!(key = %key, error = %err, "Corrupt cache entry, recomputing");
                    self.recoveries.fetch_add(1, Ordering::Relaxed);
                    let mut slots = self.lock();
                    // Only drop the slot we read; another caller may have replaced it already
                    if slots.get(key).is_some_and(|current| Arc::ptr_eq(current, &slot)) {
                        slots.remove(key);
                    }
                }
            }
        }
    }

    /// Insert pre-encoded bytes (e.g. restored from disk). Existing values win.
    pub fn preload(&self, key: CacheKey, bytes: Vec<u8>) -> bool {
        let slot = self.slot(&key);
        slot.set(Arc::from(bytes)).is_ok()
    }

    /// Completed entries, sorted by key.
    pub fn entries(&self) -> Vec<(CacheKey, Arc<[u8]>)> {
        let mut entries: Vec<(CacheKey, Arc<[u8]>)> = self
            .lock()
            .iter()
            .filter_map(|(key, slot)| slot.get().map(|bytes| (key.clone(), bytes.clone())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Drop every entry of `owner`. Returns how many were removed.
    pub fn invalidate_owner(&self, owner: &str) -> usize {
        let mut slots = self.lock();
        let before = slots.len();
        slots.retain(|key, _| key.owner != owner);
        let removed = before - slots.len();
        debug!(owner, removed, "Invalidated cache entries");
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.lock().values().filter(|slot| slot.get().is_some()).count(),
            hits: self.hits.load(Ordering::Relaxed),
            computations: self.computations.load(Ordering::Relaxed),
            recoveries: self.recoveries.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn key(owner: &str) -> CacheKey {
        CacheKey::new(owner, 7, "top_tracks", "n=5")
    }

    #[test]
    fn test_second_call_is_a_hit() {
        let cache = ResultCache::new();
        let calls = AtomicUsize::new(0);
        let compute = || -> Result<Vec<u64>> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1u64, 2, 3])
        };
        assert_eq!(cache.get_or_compute(&key("u"), compute).unwrap(), vec![1, 2, 3]);
        assert_eq!(cache.get_or_compute(&key("u"), compute).unwrap(), vec![1, 2, 3]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!((stats.entries, stats.hits, stats.computations), (1, 1, 1));
    }

    #[test]
    fn test_single_flight_under_concurrency() {
        let cache = ResultCache::new();
        let calls = AtomicUsize::new(0);
        let barrier = Barrier::new(8);

        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    barrier.wait();
                    let value: u64 = cache
                        .get_or_compute(&key("u"), || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(50));
                            Ok(42)
                        })
                        .unwrap();
                    assert_eq!(value, 42);
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().computations, 1);
        assert_eq!(cache.stats().hits, 7);
    }

    #[test]
    fn test_failure_leaves_slot_empty() {
        let cache = ResultCache::new();
        let failed: Result<u64> = cache.get_or_compute(&key("u"), || {
            Err(StatsError::NoValidData { received: 0 })
        });
        assert!(failed.unwrap_err().is_no_data());
        assert_eq!(cache.stats().entries, 0);
        assert_eq!(cache.get_or_compute(&key("u"), || Ok(5u64)).unwrap(), 5);
    }

    #[test]
    fn test_corrupt_entry_is_recomputed() {
        let cache = ResultCache::new();
        assert!(cache.preload(key("u"), b"{not json".to_vec()));
        let value: Vec<String> = cache
            .get_or_compute(&key("u"), || Ok(vec!["fresh".to_string()]))
            .unwrap();
        assert_eq!(value, vec!["fresh"]);
        assert_eq!(cache.stats().recoveries, 1);

        // The replacement is a normal entry now
        let again: Vec<String> = cache.get_or_compute(&key("u"), || Ok(Vec::new())).unwrap();
        assert_eq!(again, vec!["fresh"]);
    }

    #[test]
    fn test_owners_are_isolated() {
        let cache = ResultCache::new();
        cache.get_or_compute(&key("alice"), || Ok(1u64)).unwrap();
        assert_eq!(cache.get_or_compute(&key("bob"), || Ok(2u64)).unwrap(), 2);
        assert_eq!(cache.get_or_compute(&key("alice"), || Ok(3u64)).unwrap(), 1);

        assert_eq!(cache.invalidate_owner("alice"), 1);
        assert_eq!(cache.get_or_compute(&key("alice"), || Ok(3u64)).unwrap(), 3);
        assert_eq!(cache.get_or_compute(&key("bob"), || Ok(9u64)).unwrap(), 2);
    }

    #[test]
    fn test_revision_separates_entries() {
        let cache = ResultCache::new();
        let old = CacheKey::new("u", 1, "streaks", "n=3");
        let new = CacheKey::new("u", 2, "streaks", "n=3");
        cache.get_or_compute(&old, || Ok(1u64)).unwrap();
        assert_eq!(cache.get_or_compute(&new, || Ok(2u64)).unwrap(), 2);
    }

    #[test]
    fn test_preload_does_not_overwrite() {
        let cache = ResultCache::new();
        cache.get_or_compute(&key("u"), || Ok(1u64)).unwrap();
        assert!(!cache.preload(key("u"), b"2".to_vec()));
        let entries = cache.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(&*entries[0].1, b"1");
    }
}
