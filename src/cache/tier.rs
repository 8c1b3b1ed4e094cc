//! One cache tier.
//!
//! Entries live in a [`DashMap`], so readers of different fingerprints never
//! wait on each other. A miss goes through a per-fingerprint
//! [`OnceLock`] slot: the first caller computes, concurrent callers for the
//! same fingerprint block on the slot and receive the same result. Stored
//! values are `Arc`s and never change, so a reader keeps a valid value even
//! if the entry is evicted while it is being used.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use super::fingerprint::{Fingerprint, KeyMaterial};
use super::stats::TierStats;
use crate::error::{KilnError, KilnResult};

struct Entry<V> {
    material: KeyMaterial,
    value: Arc<V>,
    /// Logical time of the last access, for LRU eviction.
    stamp: AtomicU64,
}

type Slot<V> = Arc<OnceLock<KilnResult<Arc<V>>>>;

pub struct CacheTier<V> {
    name: &'static str,
    max_entries: usize,
    entries: DashMap<Fingerprint, Entry<V>>,
    pending: DashMap<Fingerprint, Slot<V>>,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<V: Send + Sync> CacheTier<V> {
    pub fn new(name: &'static str, max_entries: usize) -> Self {
        Self {
            name,
            max_entries,
            entries: DashMap::new(),
            pending: DashMap::new(),
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Look up without touching hit/miss counters. An entry stored under the
    /// same fingerprint with different material is dropped and reported as
    /// absent.
    fn lookup(&self, fingerprint: &Fingerprint, material: &KeyMaterial) -> Option<Arc<V>> {
        let entry = self.entries.get(fingerprint)?;
        if entry.material != *material {
            drop(entry);
            let err = KilnError::CacheCorruption(format!(
                "fingerprint {} was stored for different key material",
                fingerprint.short()
            ));
            tracing::warn!(tier = self.name, error = %err, "treating as a miss");
            self.entries.remove(fingerprint);
            return None;
        }
        entry.stamp.store(self.tick(), Ordering::Relaxed);
        Some(Arc::clone(&entry.value))
    }

    pub fn get(&self, material: &KeyMaterial) -> Option<Arc<V>> {
        let found = self.lookup(&material.fingerprint(), material);
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn insert(&self, material: KeyMaterial, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.store(material.fingerprint(), material, Arc::clone(&value));
        value
    }

    fn store(&self, fingerprint: Fingerprint, material: KeyMaterial, value: Arc<V>) {
        self.entries.insert(
            fingerprint.clone(),
            Entry {
                material,
                value,
                stamp: AtomicU64::new(self.tick()),
            },
        );
        self.evict_over_capacity(&fingerprint);
    }

    /// Return the cached value, or compute it exactly once for all
    /// concurrent callers with this key. Errors reach every waiting caller
    /// but are not stored.
    pub fn get_or_compute<F>(&self, material: &KeyMaterial, compute: F) -> KilnResult<Arc<V>>
    where
        F: FnOnce() -> KilnResult<V>,
    {
        let fingerprint = material.fingerprint();
        if let Some(value) = self.lookup(&fingerprint, material) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(tier = self.name, fingerprint = fingerprint.short(), "cache hit");
            return Ok(value);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let slot: Slot<V> = self
            .pending
            .entry(fingerprint.clone())
            .or_insert_with(|| Arc::new(OnceLock::new()))
            .clone();

        let result = slot
            .get_or_init(|| {
                // a computation that finished between our lookup and taking
                // the slot has already stored its value
                if let Some(value) = self.lookup(&fingerprint, material) {
                    return Ok(value);
                }
                tracing::debug!(tier = self.name, fingerprint = fingerprint.short(), "cache miss, computing");
                let value = Arc::new(compute()?);
                self.store(fingerprint.clone(), material.clone(), Arc::clone(&value));
                Ok(value)
            })
            .clone();

        self.pending.remove_if(&fingerprint, |_, pending| Arc::ptr_eq(pending, &slot));
        result
    }

    /// Drop the LRU entries until the tier fits. Entries with a computation
    /// in flight are never chosen.
    fn evict_over_capacity(&self, keep: &Fingerprint) {
        while self.entries.len() > self.max_entries {
            let victim = self
                .entries
                .iter()
                .filter(|e| e.key() != keep && !self.pending.contains_key(e.key()))
                .min_by_key(|e| e.value().stamp.load(Ordering::Relaxed))
                .map(|e| e.key().clone());
            let Some(victim) = victim else {
                break;
            };
            if self.entries.remove(&victim).is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(tier = self.name, fingerprint = victim.short(), "evicted");
            }
        }
    }

    pub fn remove(&self, material: &KeyMaterial) -> bool {
        self.remove_fingerprint(&material.fingerprint())
    }

    pub fn remove_fingerprint(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.remove(fingerprint).is_some()
    }

    pub fn contains(&self, material: &KeyMaterial) -> bool {
        self.entries.contains_key(&material.fingerprint())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> TierStats {
        TierStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }

    #[cfg(test)]
    fn insert_under(&self, fingerprint: Fingerprint, material: KeyMaterial, value: V) {
        self.store(fingerprint, material, Arc::new(value));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::sync::atomic::AtomicUsize;

    use pretty_assertions::assert_eq;

    use super::*;

    fn key(sql: &str) -> KeyMaterial {
        KeyMaterial::new("test").field("sql", sql)
    }

    #[test]
    fn test_hit_after_miss() {
        let tier: CacheTier<String> = CacheTier::new("test", 10);
        assert!(tier.get(&key("a")).is_none());
        tier.insert(key("a"), "A".to_string());
        assert_eq!(tier.get(&key("a")).as_deref(), Some(&"A".to_string()));

        let stats = tier.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
        tier.reset_stats();
        assert_eq!(tier.stats().hits, 0);
        assert_eq!(tier.stats().entries, 1);
    }

    #[test]
    fn test_lru_eviction() {
        let tier: CacheTier<u32> = CacheTier::new("test", 2);
        tier.insert(key("a"), 1);
        tier.insert(key("b"), 2);
        // touch a, so b is the oldest
        assert!(tier.get(&key("a")).is_some());
        tier.insert(key("c"), 3);

        assert!(tier.contains(&key("a")));
        assert!(!tier.contains(&key("b")));
        assert!(tier.contains(&key("c")));
        assert_eq!(tier.stats().evictions, 1);
    }

    #[test]
    fn test_eviction_skips_pending_fingerprints() {
        let tier: CacheTier<u32> = CacheTier::new("test", 2);
        tier.insert(key("a"), 1);
        tier.insert(key("b"), 2);
        // a recomputation of a is in flight
        tier.pending.insert(key("a").fingerprint(), Arc::new(OnceLock::new()));
        tier.insert(key("c"), 3);

        assert!(tier.contains(&key("a")));
        assert!(!tier.contains(&key("b")));
        assert!(tier.contains(&key("c")));
        assert_eq!(tier.stats().evictions, 1);

        // with nothing else to evict the tier stays over capacity until the
        // computation finishes
        tier.pending.insert(key("c").fingerprint(), Arc::new(OnceLock::new()));
        tier.insert(key("d"), 4);
        assert_eq!(tier.len(), 3);

        tier.pending.clear();
        tier.insert(key("e"), 5);
        assert_eq!(tier.len(), 2);
        assert!(tier.contains(&key("e")));
    }

    #[test]
    fn test_errors_are_not_cached() {
        let tier: CacheTier<u32> = CacheTier::new("test", 10);
        let err = tier.get_or_compute(&key("bad"), || Err(KilnError::compilation("nope")));
        assert!(err.is_err());
        assert!(tier.is_empty());
        let ok = tier.get_or_compute(&key("bad"), || Ok(7)).unwrap();
        assert_eq!(*ok, 7);
    }

    #[test]
    fn test_material_mismatch_is_a_miss() {
        let tier: CacheTier<u32> = CacheTier::new("test", 10);
        let real = key("a");
        tier.insert_under(real.fingerprint(), key("impostor"), 99);

        let value = tier.get_or_compute(&real, || Ok(1)).unwrap();
        assert_eq!(*value, 1);
        assert_eq!(tier.get(&real).map(|v| *v), Some(1));
    }

    #[test]
    fn test_concurrent_misses_compute_once() {
        let tier: CacheTier<u64> = CacheTier::new("test", 10);
        let computed = AtomicUsize::new(0);
        let barrier = Barrier::new(8);

        let results: Vec<u64> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        let value = tier
                            .get_or_compute(&key("shared"), || {
                                computed.fetch_add(1, Ordering::SeqCst);
                                std::thread::sleep(std::time::Duration::from_millis(20));
                                Ok(42)
                            })
                            .unwrap();
                        *value
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results, vec![42; 8]);
        assert_eq!(computed.load(Ordering::SeqCst), 1);
        assert_eq!(tier.len(), 1);
    }
}
