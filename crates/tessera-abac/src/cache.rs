//! TTL decision cache.
//!
//! Memoizes `request content -> PolicyDecision` for a fixed TTL. The store
//! is an LRU bounded by capacity and guarded by its own mutex, independent
//! of the policy snapshot lock, since every cache miss writes to it.
//!
//! Each policy change bumps the cache generation. A decision computed
//! against an older generation is never stored, so an evaluation that
//! raced with a registration cannot repopulate the cache with a decision
//! from the replaced policy set.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::Serialize;
use tracing::{debug, warn};

use crate::evaluator::PolicyDecision;

struct CacheEntry {
    decision: PolicyDecision,
    inserted_at: Instant,
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub entries: usize,
    pub capacity: usize,
    pub ttl_secs: u64,
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped because they outlived the TTL.
    pub expired: u64,
    pub hit_rate: f64,
}

/// Bounded TTL cache of policy decisions.
pub struct DecisionCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
    capacity: usize,
    sweep_interval: Duration,
    last_sweep: Mutex<Instant>,
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    /// Bumped under the entries lock by [`DecisionCache::invalidate`].
    generation: AtomicU64,
}

impl DecisionCache {
    /// Creates a cache. A zero capacity is treated as one.
    pub fn new(capacity: usize, ttl: Duration, sweep_interval: Duration) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
            ttl,
            capacity: cap.get(),
            sweep_interval,
            last_sweep: Mutex::new(Instant::now()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expired: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    /// Current generation. Read it before taking the policy snapshot a
    /// decision will be computed from.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Returns the cached decision if present and younger than the TTL.
    ///
    /// An expired entry is removed and counted as a miss.
    pub fn get(&self, key: &str) -> Option<PolicyDecision> {
        let Ok(mut entries) = self.entries.lock() else {
            warn!("Decision cache lock poisoned, bypassing cache");
            return None;
        };

        let lookup = entries.get(key).map(|entry| {
            (entry.inserted_at.elapsed() < self.ttl).then(|| entry.decision.clone())
        });
        let fresh = match lookup {
            Some(Some(decision)) => Some(decision),
            Some(None) => {
                entries.pop(key);
                self.expired.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => None,
        };

        if fresh.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        fresh
    }

    /// Stores a decision computed at `generation`.
    ///
    /// Returns `false` and stores nothing if the cache has been invalidated
    /// since.
    pub fn insert(&self, key: String, decision: PolicyDecision, generation: u64) -> bool {
        let Ok(mut entries) = self.entries.lock() else {
            return false;
        };
        if self.generation.load(Ordering::Acquire) != generation {
            debug!(key = %key, "Dropping decision computed before a policy change");
            return false;
        }
        entries.put(
            key,
            CacheEntry {
                decision,
                inserted_at: Instant::now(),
            },
        );
        true
    }

    /// Drops every entry and starts a new generation, rejecting inserts of
    /// decisions computed before this call. Hit/miss counters are kept.
    pub fn invalidate(&self) {
        let entries = self.entries.lock();
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Ok(mut entries) = entries {
            entries.clear();
        }
    }

    /// Removes all expired entries and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let stale: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.inserted_at.elapsed() >= self.ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            entries.pop(key);
        }
        self.expired.fetch_add(stale.len() as u64, Ordering::Relaxed);
        if !stale.is_empty() {
            debug!(removed = stale.len(), "Purged expired decisions");
        }
        stale.len()
    }

    /// Purges expired entries if the sweep interval has elapsed.
    pub fn maybe_sweep(&self) -> usize {
        {
            let Ok(mut last) = self.last_sweep.try_lock() else {
                // another thread is sweeping
                return 0;
            };
            if last.elapsed() < self.sweep_interval {
                return 0;
            }
            *last = Instant::now();
        }
        self.purge_expired()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the counters.
    pub fn stats(&self, enabled: bool) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            enabled,
            entries: self.len(),
            capacity: self.capacity,
            ttl_secs: self.ttl.as_secs(),
            hits,
            misses,
            expired: self.expired.load(Ordering::Relaxed),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }

    /// Ages every entry as if `by` had passed.
    #[cfg(test)]
    pub(crate) fn age_entries(&self, by: Duration) {
        let mut entries = self.entries.lock().expect("cache lock");
        for (_, entry) in entries.iter_mut() {
            if let Some(earlier) = entry.inserted_at.checked_sub(by) {
                entry.inserted_at = earlier;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Decision;

    fn decision(d: Decision) -> PolicyDecision {
        PolicyDecision::new(d)
    }

    fn cache() -> DecisionCache {
        DecisionCache::new(10, Duration::from_secs(300), Duration::from_secs(60))
    }

    #[test]
    fn test_cache_basic() {
        let cache = cache();
        assert!(cache.get("k1").is_none());

        cache.insert("k1".to_string(), decision(Decision::Allow), 0);
        assert_eq!(cache.get("k1").map(|d| d.decision), Some(Decision::Allow));

        let stats = cache.stats(true);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_expired_entry_is_not_served() {
        let cache = cache();
        cache.insert("k1".to_string(), decision(Decision::Deny), 0);
        cache.age_entries(Duration::from_secs(301));

        assert!(cache.get("k1").is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats(true).expired, 1);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = DecisionCache::new(2, Duration::from_secs(300), Duration::from_secs(60));
        cache.insert("a".to_string(), decision(Decision::Allow), 0);
        cache.insert("b".to_string(), decision(Decision::Allow), 0);
        cache.insert("c".to_string(), decision(Decision::Allow), 0); // evicts a

        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_purge_expired() {
        let cache = cache();
        cache.insert("old".to_string(), decision(Decision::Allow), 0);
        cache.age_entries(Duration::from_secs(400));
        cache.insert("new".to_string(), decision(Decision::Allow), 0);

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("new").is_some());
    }

    #[test]
    fn test_sweep_respects_interval() {
        let cache = DecisionCache::new(10, Duration::from_secs(300), Duration::from_secs(3600));
        cache.insert("old".to_string(), decision(Decision::Allow), 0);
        cache.age_entries(Duration::from_secs(400));

        // interval has not elapsed since construction
        assert_eq!(cache.maybe_sweep(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_insert_from_stale_generation_is_dropped() {
        let cache = cache();
        let generation = cache.generation();
        cache.invalidate();

        assert!(!cache.insert("k1".to_string(), decision(Decision::Allow), generation));
        assert!(cache.is_empty());
        assert!(cache.insert("k1".to_string(), decision(Decision::Deny), cache.generation()));
        assert_eq!(cache.get("k1").map(|d| d.decision), Some(Decision::Deny));
    }

    #[test]
    fn test_invalidate_clears_entries() {
        let cache = cache();
        cache.insert("k1".to_string(), decision(Decision::Allow), 0);
        cache.invalidate();
        assert!(cache.is_empty());
        assert_eq!(cache.generation(), 1);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cache = DecisionCache::new(0, Duration::from_secs(1), Duration::from_secs(1));
        assert_eq!(cache.stats(true).capacity, 1);
    }
}
