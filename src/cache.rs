// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Time-bounded result cache with batched frequency eviction
//!
//! Every logical domain (parsed expressions, enhanced types, completion
//! lists, search results) owns its own [`ResultCache`] instance. Instances
//! are constructed explicitly and injected into the components that use
//! them, so unit tests always start from fresh state.
//!
//! Expiry is lazy: an entry whose last access is older than the TTL is
//! removed when it is next read. When an insert finds the cache full, the
//! lowest fifth of entries ordered by `(access_count, last_access)` is
//! dropped in one batch before the new entry goes in.

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Fraction of entries dropped by one eviction pass
const EVICTION_FRACTION: f64 = 0.2;

/// Cache sizing and expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries
    pub capacity: usize,
    /// Time-to-live measured from the last access, in milliseconds
    pub ttl_ms: u64,
}

impl CacheConfig {
    /// Create a config with the given capacity and TTL
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl_ms: ttl.as_millis() as u64,
        }
    }

    /// TTL as a [`Duration`]
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            ttl_ms: 5 * 60 * 1000,
        }
    }
}

/// A cached value with its access bookkeeping
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    last_access: Instant,
    access_count: u64,
}

impl<V> CacheEntry<V> {
    fn new(value: V, now: Instant) -> Self {
        Self {
            value,
            last_access: now,
            access_count: 0,
        }
    }

    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_access) >= ttl
    }
}

/// Cache counters
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses, expired reads included
    pub misses: u64,
    /// Entries dropped because their TTL elapsed
    pub expirations: u64,
    /// Entries dropped by capacity eviction
    pub evictions: u64,
}

impl CacheStats {
    /// Hit ratio as a percentage
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Thread-safe TTL cache with batched eviction
///
/// ```rust
/// use octofhir_fhirpath_intellisense::cache::{CacheConfig, ResultCache};
/// use std::time::Duration;
///
/// let cache = ResultCache::new("example", CacheConfig::new(10, Duration::from_secs(60)));
/// cache.set("Patient".to_string(), 42);
/// assert_eq!(cache.get("Patient"), Some(42));
/// ```
pub struct ResultCache<K, V> {
    /// Domain name used in log output
    name: &'static str,
    entries: RwLock<FxHashMap<K, CacheEntry<V>>>,
    capacity: usize,
    ttl: Duration,
    stats: Mutex<CacheStats>,
}

impl<K, V> ResultCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a cache for the named domain
    ///
    /// A zero capacity is raised to one so the size bound stays meaningful.
    pub fn new(name: &'static str, config: CacheConfig) -> Self {
        Self {
            name,
            entries: RwLock::new(FxHashMap::default()),
            capacity: config.capacity.max(1),
            ttl: config.ttl(),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// Look up a value, refreshing its access time on a hit
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        let mut entries = self.entries.write();

        let mut expired = false;
        let hit = match entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now, self.ttl) => {
                entry.last_access = now;
                entry.access_count += 1;
                Some(entry.value.clone())
            }
            Some(_) => {
                expired = true;
                None
            }
            None => None,
        };

        if expired {
            entries.remove(key);
        }
        drop(entries);

        let mut stats = self.stats.lock();
        if hit.is_some() {
            stats.hits += 1;
            return hit;
        }
        stats.misses += 1;
        if expired {
            stats.expirations += 1;
            log::debug!("{} cache: entry expired", self.name);
        }
        None
    }

    /// Store a value, evicting the lowest tier first when the cache is full
    pub fn set(&self, key: K, value: V) {
        let now = Instant::now();
        let mut entries = self.entries.write();

        if let Some(entry) = entries.get_mut(&key) {
            entry.value = value;
            entry.last_access = now;
            return;
        }

        if entries.len() >= self.capacity {
            let evicted = Self::evict_lowest_tier(&mut entries);
            self.stats.lock().evictions += evicted as u64;
            log::debug!(
                "{} cache: evicted {} entries at capacity {}",
                self.name,
                evicted,
                self.capacity
            );
        }

        entries.insert(key, CacheEntry::new(value, now));
    }

    /// Drop the lowest `(access_count, last_access)` fifth of the entries
    fn evict_lowest_tier(entries: &mut FxHashMap<K, CacheEntry<V>>) -> usize {
        let mut ranked: Vec<(u64, Instant, K)> = entries
            .iter()
            .map(|(key, entry)| (entry.access_count, entry.last_access, key.clone()))
            .collect();
        ranked.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let count = ((ranked.len() as f64) * EVICTION_FRACTION).ceil() as usize;
        let count = count.max(1).min(ranked.len());

        for (_, _, key) in ranked.into_iter().take(count) {
            entries.remove(&key);
        }
        count
    }

    /// Check for a live entry without touching its access bookkeeping
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        self.entries
            .read()
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now, self.ttl))
    }

    /// Remove a single entry
    pub fn invalidate<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.write().remove(key).map(|entry| entry.value)
    }

    /// Remove every entry; counters are kept
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now, self.ttl));
        let purged = before - entries.len();
        drop(entries);

        self.stats.lock().expirations += purged as u64;
        purged
    }

    /// Number of stored entries, expired ones included until read
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Configured TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Domain name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }
}

impl<K, V> std::fmt::Debug for ResultCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats.lock().clone();
        f.debug_struct("ResultCache")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("len", &self.entries.read().len())
            .field("ttl", &self.ttl)
            .field("hit_ratio", &format!("{:.1}%", stats.hit_ratio()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn cache(capacity: usize) -> ResultCache<String, u32> {
        ResultCache::new("test", CacheConfig::new(capacity, Duration::from_secs(60)))
    }

    #[test]
    fn test_get_after_set() {
        let cache = cache(10);
        cache.set("Patient".to_string(), 1);

        assert_eq!(cache.get("Patient"), Some(1));
        assert_eq!(cache.get("Observation"), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_set_replaces_existing_value() {
        let cache = cache(2);
        cache.set("a".to_string(), 1);
        cache.set("b".to_string(), 2);
        cache.set("a".to_string(), 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(3));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_ttl_expiry_is_lazy() {
        let cache: ResultCache<String, u32> =
            ResultCache::new("ttl", CacheConfig::new(10, Duration::from_millis(10)));
        cache.set("key".to_string(), 7);
        assert_eq!(cache.get("key"), Some(7));

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("key"), None);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn test_overflow_evicts_least_used_tier() {
        let cache = cache(10);
        for i in 0..10 {
            cache.set(format!("k{i}"), i);
        }
        // Every key except k0 and k1 gets read, so those two form the lowest tier.
        for i in 2..10 {
            assert!(cache.get(&format!("k{i}")).is_some());
        }

        cache.set("fresh".to_string(), 99);

        assert!(cache.len() <= cache.capacity());
        assert!(!cache.contains("k0"));
        assert!(!cache.contains("k1"));
        for i in 2..10 {
            assert!(cache.contains(&format!("k{i}")), "k{i} should survive");
        }
        assert!(cache.contains("fresh"));
        assert_eq!(cache.stats().evictions, 2);
    }

    #[test]
    fn test_eviction_breaks_ties_by_last_access() {
        let cache = cache(5);
        for i in 0..5 {
            cache.set(format!("k{i}"), i);
        }
        // All keys read once; k3 is the least recently touched.
        for i in [3, 0, 1, 2, 4] {
            cache.get(&format!("k{i}"));
            std::thread::sleep(Duration::from_millis(2));
        }

        cache.set("k5".to_string(), 5);

        assert!(!cache.contains("k3"));
        assert_eq!(cache.len(), 5);
    }

    #[test]
    fn test_capacity_one_never_overflows() {
        let cache = cache(1);
        for i in 0..20 {
            cache.set(format!("k{i}"), i);
            assert!(cache.len() <= 1);
        }
        assert_eq!(cache.get("k19"), Some(19));
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = cache(10);
        cache.set("a".to_string(), 1);
        cache.set("b".to_string(), 2);

        assert_eq!(cache.invalidate("a"), Some(1));
        assert!(!cache.contains("a"));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let cache: ResultCache<String, u32> =
            ResultCache::new("purge", CacheConfig::new(10, Duration::from_millis(5)));
        cache.set("a".to_string(), 1);
        cache.set("b".to_string(), 2);
        std::thread::sleep(Duration::from_millis(10));

        assert_eq!(cache.purge_expired(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_writers_respect_capacity() {
        let cache = Arc::new(cache(16));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        cache.set(format!("t{t}-{i}"), i);
                        cache.get(&format!("t{t}-{}", i / 2));
                        assert!(cache.len() <= 16);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 16);
    }

    #[test]
    fn test_debug_output() {
        let cache = cache(4);
        cache.set("a".to_string(), 1);
        let debug = format!("{:?}", cache);
        assert!(debug.contains("ResultCache"));
        assert!(debug.contains("hit_ratio"));
    }
}
