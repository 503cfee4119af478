//! Memoizing TTL Cache
//!
//! Thread-safe result cache with per-entry expiry and least-recently-used
//! eviction. There is no background sweeper: expired entries are dropped when
//! a lookup touches them, and capacity pressure removes the entry that has
//! gone longest without being read or written.
//!
//! Reads refresh recency, so a hot entry survives capacity pressure even when
//! it was written long ago.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;

/// Effectiveness counters, cheap to copy out for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    /// Live entry count at the time the snapshot was taken
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of lookups served from the cache
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
    /// Recency stamp; larger means more recently used
    touched: u64,
}

#[derive(Debug)]
struct CacheInner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    /// Recency index ordered oldest-first; stamps mirror `entries`
    recency: BTreeMap<u64, String>,
    next_stamp: u64,
    max_entries: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

/// Thread-safe TTL cache with least-recently-used eviction
pub struct TtlCache<V> {
    inner: Arc<Mutex<CacheInner<V>>>,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            default_ttl: self.default_ttl,
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<V> fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("TtlCache")
            .field("entries", &inner.entries.len())
            .field("max_entries", &inner.max_entries)
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache on the system clock
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache on an explicit time source. Tests pair this with
    /// `ManualClock` to verify expiry without sleeping.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        debug!(
            max_entries = config.max_entries,
            default_ttl_seconds = config.default_ttl_seconds,
            "Initializing TTL cache"
        );
        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                entries: HashMap::new(),
                recency: BTreeMap::new(),
                next_stamp: 0,
                max_entries: config.max_entries,
                hits: 0,
                misses: 0,
                evictions: 0,
                expirations: 0,
            })),
            default_ttl: config.default_ttl(),
            clock,
        }
    }

    /// Fetch a live value, refreshing its recency.
    ///
    /// An expired entry is removed on the spot and reported as a miss, the
    /// same as a key that was never stored.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let expired_stamp = match inner.entries.get_mut(key) {
            None => {
                inner.misses += 1;
                debug!("Cache miss for key: {}", key);
                return None;
            }
            Some(entry) if now < entry.expires_at => {
                let previous = entry.touched;
                entry.touched = inner.next_stamp;
                inner.next_stamp += 1;
                inner.recency.remove(&previous);
                inner.recency.insert(entry.touched, key.to_string());
                inner.hits += 1;
                debug!("Cache hit for key: {}", key);
                return Some(entry.value.clone());
            }
            Some(entry) => entry.touched,
        };

        inner.entries.remove(key);
        inner.recency.remove(&expired_stamp);
        inner.expirations += 1;
        inner.misses += 1;
        debug!("Cache entry expired for key: {}", key);
        None
    }

    /// Store a value under `key` for `ttl`.
    ///
    /// Overwriting refreshes both the value and the deadline. At capacity the
    /// least recently used entry is evicted to make room. A capacity of zero
    /// disables storage entirely.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let now = self.clock.now();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if inner.max_entries == 0 {
            return;
        }

        let stamp = inner.next_stamp;
        inner.next_stamp += 1;

        if let Some(existing) = inner.entries.get_mut(&key) {
            inner.recency.remove(&existing.touched);
            existing.value = value;
            existing.expires_at = now + ttl;
            existing.touched = stamp;
            inner.recency.insert(stamp, key.clone());
            debug!("Refreshed cached result for key: {}", key);
            return;
        }

        if inner.entries.len() >= inner.max_entries {
            if let Some((_, evicted)) = inner.recency.pop_first() {
                inner.entries.remove(&evicted);
                inner.evictions += 1;
                debug!("Evicted least recently used key: {}", evicted);
            }
        }

        inner.entries.insert(
            key.clone(),
            CacheEntry {
                value,
                expires_at: now + ttl,
                touched: stamp,
            },
        );
        inner.recency.insert(stamp, key.clone());
        debug!("Cached result for key: {}", key);
    }

    /// Drop a single entry immediately. Unknown keys are a no-op.
    pub fn invalidate(&self, key: &str) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if let Some(entry) = inner.entries.remove(key) {
            inner.recency.remove(&entry.touched);
            debug!("Invalidated cache for key: {}", key);
        }
    }

    /// Drop every entry. Statistics counters are preserved.
    pub fn clear(&self) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.entries.clear();
        inner.recency.clear();
        info!("Cleared entire result cache");
    }

    /// Serve `key` from the cache, or run `compute` and store its success
    /// under `key` for `ttl`.
    ///
    /// Failures propagate to the caller and are never cached. Concurrent
    /// callers that miss simultaneously each run `compute`; the last
    /// completion wins the slot.
    ///
    /// ```rust
    /// use receipta_core::cache::TtlCache;
    /// use receipta_core::config::CacheConfig;
    /// use std::time::Duration;
    ///
    /// # tokio_test::block_on(async {
    /// let cache = TtlCache::new(CacheConfig::default());
    /// let text = cache
    ///     .memoize("ocr_text:abc123", Duration::from_secs(300), || async {
    ///         Ok::<_, String>("TOTAL 12.50".to_string())
    ///     })
    ///     .await?;
    /// assert_eq!(text, "TOTAL 12.50");
    ///
    /// // Served from the cache; compute does not run again
    /// let again = cache
    ///     .memoize("ocr_text:abc123", Duration::from_secs(300), || async {
    ///         Err::<String, _>("compute should not run".to_string())
    ///     })
    ///     .await?;
    /// assert_eq!(again, "TOTAL 12.50");
    /// # Ok::<(), String>(())
    /// # }).unwrap();
    /// ```
    pub async fn memoize<F, Fut, E>(&self, key: &str, ttl: Duration, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let value = compute().await?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }

    /// Number of live and expired-but-unswept entries currently held
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// TTL applied when a caller stores without an explicit one
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Snapshot of effectiveness counters
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            expirations: inner.expirations,
            entries: inner.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const LONG_TTL: Duration = Duration::from_secs(3600);

    fn cache_with_clock(max_entries: usize) -> (TtlCache<String>, ManualClock) {
        let clock = ManualClock::new();
        let cache = TtlCache::with_clock(
            CacheConfig {
                max_entries,
                default_ttl_seconds: 300,
            },
            Arc::new(clock.clone()),
        );
        (cache, clock)
    }

    #[test]
    fn test_set_then_get_returns_value() {
        let (cache, _clock) = cache_with_clock(10);
        cache.set("receipt:1", "coffee".to_string(), LONG_TTL);

        assert_eq!(cache.get("receipt:1"), Some("coffee".to_string()));
        assert_eq!(cache.get("receipt:2"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let (cache, clock) = cache_with_clock(10);
        cache.set("receipt:1", "coffee".to_string(), Duration::from_secs(60));

        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get("receipt:1"), Some("coffee".to_string()));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("receipt:1"), None);
        assert_eq!(cache.len(), 0);

        let stats = cache.stats();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_overwrite_refreshes_value_and_deadline() {
        let (cache, clock) = cache_with_clock(10);
        cache.set("receipt:1", "draft".to_string(), Duration::from_secs(10));

        clock.advance(Duration::from_secs(8));
        cache.set("receipt:1", "final".to_string(), Duration::from_secs(10));

        // Past the original deadline but within the refreshed one
        clock.advance(Duration::from_secs(8));
        assert_eq!(cache.get("receipt:1"), Some("final".to_string()));

        clock.advance(Duration::from_secs(3));
        assert_eq!(cache.get("receipt:1"), None);
    }

    #[test]
    fn test_invalidate_removes_entry() {
        let (cache, _clock) = cache_with_clock(10);
        cache.set("receipt:1", "coffee".to_string(), LONG_TTL);

        cache.invalidate("receipt:1");
        assert_eq!(cache.get("receipt:1"), None);

        // Unknown keys are a quiet no-op
        cache.invalidate("never-stored");
    }

    #[test]
    fn test_clear_empties_cache() {
        let (cache, _clock) = cache_with_clock(10);
        cache.set("a", "1".to_string(), LONG_TTL);
        cache.set("b", "2".to_string(), LONG_TTL);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), None);
    }

    #[test]
    fn test_lru_eviction_prefers_oldest_untouched() {
        let (cache, _clock) = cache_with_clock(2);
        cache.set("x", "1".to_string(), LONG_TTL);
        cache.set("y", "2".to_string(), LONG_TTL);

        // Reading x makes y the least recently used entry
        assert!(cache.get("x").is_some());

        cache.set("z", "3".to_string(), LONG_TTL);
        assert_eq!(cache.get("y"), None);
        assert!(cache.get("x").is_some());
        assert!(cache.get("z").is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let (cache, _clock) = cache_with_clock(3);
        for i in 0..10 {
            cache.set(format!("key:{i}"), format!("value:{i}"), LONG_TTL);
            assert!(cache.len() <= 3);
        }
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.stats().evictions, 7);
    }

    #[test]
    fn test_zero_capacity_disables_storage() {
        let (cache, _clock) = cache_with_clock(0);
        cache.set("receipt:1", "coffee".to_string(), LONG_TTL);

        assert_eq!(cache.get("receipt:1"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stats_hit_rate() {
        let (cache, _clock) = cache_with_clock(10);
        assert_eq!(cache.stats().hit_rate(), 0.0);

        cache.set("a", "1".to_string(), LONG_TTL);
        assert!(cache.get("a").is_some());
        assert!(cache.get("a").is_some());
        assert!(cache.get("missing").is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_memoize_runs_compute_once_per_ttl_window() {
        let (cache, clock) = cache_with_clock(10);
        let calls = AtomicUsize::new(0);

        let first = cache
            .memoize("ocr:abc", Duration::from_secs(30), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>("recognized text".to_string())
            })
            .await
            .unwrap();
        assert_eq!(first, "recognized text");

        let second = cache
            .memoize("ocr:abc", Duration::from_secs(30), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>("should not run".to_string())
            })
            .await
            .unwrap();
        assert_eq!(second, "recognized text");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(31));
        let third = cache
            .memoize("ocr:abc", Duration::from_secs(30), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>("fresh extraction".to_string())
            })
            .await
            .unwrap();
        assert_eq!(third, "fresh extraction");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_memoize_does_not_cache_failures() {
        let (cache, _clock) = cache_with_clock(10);
        let calls = AtomicUsize::new(0);

        let failed: Result<String, String> = cache
            .memoize("ocr:bad", Duration::from_secs(30), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("provider exploded".to_string())
            })
            .await;
        assert!(failed.is_err());
        assert!(cache.is_empty());

        let recovered = cache
            .memoize("ocr:bad", Duration::from_secs(30), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>("second try".to_string())
            })
            .await
            .unwrap();
        assert_eq!(recovered, "second try");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
