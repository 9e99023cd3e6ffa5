//! Descendant closure caching for concept resolution.
//!
//! Phenotypes in one run share many concepts, so the resolver memoises the
//! descendant closure of each (category, concept) seed. Thread-safe using a
//! `parking_lot::Mutex` around the LRU.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use pheno_model::{Category, ConceptId};
use tracing::trace;

use crate::config::CacheConfig;

type ClosureKey = (Category, ConceptId);

/// Thread-safe LRU cache of descendant-or-self closures.
///
/// # Example
///
/// ```rust
/// use pheno_cohort::{CacheConfig, ClosureCache};
/// use pheno_model::Category;
///
/// let cache = ClosureCache::new(CacheConfig::default());
/// let closure = cache.get_or_insert_with(Category::Condition, 1, || {
///     [1, 2, 3].into_iter().collect()
/// });
///
/// assert_eq!(closure.len(), 3);
/// assert_eq!(cache.stats().misses, 1);
/// ```
pub struct ClosureCache {
    inner: Mutex<LruCache<ClosureKey, Arc<HashSet<ConceptId>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ClosureCache {
    /// Creates a new closure cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Gets a cached closure, promoting it to most-recently-used.
    pub fn get(&self, category: Category, concept: ConceptId) -> Option<Arc<HashSet<ConceptId>>> {
        let found = self.inner.lock().get(&(category, concept)).cloned();
        let counter = if found.is_some() {
            trace!(%category, concept, "closure cache hit");
            &self.hits
        } else {
            trace!(%category, concept, "closure cache miss");
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Stores a closure. The least recently used entry is evicted when full.
    pub fn insert(
        &self,
        category: Category,
        concept: ConceptId,
        closure: HashSet<ConceptId>,
    ) -> Arc<HashSet<ConceptId>> {
        let closure = Arc::new(closure);
        self.inner
            .lock()
            .put((category, concept), Arc::clone(&closure));
        closure
    }

    /// Returns the cached closure or computes and stores it.
    ///
    /// The lock is not held while `compute` runs, so two threads may compute
    /// the same closure; both results are identical.
    pub fn get_or_insert_with<F>(
        &self,
        category: Category,
        concept: ConceptId,
        compute: F,
    ) -> Arc<HashSet<ConceptId>>
    where
        F: FnOnce() -> HashSet<ConceptId>,
    {
        match self.get(category, concept) {
            Some(closure) => closure,
            None => self.insert(category, concept, compute()),
        }
    }

    /// Returns the number of cached closures.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears all entries and resets the counters.
    pub fn clear(&self) {
        self.inner.lock().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for ClosureCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("ClosureCache")
            .field("entries", &stats.entries)
            .field("hits", &stats.hits)
            .field("misses", &stats.misses)
            .finish()
    }
}

/// Statistics about the cache state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached closures.
    pub entries: usize,
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that missed.
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of lookups answered from the cache (0.0 when unused).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn create_test_cache(max_entries: usize) -> ClosureCache {
        ClosureCache::new(CacheConfig { max_entries })
    }

    fn closure(ids: &[ConceptId]) -> HashSet<ConceptId> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_cache_insert_get() {
        let cache = create_test_cache(10);
        cache.insert(Category::Condition, 1, closure(&[1, 2]));

        let cached = cache.get(Category::Condition, 1).expect("Should have cached value");
        assert_eq!(*cached, closure(&[1, 2]));
    }

    #[test]
    fn test_cache_keys_are_category_scoped() {
        let cache = create_test_cache(10);
        cache.insert(Category::Condition, 1, closure(&[1, 2]));

        assert!(cache.get(Category::Procedure, 1).is_none());
    }

    #[test]
    fn test_get_or_insert_computes_once() {
        let cache = create_test_cache(10);
        let mut calls = 0;

        for _ in 0..3 {
            cache.get_or_insert_with(Category::Condition, 5, || {
                calls += 1;
                closure(&[5, 6])
            });
        }

        assert_eq!(calls, 1);
        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = create_test_cache(2);

        cache.insert(Category::Condition, 1, closure(&[1]));
        cache.insert(Category::Condition, 2, closure(&[2]));
        let _ = cache.get(Category::Condition, 1);
        cache.insert(Category::Condition, 3, closure(&[3]));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(Category::Condition, 1).is_some());
        assert!(cache.get(Category::Condition, 2).is_none());
        assert!(cache.get(Category::Condition, 3).is_some());
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let cache = create_test_cache(0);

        cache.insert(Category::Condition, 1, closure(&[1]));
        cache.insert(Category::Condition, 2, closure(&[2]));

        assert_eq!(cache.len(), 1);
        assert!(cache.get(Category::Condition, 2).is_some());
    }

    #[test]
    fn test_clear_resets_stats() {
        let cache = create_test_cache(10);
        cache.insert(Category::Condition, 1, closure(&[1]));
        let _ = cache.get(Category::Condition, 1);

        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(create_test_cache(1000));
        let mut handles = vec![];

        for thread_id in 0..8u64 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for i in 0..10u64 {
                    let concept = thread_id * 100 + i;
                    let result =
                        cache.get_or_insert_with(Category::Condition, concept, || closure(&[concept]));
                    assert!(result.contains(&concept));
                }
            }));
        }

        for handle in handles {
            handle.join().expect("Thread panicked");
        }

        assert_eq!(cache.len(), 80);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_get_traces_hits_and_misses() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let cache = create_test_cache(10);
            cache.insert(Category::Condition, 1, closure(&[1]));
            assert!(cache.get(Category::Condition, 1).is_some());
            assert!(cache.get(Category::Condition, 2).is_none());
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("closure cache hit"));
        assert!(output.contains("closure cache miss"));
    }

    #[test]
    fn test_cache_debug() {
        let cache = create_test_cache(10);
        let debug = format!("{:?}", cache);
        assert!(debug.contains("ClosureCache"));
        assert!(debug.contains("entries"));
    }
}
