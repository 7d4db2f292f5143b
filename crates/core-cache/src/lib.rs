//! Caches & pools (spec component J): a bounded string-intern pool shared by
//! the compiler for variable/array names and fallback statement text, and an
//! LRU expression-token cache used by the parser.

use ahash::RandomState;
use std::collections::HashMap;
use std::rc::Rc;

/// Intern pool bounded to ~10,000 entries. On overflow the longest entries
/// are evicted first, in 20% batches (spec.md §4.J). Strings longer than
/// 1,000 bytes are never cached (still interned as a fresh `Rc<str>`, just
/// not retained for future lookups).
pub struct InternPool {
    entries: HashMap<Box<str>, Rc<str>, RandomState>,
    max_entries: usize,
}

const MAX_INTERNED_LEN: usize = 1000;
const DEFAULT_INTERN_CAPACITY: usize = 10_000;

impl Default for InternPool {
    fn default() -> Self {
        Self::new(DEFAULT_INTERN_CAPACITY)
    }
}

impl InternPool {
    pub fn new(max_entries: usize) -> Self {
        Self { entries: HashMap::default(), max_entries }
    }

    pub fn intern(&mut self, s: &str) -> Rc<str> {
        if s.len() > MAX_INTERNED_LEN {
            return Rc::from(s);
        }
        if let Some(existing) = self.entries.get(s) {
            return existing.clone();
        }
        let rc: Rc<str> = Rc::from(s);
        self.entries.insert(Box::from(s), rc.clone());
        if self.entries.len() > self.max_entries {
            self.evict_longest_batch();
        }
        rc
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_longest_batch(&mut self) {
        let batch = ((self.entries.len() as f64) * 0.2).ceil() as usize;
        let mut keys: Vec<Box<str>> = self.entries.keys().cloned().collect();
        keys.sort_unstable_by_key(|k| std::cmp::Reverse(k.len()));
        for key in keys.into_iter().take(batch.max(1)) {
            self.entries.remove(&key);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExprCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct CacheEntry<T> {
    value: T,
    last_used: u64,
    hits: u64,
}

/// LRU cache of tokenized/parsed expressions, keyed by expression source
/// text. Re-evaluating the same expression text inside a tight loop skips
/// re-lexing entirely (spec.md §4.B).
pub struct ExprCache<T: Clone> {
    entries: HashMap<Box<str>, CacheEntry<T>, RandomState>,
    capacity: usize,
    clock: u64,
    stats: ExprCacheStats,
}

impl<T: Clone> ExprCache<T> {
    pub fn new(capacity: usize) -> Self {
        Self { entries: HashMap::default(), capacity: capacity.max(1), clock: 0, stats: ExprCacheStats::default() }
    }

    /// Returns the cached value for `key`, computing and storing it via
    /// `make` on a miss. Cache eviction never changes the value returned
    /// for a given key within one process (spec.md §8 invariant).
    pub fn get_or_insert_with(&mut self, key: &str, make: impl FnOnce() -> T) -> T {
        self.clock += 1;
        if let Some(entry) = self.entries.get_mut(key) {
            entry.last_used = self.clock;
            entry.hits += 1;
            self.stats.hits += 1;
            return entry.value.clone();
        }
        self.stats.misses += 1;
        let value = make();
        if self.entries.len() >= self.capacity {
            self.evict_lru();
        }
        self.entries.insert(Box::from(key), CacheEntry { value: value.clone(), last_used: self.clock, hits: 0 });
        value
    }

    /// Looks up `key` without computing a fallback value on a miss.
    pub fn get(&mut self, key: &str) -> Option<T> {
        self.clock += 1;
        if let Some(entry) = self.entries.get_mut(key) {
            entry.last_used = self.clock;
            entry.hits += 1;
            self.stats.hits += 1;
            return Some(entry.value.clone());
        }
        self.stats.misses += 1;
        None
    }

    /// Inserts `value` for `key`, evicting the least-recently-used entry
    /// first if the cache is at capacity. Does not affect hit/miss stats
    /// (call `get` first to record the miss that led here).
    pub fn insert(&mut self, key: &str, value: T) {
        self.clock += 1;
        if self.entries.len() >= self.capacity && !self.entries.contains_key(key) {
            self.evict_lru();
        }
        self.entries.insert(Box::from(key), CacheEntry { value, last_used: self.clock, hits: 0 });
    }

    fn evict_lru(&mut self) {
        if let Some(victim) = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_used)
            .map(|(k, _)| k.clone())
        {
            self.entries.remove(&victim);
            self.stats.evictions += 1;
        }
    }

    pub fn stats(&self) -> ExprCacheStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_returns_same_allocation_for_repeat_strings() {
        let mut pool = InternPool::new(10);
        let a = pool.intern("HELLO");
        let b = pool.intern("HELLO");
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn intern_rejects_overlong_strings_from_cache() {
        let mut pool = InternPool::new(10);
        let long = "x".repeat(MAX_INTERNED_LEN + 1);
        pool.intern(&long);
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn intern_evicts_longest_first_on_overflow() {
        let mut pool = InternPool::new(4);
        pool.intern("a");
        pool.intern("bb");
        pool.intern("ccc");
        pool.intern("dddd");
        pool.intern("e"); // triggers eviction of ~20% of 5 entries (>=1), longest first
        assert!(pool.len() < 5);
        assert!(pool.entries.get("dddd").is_none(), "longest entry should be evicted first");
    }

    #[test]
    fn expr_cache_hit_returns_identical_value_and_counts_stats() {
        let mut cache = ExprCache::new(2);
        let mut build_calls = 0;
        let v1 = cache.get_or_insert_with("1+1", || {
            build_calls += 1;
            2.0
        });
        let v2 = cache.get_or_insert_with("1+1", || {
            build_calls += 1;
            2.0
        });
        assert_eq!(v1, v2);
        assert_eq!(build_calls, 1);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn expr_cache_evicts_least_recently_used() {
        let mut cache = ExprCache::new(2);
        cache.get_or_insert_with("a", || 1);
        cache.get_or_insert_with("b", || 2);
        cache.get_or_insert_with("a", || 1); // touch a, making b the LRU
        cache.get_or_insert_with("c", || 3); // should evict b
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(cache.len(), 2);
    }
}
