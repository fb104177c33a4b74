//! In-memory read-through cache with a time-to-live.
//!
//! Entries are written once per TTL window and served until they expire.
//! There is no explicit invalidation: every miss first drops all expired
//! entries, so the map only ever holds live requests plus the one being
//! loaded.

use super::period::PeriodSpec;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Cache key for a price request: normalized symbol set + window.
///
/// Symbols are trimmed, sorted and de-duplicated so `[QQQ, SPY]` and
/// `[SPY, QQQ, SPY]` hit the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    symbols: Vec<String>,
    window: PeriodSpec,
}

impl RequestKey {
    pub fn new<S: AsRef<str>>(symbols: &[S], window: PeriodSpec) -> Self {
        let mut symbols: Vec<String> = symbols
            .iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        symbols.sort();
        symbols.dedup();
        Self { symbols, window }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn window(&self) -> &PeriodSpec {
        &self.window
    }

    /// Short content hash, used to correlate log lines for one request.
    pub fn fingerprint(&self) -> String {
        let canonical = format!("{}|{}", self.symbols.join(","), self.window);
        let hash = blake3::hash(canonical.as_bytes());
        hash.to_hex()[..12].to_string()
    }
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// Map from key to `(value, insertion time)`, read-through with expiry.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: HashMap<K, Entry<V>>,
    ttl: Duration,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Value for `key` if it was inserted less than `ttl` ago.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries
            .get(key)
            .filter(|entry| entry.inserted_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone())
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Serve a fresh entry or compute, store and return a new one.
    ///
    /// When `load` fails nothing is stored, so the next call tries again.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: K,
        load: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        self.purge_expired();
        let value = load()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    fn purge_expired(&mut self) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::period::PeriodToken;

    #[test]
    fn request_key_is_order_and_duplicate_insensitive() {
        let a = RequestKey::new(&["QQQ", "SPY"], PeriodToken::OneMonth.into());
        let b = RequestKey::new(&["SPY", " QQQ", "SPY"], PeriodToken::OneMonth.into());
        let c = RequestKey::new(&["SPY", "QQQ"], PeriodToken::OneYear.into());

        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a, c);
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 12);
    }

    #[test]
    fn serves_hits_within_ttl() {
        let mut cache = TtlCache::new(Duration::from_secs(60));
        let mut calls = 0;

        for _ in 0..3 {
            let v: Result<u32, ()> = cache.get_or_try_insert_with("k", || {
                calls += 1;
                Ok(7)
            });
            assert_eq!(v, Ok(7));
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn failed_loads_are_not_cached() {
        let mut cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(60));

        let first: Result<u32, &str> = cache.get_or_try_insert_with("k", || Err("boom"));
        assert!(first.is_err());
        assert!(cache.is_empty());

        let second: Result<u32, &str> = cache.get_or_try_insert_with("k", || Ok(3));
        assert_eq!(second, Ok(3));
    }

    #[test]
    fn entries_expire_after_ttl() {
        let mut cache = TtlCache::new(Duration::from_millis(10));
        cache.insert("k", 1);
        assert_eq!(cache.get(&"k"), Some(1));

        std::thread::sleep(Duration::from_millis(15));
        assert_eq!(cache.get(&"k"), None);
        assert_eq!(cache.len(), 1);

        cache.purge_expired();
        assert!(cache.is_empty());
    }

    #[test]
    fn miss_evicts_expired_entries_for_other_keys() {
        let mut cache = TtlCache::new(Duration::from_millis(10));
        let a: Result<u32, ()> = cache.get_or_try_insert_with("a", || Ok(1));
        assert_eq!(a, Ok(1));

        std::thread::sleep(Duration::from_millis(15));
        let b: Result<u32, ()> = cache.get_or_try_insert_with("b", || Ok(2));
        assert_eq!(b, Ok(2));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), Some(2));
    }

    #[test]
    fn failed_miss_still_evicts() {
        let mut cache = TtlCache::new(Duration::from_millis(10));
        cache.insert("a", 1);

        std::thread::sleep(Duration::from_millis(15));
        let b: Result<u32, &str> = cache.get_or_try_insert_with("b", || Err("down"));
        assert!(b.is_err());
        assert!(cache.is_empty());
    }
}
