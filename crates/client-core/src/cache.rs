//! In-memory key/value cache with a single shared time-to-live.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::time::Instant;

/// Default time-to-live shared by every entry.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

/// Build a cache key following the `resource_type:id` convention.
pub fn cache_key(resource: &str, id: impl std::fmt::Display) -> String {
    format!("{resource}:{id}")
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

/// TTL cache keyed by string.
///
/// Expired entries behave as absent and are evicted lazily on lookup. Capacity is
/// unbounded.
#[derive(Debug)]
pub struct TtlCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl<V: Clone> TtlCache<V> {
    /// Create an empty cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Time-to-live applied to every entry.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store `value` under `key`, restarting its TTL clock.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let entry = CacheEntry {
            value,
            stored_at: Instant::now(),
        };
        self.lock().insert(key.into(), entry);
    }

    /// Look up a live value, evicting the entry if it has expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.lock();
        let entry = entries.get(key)?;
        if self.is_live(entry, Instant::now()) {
            return Some(entry.value.clone());
        }
        entries.remove(key);
        None
    }

    /// Drop `key`, returning its value if it was still live.
    pub fn remove(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        self.lock()
            .remove(key)
            .filter(|entry| self.is_live(entry, now))
            .map(|entry| entry.value)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .values()
            .filter(|entry| self.is_live(entry, now))
            .count()
    }

    /// Whether no live entries remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict all expired entries, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| self.is_live(entry, now));
        before - entries.len()
    }

    fn is_live(&self, entry: &CacheEntry<V>, now: Instant) -> bool {
        now.saturating_duration_since(entry.stored_at) < self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        // Entries stay consistent even if a holder panicked mid-call.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn serves_value_until_ttl_elapses() {
        let cache = TtlCache::new(Duration::from_secs(30));
        cache.set("profile:42", "alice".to_owned());

        advance(Duration::from_millis(29_999)).await;
        assert_eq!(cache.get("profile:42").as_deref(), Some("alice"));

        advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get("profile:42"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_wins_and_restarts_ttl() {
        let cache = TtlCache::new(Duration::from_secs(10));
        cache.set("streak:7", 1_u32);

        advance(Duration::from_secs(8)).await;
        cache.set("streak:7", 2_u32);

        advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get("streak:7"), Some(2));

        advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("streak:7"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_lookup_evicts_entry() {
        let cache = TtlCache::new(Duration::from_secs(1));
        cache.set("a", 1_u8);
        cache.set("b", 2_u8);

        advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("a"), None);
        assert!(cache.is_empty());
        assert_eq!(cache.purge_expired(), 1);
    }

    #[test]
    fn clear_drops_everything() {
        let cache = TtlCache::default();
        cache.set(cache_key("workout", 1), 10_i64);
        cache.set(cache_key("workout", 2), 20_i64);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.ttl(), DEFAULT_CACHE_TTL);

        cache.clear();
        assert_eq!(cache.get("workout:1"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn remove_returns_live_value() {
        let cache = TtlCache::default();
        cache.set("badge:3", "gold");
        assert_eq!(cache.remove("badge:3"), Some("gold"));
        assert_eq!(cache.remove("badge:3"), None);
    }
}
