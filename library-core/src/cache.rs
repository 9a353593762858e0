//! In-memory TTL cache.
//!
//! Best-effort and non-durable: entries vanish on restart. Expired entries are
//! dropped lazily on read and in bulk by [`TtlCache::purge_expired`].

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Shared, clonable TTL cache keyed by string.
#[derive(Clone)]
pub struct TtlCache<V> {
    entries: Arc<DashMap<String, Entry<V>>>,
    default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            default_ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        } else {
            return None;
        }

        // Expired; the read guard is released before removal.
        self.entries
            .remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.entries.insert(
            key.into(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Insert with the cache-wide default TTL.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.set(key, value, self.default_ttl);
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.entries.remove(key).map(|(_, entry)| entry.value)
    }

    /// Drop every entry whose key starts with `prefix`. Returns how many were dropped.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        before.saturating_sub(self.entries.len())
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Spawn a task that purges expired entries every `every`.
pub fn spawn_purge_task<V>(cache: TtlCache<V>, every: Duration) -> tokio::task::JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, remaining = cache.len(), "Purged expired cache entries");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_value_within_ttl() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set("documents:1", 42, Duration::from_secs(5));
        assert_eq!(cache.get("documents:1"), Some(42));
        assert_eq!(cache.get("documents:2"), None);
    }

    #[tokio::test]
    async fn misses_after_ttl_expiry() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set("stats", "fresh".to_string(), Duration::from_millis(20));
        assert_eq!(cache.get("stats").as_deref(), Some("fresh"));

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.get("stats"), None);
        assert!(cache.is_empty(), "expired entry should be evicted on read");
    }

    #[test]
    fn set_overwrites_existing_value() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("k", 1);
        cache.insert("k", 2);
        assert_eq!(cache.get("k"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn invalidate_prefix_only_drops_matching_keys() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("documents:page=1", 1);
        cache.insert("documents:page=2", 2);
        cache.insert("stats:catalog", 3);

        assert_eq!(cache.invalidate_prefix("documents:"), 2);
        assert_eq!(cache.get("documents:page=1"), None);
        assert_eq!(cache.get("stats:catalog"), Some(3));

        assert_eq!(cache.remove("stats:catalog"), Some(3));
        assert_eq!(cache.remove("stats:catalog"), None);

        cache.insert("documents:page=3", 4);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn purge_expired_keeps_live_entries() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set("short", 1, Duration::from_millis(10));
        cache.set("long", 2, Duration::from_secs(60));

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("long"), Some(2));
    }
}
