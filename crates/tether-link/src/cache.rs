//! Bounded expire-after-write cache.
//!
//! Entries live for a fixed TTL from insertion; reads never refresh the
//! clock (a verification code must not stay redeemable just because
//! someone keeps looking at it). Eviction is lazy plus oldest-first when
//! the size cap is hit.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    ttl: Duration,
    max_entries: usize,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries,
        }
    }

    /// Fetch a live entry. Expired entries are dropped on the spot and
    /// reported as absent; the TTL is never extended by a read.
    pub async fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert (or replace) an entry, resetting its TTL.
    pub async fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.lock().await;

        entries.retain(|_, e| e.inserted_at.elapsed() < self.ttl);

        // Still over the cap after purging: drop the oldest entry.
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Remove a single entry. Returns `true` if one was present.
    pub async fn invalidate(&self, key: &K) -> bool {
        self.entries.lock().await.remove(key).is_some()
    }

    /// Drop every entry. Reserved for shutdown; normal operation only ever
    /// invalidates single entries.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let entries = self.entries.lock().await;
        entries
            .values()
            .filter(|e| e.inserted_at.elapsed() < self.ttl)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, Duration};

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(60), 16);
        cache.insert("a", 1).await;

        advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get(&"a").await, Some(1));

        advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get(&"a").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn reads_do_not_refresh_ttl() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(60), 16);
        cache.insert("a", 1).await;

        // Poll right up to the deadline, then cross it.
        advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get(&"a").await, Some(1));
        advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get(&"a").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn reinsert_resets_ttl() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(60), 16);
        cache.insert("a", 1).await;

        advance(Duration::from_secs(50)).await;
        cache.insert("a", 2).await;

        advance(Duration::from_secs(50)).await;
        assert_eq!(cache.get(&"a").await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn size_cap_evicts_oldest() {
        let cache: TtlCache<u32, u32> = TtlCache::new(Duration::from_secs(60), 2);
        cache.insert(1, 1).await;
        advance(Duration::from_secs(1)).await;
        cache.insert(2, 2).await;
        advance(Duration::from_secs(1)).await;
        cache.insert(3, 3).await;

        assert_eq!(cache.get(&1).await, None);
        assert_eq!(cache.get(&2).await, Some(2));
        assert_eq!(cache.get(&3).await, Some(3));
    }

    #[tokio::test]
    async fn invalidate_removes_single_entry() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(60), 16);
        cache.insert("a", 1).await;
        cache.insert("b", 2).await;

        assert!(cache.invalidate(&"a").await);
        assert!(!cache.invalidate(&"a").await);
        assert_eq!(cache.get(&"a").await, None);
        assert_eq!(cache.get(&"b").await, Some(2));
    }
}
