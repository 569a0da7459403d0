//! Host key/value stores backing the shared-memory cache.
//!
//! [`SharedStore`] is the set of primitives the shared-memory backend relies
//! on. Basic stores only fetch, store and delete; stores that also report
//! per-key metadata advertise it through `supports_introspection`.

use super::traits::EntryInfo;
use crate::error::{Result, StowageError};
use chrono::{DateTime, Utc};
use mini_moka::sync::Cache;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Primitives of a process or host-wide key/value store.
pub trait SharedStore: Send + Sync {
    /// Fetch the bytes stored under `key`.
    fn fetch(&self, key: &str) -> Option<Vec<u8>>;

    /// Store `value` under `key`, expiring after `ttl` seconds (0 = never).
    fn store(&self, key: &str, value: Vec<u8>, ttl: u64) -> bool;

    /// Delete `key`. Returns `false` if it was not present.
    fn delete(&self, key: &str) -> bool;

    /// Delete every key of the store, whoever wrote it.
    fn clear(&self) -> bool;

    /// Whether `cache_info` and `key_info` are available.
    fn supports_introspection(&self) -> bool {
        false
    }

    /// Metadata of every live key.
    fn cache_info(&self) -> Result<Vec<EntryInfo>> {
        Err(StowageError::unsupported("cache enumeration"))
    }

    /// Metadata of one key, `None` if absent.
    fn key_info(&self, _key: &str) -> Result<Option<EntryInfo>> {
        Err(StowageError::unsupported("key introspection"))
    }
}

/// A stored value with the bookkeeping reported by introspection.
#[derive(Debug)]
struct StoredValue {
    data: Vec<u8>,
    ttl: u64,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    hits: AtomicU64,
    accessed_at_ms: AtomicI64,
}

impl StoredValue {
    fn new(data: Vec<u8>, ttl: u64, now: DateTime<Utc>) -> Self {
        // A TTL too large to represent never expires
        let expires_at = (ttl > 0)
            .then(|| {
                i64::try_from(ttl)
                    .ok()
                    .and_then(chrono::Duration::try_seconds)
                    .and_then(|ttl| now.checked_add_signed(ttl))
            })
            .flatten();
        Self {
            data,
            ttl,
            created_at: now,
            expires_at,
            hits: AtomicU64::new(0),
            accessed_at_ms: AtomicI64::new(now.timestamp_millis()),
        }
    }

    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    fn record_hit(&self, now: DateTime<Utc>) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.accessed_at_ms
            .store(now.timestamp_millis(), Ordering::Relaxed);
    }

    fn info(&self, key: &str) -> EntryInfo {
        EntryInfo {
            key: key.to_string(),
            size: (key.len() + self.data.len()) as u64,
            hits: Some(self.hits.load(Ordering::Relaxed)),
            ttl: Some(self.ttl),
            created_at: Some(self.created_at),
            modified_at: Some(self.created_at),
            accessed_at: DateTime::<Utc>::from_timestamp_millis(
                self.accessed_at_ms.load(Ordering::Relaxed),
            ),
        }
    }
}

/// In-process shared store with per-key TTL and full introspection.
///
/// The store is unbounded: entries only go away when their TTL passes or
/// when they are deleted. Clones of the surrounding `Arc` see the same
/// entries, so one instance shared by every handle behaves as the
/// process-wide store.
pub struct MemoryStore {
    entries: Cache<String, Arc<StoredValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Cache::builder().build(),
        }
    }

    /// Live value under `key`, dropping it if its TTL has passed.
    fn live(&self, key: &str, now: DateTime<Utc>) -> Option<Arc<StoredValue>> {
        let key = key.to_string();
        let value = self.entries.get(&key)?;
        if value.is_expired_at(now) {
            debug!("Shared key {} expired", key);
            self.entries.invalidate(&key);
            return None;
        }
        Some(value)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedStore for MemoryStore {
    fn fetch(&self, key: &str) -> Option<Vec<u8>> {
        let now = Utc::now();
        let value = self.live(key, now)?;
        value.record_hit(now);
        Some(value.data.clone())
    }

    fn store(&self, key: &str, value: Vec<u8>, ttl: u64) -> bool {
        self.entries.insert(
            key.to_string(),
            Arc::new(StoredValue::new(value, ttl, Utc::now())),
        );
        true
    }

    fn delete(&self, key: &str) -> bool {
        let existed = self.live(key, Utc::now()).is_some();
        self.entries.invalidate(&key.to_string());
        existed
    }

    fn clear(&self) -> bool {
        self.entries.invalidate_all();
        debug!("Cleared shared store");
        true
    }

    fn supports_introspection(&self) -> bool {
        true
    }

    fn cache_info(&self) -> Result<Vec<EntryInfo>> {
        let now = Utc::now();
        let candidates: Vec<(String, Arc<StoredValue>)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        // Entries dropped by `invalidate_all` stay in the map until the next
        // maintenance run; `contains_key` skips them
        let mut infos: Vec<EntryInfo> = candidates
            .into_iter()
            .filter(|(key, value)| !value.is_expired_at(now) && self.entries.contains_key(key))
            .map(|(key, value)| value.info(&key))
            .collect();
        infos.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(infos)
    }

    fn key_info(&self, key: &str) -> Result<Option<EntryInfo>> {
        Ok(self.live(key, Utc::now()).map(|value| value.info(key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_fetch() {
        let store = MemoryStore::new();
        assert!(store.store("report.q1", b"42".to_vec(), 0));
        assert_eq!(store.fetch("report.q1"), Some(b"42".to_vec()));
        assert_eq!(store.fetch("report.q2"), None);
    }

    #[test]
    fn test_delete() {
        let store = MemoryStore::new();
        store.store("a", b"1".to_vec(), 0);
        assert!(store.delete("a"));
        assert!(!store.delete("a"));
        assert_eq!(store.fetch("a"), None);
    }

    #[test]
    fn test_hits_and_size() {
        let store = MemoryStore::new();
        store.store("views.home", b"hello".to_vec(), 300);
        store.fetch("views.home");
        store.fetch("views.home");

        let info = store.key_info("views.home").unwrap().unwrap();
        assert_eq!(info.hits, Some(2));
        assert_eq!(info.size, ("views.home".len() + 5) as u64);
        assert_eq!(info.ttl, Some(300));
        assert!(info.created_at.is_some());
        assert!(info.accessed_at.is_some());

        assert_eq!(store.key_info("missing").unwrap(), None);
    }

    #[test]
    fn test_overwrite_resets_hits() {
        let store = MemoryStore::new();
        store.store("k", b"1".to_vec(), 0);
        store.fetch("k");
        store.store("k", b"2".to_vec(), 0);
        assert_eq!(store.key_info("k").unwrap().unwrap().hits, Some(0));
        assert_eq!(store.fetch("k"), Some(b"2".to_vec()));
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let value = StoredValue::new(b"x".to_vec(), 10, now);
        assert!(!value.is_expired_at(now + chrono::Duration::seconds(9)));
        assert!(value.is_expired_at(now + chrono::Duration::seconds(10)));

        let forever = StoredValue::new(b"x".to_vec(), 0, now);
        assert!(!forever.is_expired_at(now + chrono::Duration::days(3650)));
    }

    #[test]
    fn test_cache_info_sorted() {
        let store = MemoryStore::new();
        store.store("b.two", b"2".to_vec(), 0);
        store.store("a.one", b"1".to_vec(), 0);

        let keys: Vec<String> = store
            .cache_info()
            .unwrap()
            .into_iter()
            .map(|info| info.key)
            .collect();
        assert_eq!(keys, vec!["a.one".to_string(), "b.two".to_string()]);
    }

    #[test]
    fn test_unbounded_store_keeps_every_key() {
        let store = MemoryStore::new();
        for i in 0..100 {
            let key = format!("hot.{i}");
            store.store(&key, b"1".to_vec(), 0);
            for _ in 0..3 {
                assert!(store.fetch(&key).is_some());
            }
        }

        for i in 0..20_000 {
            let key = format!("cold.{i}");
            assert!(store.store(&key, i.to_string().into_bytes(), 0));
            assert_eq!(store.fetch(&key), Some(i.to_string().into_bytes()));
        }
        for i in 0..100 {
            assert!(store.fetch(&format!("hot.{i}")).is_some());
        }
        assert_eq!(store.cache_info().unwrap().len(), 20_100);
    }

    #[test]
    fn test_clear() {
        let store = MemoryStore::new();
        store.store("a", b"1".to_vec(), 0);
        store.store("b", b"2".to_vec(), 0);

        assert!(store.clear());
        assert_eq!(store.fetch("a"), None);
        assert!(store.cache_info().unwrap().is_empty());

        // Usable after a clear
        store.store("c", b"3".to_vec(), 0);
        assert_eq!(store.fetch("c"), Some(b"3".to_vec()));
    }
}
