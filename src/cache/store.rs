//! # Typed cache store with TTL and self-healing reads.
//!
//! [`CacheStore`] serializes values into a timestamped envelope and keeps
//! them in a [`CacheBackend`](crate::CacheBackend). Reads check the validity
//! window recorded at write time; anything expired, damaged, or unreadable
//! is evicted and reported as absent. No failure on this path is ever
//! surfaced to the caller.
//!
//! ## Rules
//! - `put` overwrites unconditionally and records the current time.
//! - `get` returns a value only if it is present, within validity, and still
//!   deserializes as the requested type. Schema drift evicts the entry
//!   instead of surfacing a type error.
//! - `remove` / `clear` never fail audibly; backend errors are logged and
//!   swallowed.
//! - Two tasks racing `get`-then-`put` on one key may interleave; last write
//!   wins. Individual calls are atomic, sequences are not.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::cache::backend::{CacheBackend, MemoryBackend};

/// How a stale cache hit interacts with recomputation. Consumed by the
/// call orchestration layer; the store itself only reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Usage {
    /// Serve the stale value immediately if present, then recompute and
    /// overwrite regardless.
    #[default]
    RenewAfterDelivery,
    /// Serve the stale value and skip recomputation while it is still
    /// within validity; recompute only once expired.
    FreshOnly,
}

/// Serialized entry envelope: payload plus the data TTL checks need.
#[derive(Serialize, Deserialize)]
struct Entry {
    written_ms: u64,
    validity_ms: u64,
    value: serde_json::Value,
}

/// Key-to-serialized-value map with TTL awareness.
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Store backed by an in-process map.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Upserts `value` under `key`, recording the current time as the write
    /// timestamp. `validity` of zero means the entry never expires.
    pub fn put<T: Serialize>(&self, key: &str, value: &T, validity: Duration) {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(err) => {
                tracing::warn!(key, %err, "unable to serialize value for cache");
                return;
            }
        };
        let entry = Entry {
            written_ms: epoch_ms(),
            validity_ms: validity.as_millis().min(u128::from(u64::MAX)) as u64,
            value,
        };
        let bytes = match serde_json::to_vec(&entry) {
            Ok(b) => b,
            Err(err) => {
                tracing::warn!(key, %err, "unable to encode cache entry");
                return;
            }
        };
        if let Err(err) = self.backend.put(key, bytes) {
            tracing::warn!(key, %err, "unable to store value in cache");
        }
    }

    /// Returns the value at `key` if present, within validity, and readable
    /// as `T`; otherwise absent.
    ///
    /// An entry that fails to decode (schema drift since it was written) is
    /// removed so the next call recomputes instead of tripping on it again.
    /// Expired entries are evicted the same way.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = match self.backend.get(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(key, %err, "cache read failed; treating as absent");
                return None;
            }
        };

        let entry: Entry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(key, %err, "damaged cache entry; evicting");
                self.remove(key);
                return None;
            }
        };

        if entry.validity_ms != 0 && epoch_ms().saturating_sub(entry.written_ms) > entry.validity_ms
        {
            tracing::debug!(key, "cache entry expired; evicting");
            self.remove(key);
            return None;
        }

        match serde_json::from_value(entry.value) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key, %err, "cache entry no longer matches requested type; evicting");
                self.remove(key);
                None
            }
        }
    }

    /// True if the backend holds bytes for `key`. Does not check validity.
    pub fn contains(&self, key: &str) -> bool {
        match self.backend.exists(key) {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(key, %err, "cache existence check failed");
                false
            }
        }
    }

    /// Removes the entry at `key`, if any.
    pub fn remove(&self, key: &str) {
        if let Err(err) = self.backend.delete(key) {
            tracing::warn!(key, %err, "cache delete failed");
        }
    }

    /// Removes every entry.
    pub fn clear(&self) {
        if let Err(err) = self.backend.clear() {
            tracing::warn!(%err, "cache clear failed");
        }
    }
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().min(u128::from(u64::MAX)) as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::backend::BackendError;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct User {
        id: u64,
        name: String,
    }

    fn user(id: u64) -> User {
        User {
            id,
            name: format!("user-{id}"),
        }
    }

    #[test]
    fn test_round_trip() {
        let store = CacheStore::in_memory();
        store.put("users/3", &user(3), Duration::ZERO);
        assert_eq!(store.get::<User>("users/3"), Some(user(3)));

        store.remove("users/3");
        assert_eq!(store.get::<User>("users/3"), None);
    }

    #[test]
    fn test_put_overwrites_unconditionally() {
        let store = CacheStore::in_memory();
        store.put("k", &user(1), Duration::ZERO);
        store.put("k", &user(2), Duration::ZERO);
        assert_eq!(store.get::<User>("k"), Some(user(2)));
    }

    #[test]
    fn test_expired_entry_reads_absent_even_though_backend_holds_bytes() {
        let backend = Arc::new(MemoryBackend::new());
        let store = CacheStore::new(backend.clone());
        store.put("k", &user(1), Duration::from_millis(20));

        std::thread::sleep(Duration::from_millis(40));
        assert!(backend.exists("k").unwrap());
        assert_eq!(store.get::<User>("k"), None);
        // Expiry also evicts.
        assert!(!backend.exists("k").unwrap());
    }

    #[test]
    fn test_zero_validity_never_expires() {
        let store = CacheStore::in_memory();
        store.put("k", &user(1), Duration::ZERO);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(store.get::<User>("k"), Some(user(1)));
    }

    #[test]
    fn test_schema_drift_evicts_and_reads_absent() {
        #[derive(Serialize, Deserialize, Debug, PartialEq)]
        struct Renamed {
            label: String,
        }

        let backend = Arc::new(MemoryBackend::new());
        let store = CacheStore::new(backend.clone());
        store.put("k", &user(1), Duration::ZERO);

        assert_eq!(store.get::<Renamed>("k"), None);
        assert!(!backend.exists("k").unwrap(), "drifted entry not evicted");
    }

    #[test]
    fn test_damaged_bytes_evict_and_read_absent() {
        let backend = Arc::new(MemoryBackend::new());
        let store = CacheStore::new(backend.clone());
        backend.put("k", b"not an envelope".to_vec()).unwrap();

        assert_eq!(store.get::<User>("k"), None);
        assert!(!backend.exists("k").unwrap());
    }

    #[test]
    fn test_clear_removes_everything() {
        let store = CacheStore::in_memory();
        store.put("a", &user(1), Duration::ZERO);
        store.put("b", &user(2), Duration::ZERO);
        store.clear();
        assert_eq!(store.get::<User>("a"), None);
        assert_eq!(store.get::<User>("b"), None);
    }

    struct FailingBackend;

    impl CacheBackend for FailingBackend {
        fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, BackendError> {
            Err(BackendError::Io("disk on fire".into()))
        }
        fn put(&self, _key: &str, _bytes: Vec<u8>) -> Result<(), BackendError> {
            Err(BackendError::Io("disk on fire".into()))
        }
        fn delete(&self, _key: &str) -> Result<(), BackendError> {
            Err(BackendError::Io("disk on fire".into()))
        }
        fn exists(&self, _key: &str) -> Result<bool, BackendError> {
            Err(BackendError::Io("disk on fire".into()))
        }
        fn clear(&self) -> Result<(), BackendError> {
            Err(BackendError::Io("disk on fire".into()))
        }
    }

    #[test]
    fn test_backend_failures_read_as_absence_and_never_panic() {
        let store = CacheStore::new(Arc::new(FailingBackend));
        store.put("k", &user(1), Duration::ZERO);
        assert_eq!(store.get::<User>("k"), None);
        assert!(!store.contains("k"));
        store.remove("k");
        store.clear();
    }
}
