//! # Byte-level cache backend boundary.
//!
//! A backend is any key/value engine that can hold serialized entries: an
//! on-disk store in a real application, [`MemoryBackend`] by default. The
//! backend may fail on I/O or corruption; [`CacheStore`](crate::CacheStore)
//! catches every such failure, logs it, and treats it as absence.

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

/// Failure inside a cache backend. Never escapes the cache layer.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BackendError {
    /// The engine could not complete the operation.
    #[error("backend i/o failure: {0}")]
    Io(String),
    /// The engine returned bytes it considers damaged.
    #[error("backend reports corruption: {0}")]
    Corrupt(String),
}

/// Key/bytes contract for cache persistence engines.
pub trait CacheBackend: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError>;

    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), BackendError>;

    fn delete(&self, key: &str) -> Result<(), BackendError>;

    fn exists(&self, key: &str) -> Result<bool, BackendError>;

    /// Drops every entry.
    fn clear(&self) -> Result<(), BackendError>;
}

/// In-process backend over a locked map. The default.
#[derive(Default)]
pub struct MemoryBackend {
    map: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        let map = self.map.read().unwrap_or_else(|e| e.into_inner());
        Ok(map.get(key).cloned())
    }

    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), BackendError> {
        let mut map = self.map.write().unwrap_or_else(|e| e.into_inner());
        map.insert(key.to_string(), bytes);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), BackendError> {
        let mut map = self.map.write().unwrap_or_else(|e| e.into_inner());
        map.remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool, BackendError> {
        let map = self.map.read().unwrap_or_else(|e| e.into_inner());
        Ok(map.contains_key(key))
    }

    fn clear(&self) -> Result<(), BackendError> {
        let mut map = self.map.write().unwrap_or_else(|e| e.into_inner());
        map.clear();
        Ok(())
    }
}
