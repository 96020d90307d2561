//! Cache overlay: TTL and usage policy over a byte-level backend.
//!
//! ## Contents
//! - [`CacheStore`] typed put/get with a timestamped envelope, TTL checks,
//!   and self-healing eviction on corruption
//! - [`CacheBackend`] the key/bytes boundary a persistent engine implements
//! - [`MemoryBackend`] default in-process backend
//! - [`Usage`] how a stale hit interacts with recomputation
//!
//! ## Quick reference
//! - Backend failures and deserialization failures are never propagated;
//!   both read as absence (the latter also evicts the entry).
//! - A value returned by [`CacheStore::get`] is never older than the
//!   validity window it was stored with.

mod backend;
mod store;

pub use backend::{BackendError, CacheBackend, MemoryBackend};
pub use store::{CacheStore, Usage};
