//! # Typed result message.
//!
//! [`Message`] pairs an immutable payload with the metadata the dispatch
//! layer needs: whether the value came from the cache, which query produced
//! it, and which listener identity emitted it.
//!
//! ## Rules
//! - `cached` moves in one direction only: false → true, via [`Message::cached`].
//! - `query` and `emitter` are set once, at the dispatch origin.
//! - The payload itself is never mutated by the runtime.
//!
//! ## Example
//! ```rust
//! use taskbus::Message;
//!
//! #[derive(Clone)]
//! struct UserLoaded { name: String }
//!
//! let msg = Message::new(UserLoaded { name: "joan".into() })
//!     .with_query("UserService.get_user({3})");
//!
//! assert!(!msg.is_cached());
//! assert_eq!(msg.query(), Some("UserService.get_user({3})"));
//! ```

use std::sync::Arc;

use crate::bus::ListenerId;

/// A result value on its way to interested listeners.
pub struct Message<T> {
    payload: T,
    cached: bool,
    query: Option<Arc<str>>,
    emitter: Option<ListenerId>,
}

impl<T: Send + Sync + 'static> Message<T> {
    /// Wraps a payload with no metadata attached yet.
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            cached: false,
            query: None,
            emitter: None,
        }
    }

    /// Marks this message as served from the cache.
    #[inline]
    pub fn cached(mut self) -> Self {
        self.cached = true;
        self
    }

    /// Attaches the correlation id of the call that produced this message.
    #[inline]
    pub fn with_query(mut self, query: impl Into<Arc<str>>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Attaches the identity the message is scoped to.
    #[inline]
    pub fn with_emitter(mut self, emitter: ListenerId) -> Self {
        self.emitter = Some(emitter);
        self
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    pub fn is_cached(&self) -> bool {
        self.cached
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn emitter(&self) -> Option<ListenerId> {
        self.emitter
    }

    pub(crate) fn into_parts(self) -> (T, bool, Option<Arc<str>>, Option<ListenerId>) {
        (self.payload, self.cached, self.query, self.emitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_flag_is_one_way() {
        let msg = Message::new(7u32);
        assert!(!msg.is_cached());
        let msg = msg.cached();
        assert!(msg.is_cached());
    }

    #[test]
    fn test_metadata_round_trip() {
        let msg = Message::new("payload").with_query("Svc.m({1})");
        assert_eq!(msg.query(), Some("Svc.m({1})"));
        assert_eq!(msg.emitter(), None);
        assert_eq!(*msg.payload(), "payload");
    }
}
