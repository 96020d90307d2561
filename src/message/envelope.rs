//! # Type-erased dispatch form of a message.
//!
//! [`Envelope`] is what actually travels through the bus: the payload behind
//! `Arc<dyn Any>`, its [`TypeId`] for subscription matching, and the delivery
//! metadata copied from the originating [`Message`]. Handlers registered for
//! a concrete payload type downcast through [`Envelope::payload_ref`].
//!
//! Erasing at the dispatch boundary keeps the subscription table a plain
//! compile-time-built map from payload type to handlers; no runtime type
//! lookup beyond a `TypeId` comparison.

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::bus::ListenerId;
use crate::message::Message;

/// A message with its payload type erased for fan-out.
#[derive(Clone)]
pub struct Envelope {
    payload: Arc<dyn Any + Send + Sync>,
    payload_type: TypeId,
    payload_type_name: &'static str,
    cached: bool,
    query: Option<Arc<str>>,
    emitter: Option<ListenerId>,
}

impl Envelope {
    /// True if the payload is a `T`.
    pub fn payload_is<T: Send + Sync + 'static>(&self) -> bool {
        self.payload_type == TypeId::of::<T>()
    }

    /// Borrows the payload as a `T`, if that is what it is.
    pub fn payload_ref<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    pub(crate) fn payload_type(&self) -> TypeId {
        self.payload_type
    }

    /// Payload type name, for logs.
    pub fn payload_type_name(&self) -> &'static str {
        self.payload_type_name
    }

    pub fn is_cached(&self) -> bool {
        self.cached
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub(crate) fn query_arc(&self) -> Option<Arc<str>> {
        self.query.clone()
    }

    pub fn emitter(&self) -> Option<ListenerId> {
        self.emitter
    }

    /// Stamps the emitter identity if none was set at construction.
    pub(crate) fn or_emitter(mut self, emitter: Option<ListenerId>) -> Self {
        if self.emitter.is_none() {
            self.emitter = emitter;
        }
        self
    }
}

impl<T: Send + Sync + 'static> From<Message<T>> for Envelope {
    fn from(message: Message<T>) -> Self {
        let (payload, cached, query, emitter) = message.into_parts();
        Self {
            payload: Arc::new(payload),
            payload_type: TypeId::of::<T>(),
            payload_type_name: std::any::type_name::<T>(),
            cached,
            query,
            emitter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downcast_matches_declared_type() {
        let env = Envelope::from(Message::new(42u64).with_query("q"));
        assert!(env.payload_is::<u64>());
        assert!(!env.payload_is::<u32>());
        assert_eq!(env.payload_ref::<u64>(), Some(&42));
        assert_eq!(env.query(), Some("q"));
    }
}
