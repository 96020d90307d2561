//! # Subscription records and their delivery rules.
//!
//! A [`Subscription`] binds one declared handler of a listener to the rules
//! the bus applies when fanning out: which payload type it accepts, whether
//! it hears everyone or only its own service calls, which broadcast phase it
//! runs in, and which thread it runs on.

use std::any::{Any, TypeId};
use std::sync::{Arc, Weak};

use crate::message::Envelope;
use crate::ui::Affinity;

/// Identity of a registered listener, used for emitter scoping and
/// per-listener delivery bookkeeping. Never reused within one bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// Which emitters a handler accepts messages from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    /// Only messages emitted on behalf of this listener.
    #[default]
    SelfOnly,
    /// Messages from any emitter, including none.
    Any,
}

/// Broadcast phase. Every `First` match across all subscriptions is invoked
/// before any `Last` match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    #[default]
    First,
    Last,
}

/// Delivery rules for one declared handler.
///
/// Defaults mirror the common case: self-scoped, first phase, invoked on
/// the dispatching worker.
#[derive(Debug, Clone, Copy, Default)]
pub struct Interest {
    pub scope: Scope,
    pub priority: Priority,
    pub affinity: Affinity,
}

impl Interest {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    #[inline]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[inline]
    pub fn with_affinity(mut self, affinity: Affinity) -> Self {
        self.affinity = affinity;
        self
    }
}

pub(crate) type AnyTarget = Arc<dyn Any + Send + Sync>;
pub(crate) type WeakTarget = Weak<dyn Any + Send + Sync>;

/// Erased handler: upgraded target plus the envelope it may care about.
pub(crate) type ErasedHandler = Arc<dyn Fn(&AnyTarget, &Envelope) + Send + Sync>;

/// One registered handler of one listener instance.
pub(crate) struct Subscription {
    pub(crate) listener: ListenerId,
    pub(crate) target: WeakTarget,
    pub(crate) accepts: TypeId,
    pub(crate) scope: Scope,
    pub(crate) priority: Priority,
    pub(crate) affinity: Affinity,
    pub(crate) handler: ErasedHandler,
}
