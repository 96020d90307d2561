//! # Declared listener interest.
//!
//! A listener type describes what it wants to receive by filling a
//! [`HandlerSet`] in its [`Listener::interests`] implementation: one
//! [`HandlerSet::on`] (or [`HandlerSet::on_with`]) call per handler. The set
//! is the listener's dispatch table, built from plain typed closures at
//! registration time; there is no runtime lookup beyond a `TypeId` match.
//!
//! ## Example
//! ```rust
//! use std::sync::Mutex;
//! use taskbus::{Delivery, HandlerSet, Interest, Listener, Scope};
//!
//! struct UserView {
//!     names: Mutex<Vec<String>>,
//! }
//!
//! #[derive(Clone)]
//! struct UserLoaded { name: String }
//!
//! impl Listener for UserView {
//!     fn interests(handlers: &mut HandlerSet<Self>) {
//!         handlers.on_with(
//!             Interest::new().with_scope(Scope::Any),
//!             |view: &UserView, loaded: Delivery<'_, UserLoaded>| {
//!                 view.names.lock().unwrap().push(loaded.payload().name.clone());
//!             },
//!         );
//!     }
//! }
//! ```

use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::bus::subscription::{AnyTarget, ErasedHandler, Interest, Priority, Scope};
use crate::message::Envelope;
use crate::ui::Affinity;

/// An object that receives dispatched results.
///
/// Implementations declare their handlers once, per type; every registered
/// instance of the type gets the same subscription set.
pub trait Listener: Send + Sync + 'static {
    /// Declares this type's handlers. Called by
    /// [`Bus::register`](crate::Bus::register); an implementation that adds
    /// no handlers makes registration fail fast.
    fn interests(handlers: &mut HandlerSet<Self>)
    where
        Self: Sized;

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A delivered payload together with its visible metadata.
pub struct Delivery<'a, T> {
    pub(crate) payload: &'a T,
    pub(crate) cached: bool,
    pub(crate) query: Option<&'a str>,
}

impl<'a, T> Delivery<'a, T> {
    pub fn payload(&self) -> &'a T {
        self.payload
    }

    /// True if this value was served from the cache rather than computed.
    pub fn is_cached(&self) -> bool {
        self.cached
    }

    /// Correlation id of the call that produced this value, if any.
    pub fn query(&self) -> Option<&'a str> {
        self.query
    }
}

/// One declared handler, before it is bound to a listener instance.
pub(crate) struct DeclaredHandler {
    pub(crate) accepts: TypeId,
    pub(crate) scope: Scope,
    pub(crate) priority: Priority,
    pub(crate) affinity: Affinity,
    pub(crate) handler: ErasedHandler,
}

/// Collects the handlers a listener type declares.
pub struct HandlerSet<L: ?Sized> {
    handlers: Vec<DeclaredHandler>,
    _listener: PhantomData<fn(&L)>,
}

impl<L: Listener> HandlerSet<L> {
    pub(crate) fn new() -> Self {
        Self {
            handlers: Vec::new(),
            _listener: PhantomData,
        }
    }

    /// Declares a handler for payload type `T` with default delivery rules
    /// (self-scoped, first phase, background).
    pub fn on<T, F>(&mut self, handler: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: for<'a> Fn(&'a L, Delivery<'a, T>) + Send + Sync + 'static,
    {
        self.on_with(Interest::new(), handler)
    }

    /// Declares a handler for payload type `T` with explicit delivery rules.
    pub fn on_with<T, F>(&mut self, interest: Interest, handler: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: for<'a> Fn(&'a L, Delivery<'a, T>) + Send + Sync + 'static,
    {
        let erased: ErasedHandler = Arc::new(move |target: &AnyTarget, envelope: &Envelope| {
            let (Some(listener), Some(payload)) =
                (target.downcast_ref::<L>(), envelope.payload_ref::<T>())
            else {
                return;
            };
            handler(
                listener,
                Delivery {
                    payload,
                    cached: envelope.is_cached(),
                    query: envelope.query(),
                },
            );
        });
        self.handlers.push(DeclaredHandler {
            accepts: TypeId::of::<T>(),
            scope: interest.scope,
            priority: interest.priority,
            affinity: interest.affinity,
            handler: erased,
        });
        self
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub(crate) fn into_handlers(self) -> Vec<DeclaredHandler> {
        self.handlers
    }
}
