//! # One declared service-method invocation.
//!
//! [`MethodCall`] is what a generated wrapper (or a hand-written one) hands
//! to [`Runtime::invoke`](crate::Runtime::invoke): the call id, where and
//! how to run the work, whether and how to cache the result, and what to do
//! with failures.
//!
//! The query id doubles as the default cache key, in the original
//! `"Service.method({args})"` shape, so repeated calls with the same
//! arguments correlate their cached and fresh deliveries.
//!
//! ## Example
//! ```rust,no_run
//! use std::time::Duration;
//! use taskbus::{CachePlan, MethodCall, Usage};
//!
//! #[derive(serde::Serialize, serde::Deserialize, Clone)]
//! struct User { id: u64 }
//!
//! let call = MethodCall::new("UserService.get_user({3})", || {
//!     Ok::<_, std::io::Error>(User { id: 3 })
//! })
//! .with_serial("users")
//! .with_cache(CachePlan::new(Usage::RenewAfterDelivery).with_validity(Duration::ZERO));
//! ```

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::bus::ListenerId;
use crate::cache::{CacheStore, Usage};
use crate::mapping::ErrorPolicy;
use crate::ui::Affinity;

pub(crate) type ReadFn<T> = fn(&CacheStore, &str) -> Option<T>;
pub(crate) type WriteFn<T> = fn(&CacheStore, &str, &T, Duration);

/// How one call uses the cache.
#[derive(Clone, Debug)]
pub struct CachePlan {
    pub(crate) key: Option<Cow<'static, str>>,
    pub(crate) validity: Duration,
    pub(crate) usage: Usage,
}

impl CachePlan {
    pub fn new(usage: Usage) -> Self {
        Self {
            key: None,
            validity: Duration::ZERO,
            usage,
        }
    }

    /// Overrides the cache key; defaults to the call's query id.
    #[inline]
    pub fn with_key(mut self, key: impl Into<Cow<'static, str>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// How long a stored value stays valid. Zero means forever.
    #[inline]
    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }
}

impl Default for CachePlan {
    fn default() -> Self {
        Self::new(Usage::RenewAfterDelivery)
    }
}

/// Cache plan bound to the payload type's serialization, captured where the
/// type is still known.
pub(crate) struct CacheBinding<T> {
    pub(crate) plan: CachePlan,
    pub(crate) read: ReadFn<T>,
    pub(crate) write: WriteFn<T>,
}

/// A service-method invocation ready for [`Runtime::invoke`](crate::Runtime::invoke).
pub struct MethodCall<T, E> {
    pub(crate) query: Arc<str>,
    pub(crate) serial: Option<Arc<str>>,
    pub(crate) affinity: Affinity,
    pub(crate) emitter: Option<ListenerId>,
    pub(crate) errors: Option<ErrorPolicy>,
    pub(crate) cache: Option<CacheBinding<T>>,
    #[allow(clippy::type_complexity)]
    pub(crate) work: Box<dyn FnOnce() -> Result<T, E> + Send + 'static>,
}

impl<T, E> MethodCall<T, E>
where
    T: Send + Sync + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    /// Describes a call: its correlation id and the work that computes the
    /// result. Everything else defaults: the runtime's default serial key,
    /// background affinity, no cache, no emitter, no error policy.
    pub fn new(
        query: impl Into<Arc<str>>,
        work: impl FnOnce() -> Result<T, E> + Send + 'static,
    ) -> Self {
        Self {
            query: query.into(),
            serial: None,
            affinity: Affinity::Background,
            emitter: None,
            errors: None,
            cache: None,
            work: Box::new(work),
        }
    }

    /// Names the serialization key this call runs under.
    #[inline]
    pub fn with_serial(mut self, serial: impl Into<Arc<str>>) -> Self {
        self.serial = Some(serial.into());
        self
    }

    /// Runs the work on the UI loop instead of the worker pool.
    #[inline]
    pub fn on_ui(mut self) -> Self {
        self.affinity = Affinity::Ui;
        self
    }

    /// Scopes resulting messages to `emitter`, so self-scoped handlers of
    /// that listener receive them.
    #[inline]
    pub fn with_emitter(mut self, emitter: ListenerId) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Installs the error mapping for this call. Push call-level cases
    /// before service-level ones; first match by code wins.
    #[inline]
    pub fn with_errors(mut self, errors: ErrorPolicy) -> Self {
        self.errors = Some(errors);
        self
    }
}

impl<T, E> MethodCall<T, E>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    /// Caches the result per `plan`. Requires a serializable payload; the
    /// serialization hooks are captured here so the rest of the pipeline
    /// stays type-erased.
    pub fn with_cache(mut self, plan: CachePlan) -> Self {
        self.cache = Some(CacheBinding {
            plan,
            read: |store, key| store.get::<T>(key),
            write: |store, key, value, validity| store.put(key, value, validity),
        });
        self
    }
}
