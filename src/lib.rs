//! # taskbus
//!
//! **Taskbus** turns synchronous, possibly slow "service methods" into
//! asynchronously executed, optionally cached, result-dispatching
//! operations with listener lifecycle safety.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  caller (a view, a controller, any object that registered as a listener)
//!     │
//!     ▼
//!  Runtime::invoke(MethodCall) ──────────────────────────────┐
//!     │                                                      │
//!     ├─► CacheStore::get (stale probe, if the call caches)  │
//!     │        │ hit                                         │
//!     │        ▼                                             │
//!     │   Bus::dispatch(cached Message)                      │
//!     │                                                      ▼
//!     └─► Scheduler::submit(serial key) ──► [SerialQueue] ──► work()
//!                                                              │
//!                         ┌────────────────────────────────────┤
//!                         ▼ Ok                                 ▼ Err
//!              CacheStore::put (if caching)          ErrorPolicy::resolve
//!                         │                             │           │
//!                         ▼                             ▼ match     ▼ skip/miss
//!              Bus::dispatch(fresh Message)   Bus::dispatch(error)  Fallback
//!                         │
//!                         ▼
//!        per subscription: liveness sweep → type/scope/freshness
//!        gates → handler (direct, or posted to the UI loop)
//! ```
//!
//! ### Guarantees
//! - Tasks sharing a serial key run strictly in submission order, never
//!   overlapping; different keys run concurrently on the worker pool.
//! - Per listener and query id, a cached message is never observed after
//!   the fresh message for the same query.
//! - A listener that is dropped stops receiving messages on the next
//!   dispatch, with or without an explicit unregister.
//! - Failures inside submitted work never reach the submitter: they become
//!   mapped error messages, or they land in the fallback handler.
//!
//! ## Features
//! | Area             | Description                                              | Key types / traits                    |
//! |------------------|----------------------------------------------------------|---------------------------------------|
//! | **Calls**        | Describe and launch one service-method invocation.       | [`MethodCall`], [`CachePlan`], [`Runtime`] |
//! | **Scheduling**   | Per-key serialized background work, UI-affinity posting. | [`Scheduler`], [`Affinity`], [`UiPost`] |
//! | **Caching**      | TTL-aware typed overlay on a byte backend.               | [`CacheStore`], [`CacheBackend`], [`Usage`] |
//! | **Delivery**     | Typed handlers, scoping, two-phase broadcast, sweeping.  | [`Bus`], [`Listener`], [`HandlerSet`] |
//! | **Error mapping**| Declarative failure-to-message pipeline.                 | [`ErrorMapper`], [`ErrorPolicy`], [`Fallback`] |
//!
//! ## Example
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use taskbus::{
//!     CachePlan, Delivery, HandlerSet, Interest, Listener, MethodCall, Runtime, Scope, Usage,
//! };
//!
//! #[derive(serde::Serialize, serde::Deserialize, Clone, Debug)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! struct UserView {
//!     lines: Mutex<Vec<String>>,
//! }
//!
//! impl Listener for UserView {
//!     fn interests(handlers: &mut HandlerSet<Self>) {
//!         handlers.on_with(
//!             Interest::new().with_scope(Scope::Any),
//!             |view: &UserView, user: Delivery<'_, User>| {
//!                 view.lines.lock().unwrap().push(user.payload().name.clone());
//!             },
//!         );
//!     }
//! }
//!
//! #[tokio::main(flavor = "multi_thread")]
//! async fn main() {
//!     let runtime = Runtime::builder().build();
//!
//!     let view = Arc::new(UserView { lines: Mutex::new(Vec::new()) });
//!     runtime.bus().register(&view).expect("listener declares handlers");
//!
//!     runtime.invoke(
//!         MethodCall::new("UserService.get_user({3})", || {
//!             // slow lookup...
//!             Ok::<_, std::io::Error>(User { id: 3, name: "Joan".into() })
//!         })
//!         .with_cache(CachePlan::new(Usage::RenewAfterDelivery)),
//!     );
//!
//!     tokio::time::sleep(std::time::Duration::from_millis(250)).await;
//!     assert_eq!(*view.lines.lock().unwrap(), vec!["Joan".to_string()]);
//!     runtime.shutdown();
//! }
//! ```

mod bus;
mod cache;
mod config;
mod error;
mod mapping;
mod message;
mod runtime;
mod scheduler;
mod ui;

// ---- Public re-exports ----

pub use bus::{
    Bus, Delivery, HandlerSet, Interest, Listener, ListenerId, Priority, Registration, Scope,
};
pub use cache::{BackendError, CacheBackend, CacheStore, MemoryBackend, Usage};
pub use config::Config;
pub use error::RegistryError;
pub use mapping::{DynError, ErrorCase, ErrorMapper, ErrorPolicy, Fallback, SkipAll};
pub use message::{Envelope, Message};
pub use runtime::{CachePlan, MethodCall, Runtime, RuntimeBuilder};
pub use scheduler::Scheduler;
pub use ui::{Affinity, Job, MainLoop, UiHandle, UiPost};
