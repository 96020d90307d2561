//! # Bus: subscription table and two-phase fan-out.
//!
//! [`Bus`] owns every [`Subscription`] and the per-(listener, query)
//! delivery bookkeeping. Dispatch walks the table twice, invoking every
//! `Priority::First` match before any `Priority::Last` match.
//!
//! ## Architecture
//! ```text
//! register(target) ──► L::interests() ──► [Subscription, Subscription, ...]
//!                                                     │
//! dispatch(message) ──► Envelope ──► phase First ─────┤ per subscription:
//!                                    phase Last  ─────┤  upgrade weak target
//!                                                     │  ├─ dead → sweep (once)
//!                                                     │  └─ alive → type/scope/
//!                                                     │     freshness gates →
//!                                                     ▼     invoke (direct | UI post)
//! ```
//!
//! ## Rules
//! - `register` / `unregister` / `dispatch` are individually atomic; the
//!   table lock is never held while a handler runs.
//! - A fresh message marks its (listener, query) pair; a cached message
//!   whose pair is already marked is dropped silently for that listener.
//! - A dead subscription is removed the first time dispatch visits it, and
//!   its listener's markers go with it.
//! - Registering the same target twice creates a second, independent
//!   subscription set; nothing deduplicates.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::bus::handler_set::{HandlerSet, Listener};
use crate::bus::subscription::{AnyTarget, ErasedHandler, ListenerId, Priority, Scope, Subscription};
use crate::error::RegistryError;
use crate::message::{Envelope, Message};
use crate::ui::{Affinity, UiPost};

/// Subscription table plus delivery-ordering state.
#[derive(Default)]
struct Table {
    subscriptions: Vec<Subscription>,
    /// (listener, query id) pairs that have already seen a fresh delivery.
    seen_fresh: HashSet<(ListenerId, Arc<str>)>,
}

/// Weak-lifecycle listener registry and message fan-out.
pub struct Bus {
    table: Mutex<Table>,
    ui: Arc<dyn UiPost>,
    next_listener: AtomicU64,
}

impl Bus {
    /// Creates a bus that posts UI-affinity handler invocations through `ui`.
    pub fn new(ui: Arc<dyn UiPost>) -> Self {
        Self {
            table: Mutex::new(Table::default()),
            ui,
            next_listener: AtomicU64::new(1),
        }
    }

    /// Attaches `target`'s declared subscription set and returns its
    /// identity.
    ///
    /// The bus keeps only a weak reference; dropping the last `Arc` makes
    /// the next dispatch sweep the subscriptions away. Registering a target
    /// that declares no handlers is a wiring bug and fails fast.
    pub fn register<L: Listener>(&self, target: &Arc<L>) -> Result<ListenerId, RegistryError> {
        let mut set = HandlerSet::<L>::new();
        L::interests(&mut set);
        if set.is_empty() {
            return Err(RegistryError::EmptyHandlerSet {
                listener: std::any::type_name::<L>(),
            });
        }

        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        let erased: AnyTarget = target.clone();
        let weak = Arc::downgrade(&erased);

        let mut table = self.lock_table();
        for declared in set.into_handlers() {
            table.subscriptions.push(Subscription {
                listener: id,
                target: weak.clone(),
                accepts: declared.accepts,
                scope: declared.scope,
                priority: declared.priority,
                affinity: declared.affinity,
                handler: declared.handler,
            });
        }
        Ok(id)
    }

    /// Registers `target` and returns a guard that unregisters it when the
    /// guard leaves scope.
    pub fn register_scoped<L: Listener>(
        self: &Arc<Self>,
        target: &Arc<L>,
    ) -> Result<Registration, RegistryError> {
        let id = self.register(target)?;
        Ok(Registration {
            bus: Arc::clone(self),
            id,
            armed: true,
        })
    }

    /// Removes every subscription whose target is `target` (pointer
    /// identity).
    pub fn unregister<L: Listener>(&self, target: &Arc<L>) {
        let raw = Arc::as_ptr(target) as *const ();
        self.remove_where(|sub| std::ptr::eq(sub.target.as_ptr() as *const (), raw));
    }

    /// Removes every subscription registered under `id`.
    pub fn unregister_id(&self, id: ListenerId) {
        self.remove_where(|sub| sub.listener == id);
    }

    fn remove_where(&self, predicate: impl Fn(&Subscription) -> bool) {
        let mut table = self.lock_table();
        let mut removed: Vec<ListenerId> = Vec::new();
        table.subscriptions.retain(|sub| {
            if predicate(sub) {
                removed.push(sub.listener);
                false
            } else {
                true
            }
        });
        if !removed.is_empty() {
            // A removed id never keeps subscriptions, so its markers go too.
            table
                .seen_fresh
                .retain(|(listener, _)| !removed.contains(listener));
        }
    }

    /// Number of live subscription records (dead ones count until swept).
    pub fn subscription_count(&self) -> usize {
        self.lock_table().subscriptions.len()
    }

    /// Opens a new delivery generation for `query`: forgets which listeners
    /// already saw a fresh message for it.
    ///
    /// Called when a new computation for the query is scheduled, so its
    /// stale preview can be delivered again; within the new generation the
    /// cached-never-after-fresh rule still holds.
    pub fn begin_query(&self, query: &str) {
        let mut table = self.lock_table();
        table.seen_fresh.retain(|(_, marked)| marked.as_ref() != query);
    }

    /// Fans a message out to every matching live subscription.
    pub fn dispatch<T: Send + Sync + 'static>(&self, message: Message<T>) {
        self.dispatch_envelope(Envelope::from(message));
    }

    /// Fans a type-erased message out. See [`Bus::dispatch`].
    pub fn dispatch_envelope(&self, envelope: Envelope) {
        self.dispatch_phase(&envelope, Priority::First);
        self.dispatch_phase(&envelope, Priority::Last);
    }

    /// Walks the table once for `phase`: sweeps dead targets, applies the
    /// type/scope/freshness gates, and collects matched handlers. Handlers
    /// run after the lock is released.
    fn dispatch_phase(&self, envelope: &Envelope, phase: Priority) {
        let mut matched: Vec<(ErasedHandler, AnyTarget, Affinity)> = Vec::new();
        {
            let mut table = self.lock_table();
            let mut dead: Vec<ListenerId> = Vec::new();
            let Table {
                subscriptions,
                seen_fresh,
            } = &mut *table;

            subscriptions.retain(|sub| {
                let Some(target) = sub.target.upgrade() else {
                    dead.push(sub.listener);
                    return false;
                };
                if sub.priority != phase || sub.accepts != envelope.payload_type() {
                    return true;
                }
                let in_scope =
                    sub.scope == Scope::Any || envelope.emitter() == Some(sub.listener);
                if !in_scope {
                    return true;
                }
                if let Some(query) = envelope.query_arc() {
                    let marker = (sub.listener, query);
                    if envelope.is_cached() {
                        if seen_fresh.contains(&marker) {
                            // The listener already saw the real value for
                            // this query; the stale one arrives too late.
                            return true;
                        }
                    } else {
                        seen_fresh.insert(marker);
                    }
                }
                matched.push((Arc::clone(&sub.handler), target, sub.affinity));
                true
            });

            if !dead.is_empty() {
                seen_fresh.retain(|(listener, _)| !dead.contains(listener));
            }
        }

        for (handler, target, affinity) in matched {
            match affinity {
                Affinity::Background => handler(&target, envelope),
                Affinity::Ui => {
                    let envelope = envelope.clone();
                    self.ui
                        .post(Box::new(move || handler(&target, &envelope)));
                }
            }
        }
    }

    fn lock_table(&self) -> std::sync::MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// RAII registration: unregisters its listener when dropped.
pub struct Registration {
    bus: Arc<Bus>,
    id: ListenerId,
    armed: bool,
}

impl Registration {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Keeps the registration alive past the guard; the weak-lifecycle
    /// sweep remains the only cleanup.
    pub fn detach(mut self) -> ListenerId {
        self.armed = false;
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if self.armed {
            self.bus.unregister_id(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::subscription::Interest;
    use crate::bus::Delivery;
    use crate::ui::Job;

    /// Runs posted jobs inline; enough for single-threaded bus tests.
    struct InlineUi;

    impl UiPost for InlineUi {
        fn post(&self, job: Job) {
            job();
        }
    }

    fn bus() -> Arc<Bus> {
        Arc::new(Bus::new(Arc::new(InlineUi)))
    }

    #[derive(Clone, PartialEq, Debug)]
    struct UserLoaded {
        id: u64,
    }

    /// Records every delivery it sees, with the cached flag.
    struct Probe {
        seen: Mutex<Vec<(u64, bool)>>,
    }

    impl Probe {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<(u64, bool)> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Listener for Probe {
        fn interests(handlers: &mut HandlerSet<Self>) {
            handlers.on_with(
                Interest::new().with_scope(Scope::Any),
                |probe: &Probe, loaded: Delivery<'_, UserLoaded>| {
                    probe
                        .seen
                        .lock()
                        .unwrap()
                        .push((loaded.payload().id, loaded.is_cached()));
                },
            );
        }
    }

    struct NoHandlers;

    impl Listener for NoHandlers {
        fn interests(_handlers: &mut HandlerSet<Self>) {}
    }

    #[test]
    fn test_registering_without_handlers_fails_fast() {
        let bus = bus();
        let target = Arc::new(NoHandlers);
        let err = bus.register(&target).unwrap_err();
        assert_eq!(err.as_label(), "registry_empty_handler_set");
    }

    #[test]
    fn test_dispatch_reaches_matching_payload_type_only() {
        let bus = bus();
        let probe = Probe::new();
        bus.register(&probe).unwrap();

        bus.dispatch(Message::new("not a user"));
        bus.dispatch(Message::new(UserLoaded { id: 3 }));

        assert_eq!(probe.seen(), vec![(3, false)]);
    }

    #[test]
    fn test_self_scope_filters_on_emitter() {
        struct OwnOnly {
            seen: Mutex<Vec<u64>>,
        }

        impl Listener for OwnOnly {
            fn interests(handlers: &mut HandlerSet<Self>) {
                handlers.on(|own: &OwnOnly, loaded: Delivery<'_, UserLoaded>| {
                    own.seen.lock().unwrap().push(loaded.payload().id);
                });
            }
        }

        let bus = bus();
        let mine = Arc::new(OwnOnly {
            seen: Mutex::new(Vec::new()),
        });
        let other = Arc::new(OwnOnly {
            seen: Mutex::new(Vec::new()),
        });
        let mine_id = bus.register(&mine).unwrap();
        bus.register(&other).unwrap();

        // Emitted on behalf of `mine`.
        bus.dispatch(Message::new(UserLoaded { id: 1 }).with_emitter(mine_id));
        // No emitter at all: self-scoped handlers stay silent.
        bus.dispatch(Message::new(UserLoaded { id: 2 }));

        assert_eq!(*mine.seen.lock().unwrap(), vec![1]);
        assert!(other.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_first_phase_completes_before_last_phase() {
        struct Phased {
            order: Arc<Mutex<Vec<&'static str>>>,
        }

        impl Listener for Phased {
            fn interests(handlers: &mut HandlerSet<Self>) {
                handlers.on_with(
                    Interest::new().with_scope(Scope::Any),
                    |phased: &Phased, _: Delivery<'_, UserLoaded>| {
                        phased.order.lock().unwrap().push("first");
                    },
                );
                handlers.on_with(
                    Interest::new()
                        .with_scope(Scope::Any)
                        .with_priority(Priority::Last),
                    |phased: &Phased, _: Delivery<'_, UserLoaded>| {
                        phased.order.lock().unwrap().push("last");
                    },
                );
            }
        }

        let bus = bus();
        let order = Arc::new(Mutex::new(Vec::new()));
        let a = Arc::new(Phased {
            order: Arc::clone(&order),
        });
        let b = Arc::new(Phased {
            order: Arc::clone(&order),
        });
        bus.register(&a).unwrap();
        bus.register(&b).unwrap();

        bus.dispatch(Message::new(UserLoaded { id: 1 }));

        assert_eq!(*order.lock().unwrap(), vec!["first", "first", "last", "last"]);
    }

    #[test]
    fn test_cached_after_fresh_is_dropped_per_query() {
        let bus = bus();
        let probe = Probe::new();
        bus.register(&probe).unwrap();

        bus.dispatch(Message::new(UserLoaded { id: 3 }).with_query("q1"));
        bus.dispatch(Message::new(UserLoaded { id: 3 }).cached().with_query("q1"));

        // The fresh delivery marked q1; the late cached one is suppressed.
        assert_eq!(probe.seen(), vec![(3, false)]);
    }

    #[test]
    fn test_cached_before_fresh_is_delivered() {
        let bus = bus();
        let probe = Probe::new();
        bus.register(&probe).unwrap();

        bus.dispatch(Message::new(UserLoaded { id: 3 }).cached().with_query("q1"));
        bus.dispatch(Message::new(UserLoaded { id: 3 }).with_query("q1"));

        assert_eq!(probe.seen(), vec![(3, true), (3, false)]);
    }

    #[test]
    fn test_begin_query_opens_a_new_delivery_generation() {
        let bus = bus();
        let probe = Probe::new();
        bus.register(&probe).unwrap();

        bus.dispatch(Message::new(UserLoaded { id: 3 }).with_query("q1"));
        // A repeat call for the same query starts over: its stale preview
        // is deliverable again.
        bus.begin_query("q1");
        bus.dispatch(Message::new(UserLoaded { id: 3 }).cached().with_query("q1"));
        bus.dispatch(Message::new(UserLoaded { id: 3 }).with_query("q1"));

        assert_eq!(probe.seen(), vec![(3, false), (3, true), (3, false)]);
    }

    #[test]
    fn test_freshness_marker_is_per_listener() {
        let bus = bus();
        let early = Probe::new();
        bus.register(&early).unwrap();

        bus.dispatch(Message::new(UserLoaded { id: 3 }).with_query("q1"));

        // A listener that appears after the fresh delivery has no marker,
        // so the cached replay still reaches it.
        let late = Probe::new();
        bus.register(&late).unwrap();
        bus.dispatch(Message::new(UserLoaded { id: 3 }).cached().with_query("q1"));

        assert_eq!(early.seen(), vec![(3, false)]);
        assert_eq!(late.seen(), vec![(3, true)]);
    }

    #[test]
    fn test_dead_listener_is_swept_exactly_once() {
        let bus = bus();
        let probe = Probe::new();
        bus.register(&probe).unwrap();
        assert_eq!(bus.subscription_count(), 1);

        drop(probe);

        // First dispatch after death sweeps; nothing is invoked.
        bus.dispatch(Message::new(UserLoaded { id: 1 }));
        assert_eq!(bus.subscription_count(), 0);

        // Later dispatches have nothing left to visit.
        bus.dispatch(Message::new(UserLoaded { id: 2 }));
        assert_eq!(bus.subscription_count(), 0);
    }

    #[test]
    fn test_unregister_stops_delivery() {
        let bus = bus();
        let probe = Probe::new();
        bus.register(&probe).unwrap();

        bus.unregister(&probe);
        bus.dispatch(Message::new(UserLoaded { id: 1 }));

        assert!(probe.seen().is_empty());
        assert_eq!(bus.subscription_count(), 0);
    }

    #[test]
    fn test_reregistration_creates_independent_subscriptions() {
        let bus = bus();
        let probe = Probe::new();
        bus.register(&probe).unwrap();
        bus.register(&probe).unwrap();
        assert_eq!(bus.subscription_count(), 2);

        bus.dispatch(Message::new(UserLoaded { id: 1 }));

        // Both subscription sets fire; nothing deduplicates.
        assert_eq!(probe.seen(), vec![(1, false), (1, false)]);
    }

    #[test]
    fn test_scoped_registration_unregisters_on_drop() {
        let bus = bus();
        let probe = Probe::new();
        {
            let _guard = bus.register_scoped(&probe).unwrap();
            assert_eq!(bus.subscription_count(), 1);
        }
        assert_eq!(bus.subscription_count(), 0);

        bus.dispatch(Message::new(UserLoaded { id: 1 }));
        assert!(probe.seen().is_empty());
    }
}
