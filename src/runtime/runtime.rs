//! # Runtime: owns the components and composes them per call.
//!
//! One [`Runtime`] per host application. It holds the scheduler, the cache
//! store, the bus, and the fallback handler, and its [`Runtime::invoke`]
//! emits the canonical call sequence against them: the six operations a
//! source generator would otherwise write out per method.
//!
//! ## Call flow
//! ```text
//! invoke(MethodCall)
//!   │
//!   ├─ cached (RenewAfterDelivery):
//!   │     submit(probe_serial): get(key) ──hit──► dispatch cached Message
//!   │     submit(serial):       work() ──► put(key) ──► dispatch fresh Message
//!   │
//!   ├─ cached (FreshOnly):
//!   │     submit(serial): get(key) ──hit──► dispatch cached Message, done
//!   │                       └─miss─► work() ──► put(key) ──► dispatch fresh
//!   │
//!   └─ uncached:
//!         submit(serial): work() ──► dispatch fresh Message
//!
//! any work() error ──► ErrorPolicy::resolve ──► dispatch error Message
//!                                   └─ skip/miss ──► Fallback
//! ```
//!
//! ## Rules
//! - `invoke` returns immediately; results only ever arrive through the bus.
//! - The stale probe runs under its own serial key so a busy method queue
//!   cannot delay cached deliveries. The bus's freshness markers make the
//!   probe/compute race harmless: a cached value that loses the race is
//!   dropped per listener, never delivered after the fresh one.
//! - Exactly one message per outcome: one fresh result, at most one cached
//!   preview, exactly one error message per mapped failure.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::bus::{Bus, ListenerId};
use crate::cache::{CacheStore, Usage};
use crate::config::Config;
use crate::mapping::{DynError, ErrorPolicy, Fallback};
use crate::message::{Envelope, Message};
use crate::runtime::builder::RuntimeBuilder;
use crate::runtime::call::{MethodCall, ReadFn, WriteFn};
use crate::scheduler::Scheduler;
use crate::ui::{Affinity, Job};

/// The per-application service runtime.
pub struct Runtime {
    pub(crate) config: Config,
    pub(crate) scheduler: Scheduler,
    pub(crate) cache: CacheStore,
    pub(crate) bus: Arc<Bus>,
    pub(crate) fallback: Fallback,
    /// Present when the builder spawned the built-in main loop.
    pub(crate) loop_stop: Option<CancellationToken>,
}

impl Runtime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// The bus, for registering listeners and direct dispatch.
    pub fn bus(&self) -> &Arc<Bus> {
        &self.bus
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Stops the built-in main loop, if this runtime owns one. Queued UI
    /// jobs that have not run yet are dropped.
    pub fn shutdown(&self) {
        if let Some(stop) = &self.loop_stop {
            stop.cancel();
        }
    }

    /// Schedules `call` and returns immediately.
    pub fn invoke<T, E>(&self, call: MethodCall<T, E>)
    where
        T: Send + Sync + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let MethodCall {
            query,
            serial,
            affinity,
            emitter,
            errors,
            cache,
            work,
        } = call;
        let serial =
            serial.unwrap_or_else(|| Arc::from(self.config.default_serial.as_ref()));

        // A new invocation opens a new delivery generation for its query id;
        // within it the bus still suppresses cached-after-fresh.
        self.bus.begin_query(&query);

        let Some(binding) = cache else {
            let job = run_and_dispatch(
                work,
                None,
                None,
                query,
                emitter,
                errors,
                Arc::clone(&self.bus),
                self.fallback.clone(),
                self.cache.clone(),
            );
            self.scheduler.submit(&serial, affinity, job);
            return;
        };

        let key: Arc<str> = match &binding.plan.key {
            Some(key) => Arc::from(key.as_ref()),
            None => Arc::clone(&query),
        };

        match binding.plan.usage {
            Usage::RenewAfterDelivery => {
                self.scheduler.submit(
                    self.config.probe_serial.as_ref(),
                    Affinity::Background,
                    self.probe_job(binding.read, Arc::clone(&key), Arc::clone(&query), emitter),
                );
                let job = run_and_dispatch(
                    work,
                    None,
                    Some((binding.write, key, binding.plan.validity)),
                    query,
                    emitter,
                    errors,
                    Arc::clone(&self.bus),
                    self.fallback.clone(),
                    self.cache.clone(),
                );
                self.scheduler.submit(&serial, affinity, job);
            }
            Usage::FreshOnly => {
                let job = run_and_dispatch(
                    work,
                    Some((binding.read, Arc::clone(&key))),
                    Some((binding.write, key, binding.plan.validity)),
                    query,
                    emitter,
                    errors,
                    Arc::clone(&self.bus),
                    self.fallback.clone(),
                    self.cache.clone(),
                );
                self.scheduler.submit(&serial, affinity, job);
            }
        }
    }

    /// Builds the stale-value probe: serve a hit as a cached message, do
    /// nothing on a miss.
    fn probe_job<T: Send + Sync + 'static>(
        &self,
        read: ReadFn<T>,
        key: Arc<str>,
        query: Arc<str>,
        emitter: Option<ListenerId>,
    ) -> Job {
        let store = self.cache.clone();
        let bus = Arc::clone(&self.bus);
        Box::new(move || {
            if let Some(value) = read(&store, &key) {
                let envelope = Envelope::from(Message::new(value).cached().with_query(query))
                    .or_emitter(emitter);
                bus.dispatch_envelope(envelope);
            }
        })
    }
}

/// Builds the main computation job: optional inline probe (FreshOnly),
/// compute, optional cache write, dispatch, error pipeline.
#[allow(clippy::too_many_arguments)]
fn run_and_dispatch<T, E>(
    work: Box<dyn FnOnce() -> Result<T, E> + Send + 'static>,
    serve_hit_and_skip: Option<(ReadFn<T>, Arc<str>)>,
    store_result: Option<(WriteFn<T>, Arc<str>, Duration)>,
    query: Arc<str>,
    emitter: Option<ListenerId>,
    errors: Option<ErrorPolicy>,
    bus: Arc<Bus>,
    fallback: Fallback,
    cache: CacheStore,
) -> Job
where
    T: Send + Sync + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    Box::new(move || {
        if let Some((read, key)) = &serve_hit_and_skip {
            if let Some(value) = read(&cache, key) {
                let envelope =
                    Envelope::from(Message::new(value).cached().with_query(Arc::clone(&query)))
                        .or_emitter(emitter);
                bus.dispatch_envelope(envelope);
                return;
            }
        }

        match work() {
            Ok(value) => {
                if let Some((write, key, validity)) = &store_result {
                    write(&cache, key, &value, *validity);
                }
                let envelope =
                    Envelope::from(Message::new(value).with_query(query)).or_emitter(emitter);
                bus.dispatch_envelope(envelope);
            }
            Err(error) => {
                let error: DynError = Box::new(error);
                match errors.as_ref().and_then(|policy| policy.resolve(&error)) {
                    Some(envelope) => bus.dispatch_envelope(envelope.or_emitter(emitter)),
                    None => fallback.handle(error),
                }
            }
        }
    })
}
