//! # Runtime wiring.
//!
//! [`RuntimeBuilder`] assembles a [`Runtime`] from parts, defaulting
//! anything the host does not supply: an in-memory cache backend, a spawned
//! built-in main loop, and a log-only fallback handler.
//!
//! `build` must run inside a tokio runtime; the scheduler's queue drainers
//! and the default main loop are spawned onto it.

use std::sync::Arc;

use crate::bus::Bus;
use crate::cache::{CacheBackend, CacheStore, MemoryBackend};
use crate::config::Config;
use crate::mapping::{DynError, Fallback};
use crate::runtime::Runtime;
use crate::scheduler::Scheduler;
use crate::ui::{MainLoop, UiPost};

/// Builder for a [`Runtime`].
pub struct RuntimeBuilder {
    config: Config,
    backend: Option<Arc<dyn CacheBackend>>,
    ui: Option<Arc<dyn UiPost>>,
    fallback: Fallback,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            backend: None,
            ui: None,
            fallback: Fallback::default(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Persistent engine behind the cache store. Defaults to
    /// [`MemoryBackend`].
    pub fn with_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// The host's "post to UI thread" primitive. Without one, a built-in
    /// [`MainLoop`] is spawned and owned by the runtime.
    pub fn with_ui(mut self, ui: Arc<dyn UiPost>) -> Self {
        self.ui = Some(ui);
        self
    }

    /// Sink for unmapped failures. Defaults to logging at error level; a
    /// host wanting the fatal behavior can abort the process here.
    pub fn with_fallback(mut self, handler: impl Fn(DynError) + Send + Sync + 'static) -> Self {
        self.fallback = Fallback::new(handler);
        self
    }

    /// Builds the runtime. Must be called from within a tokio runtime.
    pub fn build(self) -> Runtime {
        let (ui, loop_stop) = match self.ui {
            Some(ui) => (ui, None),
            None => {
                let main_loop = MainLoop::new();
                let handle = main_loop.handle();
                let stop = main_loop.stop_token();
                tokio::spawn(main_loop.run());
                (Arc::new(handle) as Arc<dyn UiPost>, Some(stop))
            }
        };

        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(MemoryBackend::new()));

        Runtime {
            scheduler: Scheduler::new(Arc::clone(&ui)),
            cache: CacheStore::new(backend),
            bus: Arc::new(Bus::new(ui)),
            fallback: self.fallback,
            config: self.config,
            loop_stop,
        }
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
