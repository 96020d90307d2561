//! Error types surfaced by the taskbus runtime.
//!
//! Only setup-time failures escape this crate: [`RegistryError`] signals a
//! contract violation in listener wiring and should abort initialization.
//! Data-path failures (task errors, cache corruption, backend I/O) never
//! surface here; they are absorbed by the error-mapping pipeline or logged
//! and treated as absence.

use thiserror::Error;

/// # Errors raised while wiring listeners into the bus.
///
/// These indicate malformed declarations, not runtime conditions. Callers
/// are expected to propagate them with `?` during startup rather than
/// catching and ignoring them.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A listener registered without declaring a single handler.
    #[error("listener `{listener}` declares no handlers")]
    EmptyHandlerSet {
        /// Type name of the offending listener.
        listener: &'static str,
    },
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::EmptyHandlerSet { .. } => "registry_empty_handler_set",
        }
    }
}
