//! Call orchestration: the surface a source generator targets.
//!
//! ## Contents
//! - [`Runtime`] one instance per host application, owning the scheduler,
//!   cache store, bus, and fallback handler; no process-wide state
//! - [`RuntimeBuilder`] wiring with sensible defaults
//! - [`MethodCall`] / [`CachePlan`] the description of one service-method
//!   invocation: query id, serial key, affinity, cache plan, error policy,
//!   and the work closure itself
//!
//! [`Runtime::invoke`] turns a [`MethodCall`] into the canonical sequence:
//! optional stale-value probe, serialized computation, cache write, result
//! dispatch, with failures routed through the mapping pipeline.

mod builder;
mod call;
mod runtime;

pub use builder::RuntimeBuilder;
pub use call::{CachePlan, MethodCall};
pub use runtime::Runtime;
