//! Failure-to-message mapping.
//!
//! ## Contents
//! - [`ErrorMapper`] turns a caught failure into an integer code, or skips
//! - [`ErrorPolicy`] / [`ErrorCase`] ordered code-to-payload bindings;
//!   first match by code wins, call-level cases before service-level ones
//! - [`Fallback`] the single sink for unmapped failures
//!
//! ## Quick reference
//! - Exactly one error message is produced per mapped failure.
//! - A skipped or unmatched failure goes to the fallback handler and
//!   produces no message at all.

mod mapper;
mod policy;

pub use mapper::{DynError, ErrorMapper, SkipAll};
pub use policy::{ErrorCase, ErrorPolicy, Fallback};
