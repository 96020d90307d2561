//! # Failure-to-code mapping contract.
//!
//! Services that want declarative error handling supply an [`ErrorMapper`]:
//! given the failure a task produced, it answers with an application-defined
//! integer code, or `None` to leave the failure unmapped. Codes are what
//! [`ErrorPolicy`](crate::ErrorPolicy) cases bind payload constructors to.

/// A task failure in erased form.
pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Maps a caught failure to an application error code.
pub trait ErrorMapper: Send + Sync + 'static {
    /// Returns the code for `error`, or `None` if this failure should not
    /// be handled by the mapping pipeline.
    fn map(&self, error: &DynError) -> Option<i32>;
}

/// Default mapper: never maps anything, so every failure reaches the
/// fallback handler.
pub struct SkipAll;

impl ErrorMapper for SkipAll {
    fn map(&self, _error: &DynError) -> Option<i32> {
        None
    }
}

impl<F> ErrorMapper for F
where
    F: Fn(&DynError) -> Option<i32> + Send + Sync + 'static,
{
    fn map(&self, error: &DynError) -> Option<i32> {
        self(error)
    }
}
