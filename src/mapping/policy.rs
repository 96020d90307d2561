//! # Ordered error-case resolution.
//!
//! An [`ErrorPolicy`] pairs a mapper with the declared `(code, payload)`
//! bindings of one call. Cases are checked in declaration order, so pushing
//! call-level cases before service-level ones gives the call the first say.
//! Each case carries a typed constructor closure composed where the call is
//! declared; whatever context the error payload needs (arguments of the
//! original call, usually) is captured there.
//!
//! ```text
//! resolve(err):
//!   mapper.map(err) ──► None ─────────────────────────► fallback, no message
//!                   └─► Some(code) ─► first case with
//!                                     matching code ──► exactly one message
//!                                     no match ───────► fallback, no message
//! ```

use std::sync::Arc;

use crate::mapping::mapper::{DynError, ErrorMapper};
use crate::message::{Envelope, Message};

type CaseConstructor = Arc<dyn Fn(&DynError) -> Envelope + Send + Sync>;

/// One `(code, payload constructor)` binding.
#[derive(Clone)]
pub struct ErrorCase {
    code: i32,
    construct: CaseConstructor,
}

impl ErrorCase {
    /// Binds `code` to a payload constructor. The constructor receives the
    /// caught failure; anything else it needs is captured when the case is
    /// declared.
    pub fn new<T, F>(code: i32, construct: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&DynError) -> T + Send + Sync + 'static,
    {
        Self {
            code,
            construct: Arc::new(move |error: &DynError| {
                Envelope::from(Message::new(construct(error)))
            }),
        }
    }

    pub fn code(&self) -> i32 {
        self.code
    }
}

/// Mapper plus ordered cases for one call.
#[derive(Clone)]
pub struct ErrorPolicy {
    mapper: Arc<dyn ErrorMapper>,
    cases: Vec<ErrorCase>,
}

impl ErrorPolicy {
    pub fn new(mapper: impl ErrorMapper) -> Self {
        Self {
            mapper: Arc::new(mapper),
            cases: Vec::new(),
        }
    }

    /// Appends a case. Declaration order is resolution order.
    pub fn with_case(mut self, case: ErrorCase) -> Self {
        self.cases.push(case);
        self
    }

    /// Appends several cases, keeping their order.
    pub fn with_cases(mut self, cases: impl IntoIterator<Item = ErrorCase>) -> Self {
        self.cases.extend(cases);
        self
    }

    /// Resolves `error` to its error message, if the mapper produces a code
    /// and a case matches it. `None` means the failure stays unmapped and
    /// belongs to the fallback handler.
    pub fn resolve(&self, error: &DynError) -> Option<Envelope> {
        let code = self.mapper.map(error)?;
        self.cases
            .iter()
            .find(|case| case.code == code)
            .map(|case| (case.construct)(error))
    }
}

/// Process-wide sink for unmapped failures. This is the only fatal or
/// unhandled path in the runtime; everything else is absorbed locally.
#[derive(Clone)]
pub struct Fallback {
    handler: Arc<dyn Fn(DynError) + Send + Sync>,
}

impl Fallback {
    /// Installs a custom handler. A host that wants the traditional
    /// crash-on-unhandled behavior can abort the process here.
    pub fn new(handler: impl Fn(DynError) + Send + Sync + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    pub fn handle(&self, error: DynError) {
        (self.handler)(error);
    }
}

impl Default for Fallback {
    /// Logs the failure at error level and moves on.
    fn default() -> Self {
        Self::new(|error| tracing::error!(%error, "unmapped task failure"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::mapper::SkipAll;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, thiserror::Error)]
    #[error("no network")]
    struct NoNetwork;

    #[derive(Clone, PartialEq, Debug)]
    struct NetworkDown {
        detail: String,
    }

    #[derive(Clone, PartialEq, Debug)]
    struct GenericFailure;

    fn boxed(err: impl std::error::Error + Send + Sync + 'static) -> DynError {
        Box::new(err)
    }

    #[test]
    fn test_first_matching_case_wins() {
        let policy = ErrorPolicy::new(|_: &DynError| Some(10))
            // Call-level case, declared first.
            .with_case(ErrorCase::new(10, |error: &DynError| NetworkDown {
                detail: error.to_string(),
            }))
            // Service-level case with the same code never fires.
            .with_case(ErrorCase::new(10, |_: &DynError| GenericFailure));

        let envelope = policy.resolve(&boxed(NoNetwork)).expect("case must match");
        assert!(envelope.payload_is::<NetworkDown>());
        assert_eq!(
            envelope.payload_ref::<NetworkDown>().unwrap().detail,
            "no network",
        );
    }

    #[test]
    fn test_unmatched_code_resolves_to_nothing() {
        let policy = ErrorPolicy::new(|_: &DynError| Some(99))
            .with_case(ErrorCase::new(10, |_: &DynError| GenericFailure));
        assert!(policy.resolve(&boxed(NoNetwork)).is_none());
    }

    #[test]
    fn test_skip_resolves_to_nothing() {
        let policy =
            ErrorPolicy::new(SkipAll).with_case(ErrorCase::new(10, |_: &DynError| GenericFailure));
        assert!(policy.resolve(&boxed(NoNetwork)).is_none());
    }

    #[test]
    fn test_constructor_captures_call_arguments() {
        let user_id = 42u64;
        let policy = ErrorPolicy::new(|_: &DynError| Some(1)).with_case(ErrorCase::new(
            1,
            move |error: &DynError| NetworkDown {
                detail: format!("user {user_id}: {error}"),
            },
        ));

        let envelope = policy.resolve(&boxed(NoNetwork)).unwrap();
        assert_eq!(
            envelope.payload_ref::<NetworkDown>().unwrap().detail,
            "user 42: no network",
        );
    }

    #[test]
    fn test_exactly_one_construction_per_resolution() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let policy = ErrorPolicy::new(|_: &DynError| Some(1)).with_case(ErrorCase::new(
            1,
            move |_: &DynError| {
                counter.fetch_add(1, Ordering::SeqCst);
                GenericFailure
            },
        ));

        policy.resolve(&boxed(NoNetwork)).unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fallback_receives_the_original_failure() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let fallback = Fallback::new(move |error| sink.lock().unwrap().push(error.to_string()));

        fallback.handle(boxed(NoNetwork));
        assert_eq!(*seen.lock().unwrap(), vec!["no network".to_string()]);
    }
}
