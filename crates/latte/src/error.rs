//! Error taxonomy — build-time usage errors and runtime test failures.

use thiserror::Error;

/// A mistake in suite construction. These fail fast: the run never starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Titles must stay printable; a control character would corrupt
    /// reporter output and title-path filtering.
    #[error("invalid title {0:?}: control characters are not allowed")]
    InvalidTitle(String),
}

/// Why a single test or hook attempt failed.
///
/// Every recoverable runtime failure is folded into one of these variants at
/// the narrowest scope (the job, then the owning runnable) and carried as
/// data, never rethrown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TestError {
    /// A panic in the body, or an error passed to `done()`.
    #[error("{0}")]
    Failed(String),

    /// The body did not settle within its timeout window.
    #[error("timeout of {0}ms exceeded; for callback bodies ensure done() is called, for async bodies ensure the future resolves")]
    Timeout(u64),

    /// A callback body settled more than once.
    #[error("done() called multiple times")]
    MultipleDone,
}

impl TestError {
    /// Short machine-readable name, used in serialized records.
    pub fn name(&self) -> &'static str {
        match self {
            TestError::Failed(_) => "Failed",
            TestError::Timeout(_) => "Timeout",
            TestError::MultipleDone => "MultipleDone",
        }
    }
}
