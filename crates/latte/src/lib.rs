//! # latte — a Mocha-inspired async BDD test framework for Rust
//!
//! Declare suites with a nesting `describe`/`it` closure DSL, run them on an
//! async engine with hooks, retries, timeouts, and filtering, and report
//! results through pluggable reporters.
//!
//! ## Quick example
//!
//! ```rust,no_run
//! use latte::{RunConfig, Runner, SpecReporter};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let suite = latte::suite(|ctx| {
//!         ctx.describe("Calculator", |ctx| {
//!             ctx.it("adds two numbers", |_| {
//!                 assert_eq!(2 + 3, 5);
//!             });
//!
//!             ctx.describe("with negative numbers", |ctx| {
//!                 ctx.it("handles negatives", |_| {
//!                     assert_eq!(-1 + 1, 0);
//!                 });
//!             });
//!         });
//!     });
//!
//!     let report = Runner::new(RunConfig::default())
//!         .reporter(SpecReporter::new())
//!         .run(suite)
//!         .await;
//!     std::process::exit(report.exit_code());
//! }
//! ```
//!
//! ## Body styles
//!
//! A test (or hook) body picks exactly one completion protocol through its
//! registration form:
//!
//! - [`SuiteCtx::it`] — synchronous closure, settles on return, fails on
//!   panic.
//! - [`SuiteCtx::it_async`] — returns a future, settles when it resolves.
//! - [`SuiteCtx::it_callback`] — receives a [`Done`] handle, settles on the
//!   first `done` call; extra calls fail the test.
//!
//! Every body also receives a [`Handle`] with `timeout`/`slow`/`retries`
//! mutators and runtime [`Handle::skip`].

pub mod error;
pub mod filter;
pub mod job;
pub mod reporter;
pub mod runner;
pub mod stats;
pub mod suite;

mod context;

pub use context::{suite, suite_with, ItBuilder, SuiteCtx};
pub use error::{BuildError, TestError};
pub use filter::Filter;
pub use job::{Body, Done, Handle, Outcome};
pub use reporter::{
    ErrRecord, JsonReporter, NullReporter, Record, RecordKind, Reporter, SpecReporter, Speed,
    Status,
};
pub use runner::{RunConfig, RunReport, Runner};
pub use stats::{Marker, Stats};
pub use suite::{Config, Hook, HookKind, Meta, Suite, Test};

/// Skip the current runnable at runtime: marks the attempt pending and
/// returns from the body.
///
/// ```rust,no_run
/// # latte::suite(|ctx| {
/// ctx.it("needs a database", |h| {
///     let have_db = false;
///     if !have_db {
///         latte::skip!(h);
///     }
///     // never reached without a database
/// });
/// # });
/// ```
#[macro_export]
macro_rules! skip {
    ($handle:expr) => {{
        $handle.skip();
        return;
    }};
}
