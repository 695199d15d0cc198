//! Closure-based registration DSL — `describe`, `it`, hooks, and the
//! fluent [`ItBuilder`].
//!
//! Registration closures receive the builder explicitly (`&mut SuiteCtx`),
//! so construction needs no ambient globals and is synchronous by type:
//! there is no builder to misuse outside [`suite`] and no way to hand a
//! `describe` an async body.

use std::future::Future;

use crate::job::{Body, Done, Handle};
use crate::suite::{Config, Hook, HookKind, Suite, Test};

// ============================================================================
// Entry points
// ============================================================================

/// Build a suite tree with default configuration.
///
/// ```rust,no_run
/// let suite = latte::suite(|ctx| {
///     ctx.describe("Calculator", |ctx| {
///         ctx.it("adds two numbers", |_| {
///             assert_eq!(2 + 3, 5);
///         });
///     });
/// });
/// ```
pub fn suite(build: impl FnOnce(&mut SuiteCtx)) -> Suite {
    suite_with(Config::default(), build)
}

/// Build a suite tree with explicit root configuration (global timeout,
/// slow threshold, retry defaults), inherited by every runnable.
pub fn suite_with(config: Config, build: impl FnOnce(&mut SuiteCtx)) -> Suite {
    let mut root = Suite::root(config);
    build(&mut SuiteCtx { suite: &mut root });
    root
}

// ============================================================================
// SuiteCtx — the builder handle
// ============================================================================

/// Builder for one suite's contents, passed into every registration closure.
pub struct SuiteCtx<'a> {
    suite: &'a mut Suite,
}

impl SuiteCtx<'_> {
    // ---- Describe -----------------------------------------------------------

    pub fn describe(&mut self, title: &str, build: impl FnOnce(&mut SuiteCtx)) {
        self.describe_impl(title, false, false, build);
    }

    /// Like [`describe`](Self::describe), but marks the subtree exclusive:
    /// when any node is marked `only`, tests outside the marked set are
    /// skipped entirely.
    pub fn describe_only(&mut self, title: &str, build: impl FnOnce(&mut SuiteCtx)) {
        self.describe_impl(title, true, false, build);
    }

    /// Like [`describe`](Self::describe), but every test under it reports
    /// pending without running.
    pub fn describe_skip(&mut self, title: &str, build: impl FnOnce(&mut SuiteCtx)) {
        self.describe_impl(title, false, true, build);
    }

    fn describe_impl(
        &mut self,
        title: &str,
        only: bool,
        skip: bool,
        build: impl FnOnce(&mut SuiteCtx),
    ) {
        let mut child = self
            .suite
            .child_of(title, only, skip)
            .unwrap_or_else(|err| panic!("latte: {err}"));
        build(&mut SuiteCtx { suite: &mut child });
        self.suite.suites.push(child);
    }

    // ---- It -----------------------------------------------------------------

    /// Register a synchronous test. Returns an [`ItBuilder`] for optional
    /// decorators:
    ///
    /// ```rust,no_run
    /// # latte::suite(|ctx| {
    /// ctx.it("works", |_| assert!(true));
    ///
    /// ctx.it("flaky but tolerated", |_| { /* ... */ })
    ///     .retries(3)
    ///     .timeout(5000);
    /// # });
    /// ```
    pub fn it(
        &mut self,
        title: &str,
        f: impl Fn(&Handle) + Send + Sync + 'static,
    ) -> ItBuilder<'_> {
        self.register(title, Some(Body::sync(f)))
    }

    /// Register a test whose body is a future; the test settles when the
    /// future resolves.
    pub fn it_async<F, Fut>(&mut self, title: &str, f: F) -> ItBuilder<'_>
    where
        F: Fn(Handle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register(title, Some(Body::future(f)))
    }

    /// Register a callback-style test; the test settles on the first
    /// [`Done`] call.
    pub fn it_callback(
        &mut self,
        title: &str,
        f: impl Fn(Handle, Done) + Send + Sync + 'static,
    ) -> ItBuilder<'_> {
        self.register(title, Some(Body::callback(f)))
    }

    /// Register a bodyless test: reported and counted as pending, never run.
    pub fn it_pending(&mut self, title: &str) {
        self.register(title, None);
    }

    fn register(&mut self, title: &str, body: Option<Body>) -> ItBuilder<'_> {
        ItBuilder {
            suite: &mut *self.suite,
            title: title.to_string(),
            body,
            only: false,
            skip: false,
            timeout_ms: None,
            slow_ms: None,
            retries: None,
        }
    }

    // ---- Hooks ----------------------------------------------------------------

    pub fn before_all(&mut self, f: impl Fn(&Handle) + Send + Sync + 'static) {
        self.add_hook(HookKind::BeforeAll, None, Body::sync(f));
    }

    pub fn after_all(&mut self, f: impl Fn(&Handle) + Send + Sync + 'static) {
        self.add_hook(HookKind::AfterAll, None, Body::sync(f));
    }

    pub fn before_each(&mut self, f: impl Fn(&Handle) + Send + Sync + 'static) {
        self.add_hook(HookKind::BeforeEach, None, Body::sync(f));
    }

    pub fn after_each(&mut self, f: impl Fn(&Handle) + Send + Sync + 'static) {
        self.add_hook(HookKind::AfterEach, None, Body::sync(f));
    }

    pub fn before_all_async<F, Fut>(&mut self, f: F)
    where
        F: Fn(Handle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.add_hook(HookKind::BeforeAll, None, Body::future(f));
    }

    pub fn after_all_async<F, Fut>(&mut self, f: F)
    where
        F: Fn(Handle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.add_hook(HookKind::AfterAll, None, Body::future(f));
    }

    pub fn before_each_async<F, Fut>(&mut self, f: F)
    where
        F: Fn(Handle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.add_hook(HookKind::BeforeEach, None, Body::future(f));
    }

    pub fn after_each_async<F, Fut>(&mut self, f: F)
    where
        F: Fn(Handle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.add_hook(HookKind::AfterEach, None, Body::future(f));
    }

    /// Attach a labeled hook with an explicit [`Body`]; the label shows up
    /// in failure titles (`"before all" hook: open pool`).
    pub fn before_all_body(&mut self, label: &str, body: Body) {
        self.add_hook(HookKind::BeforeAll, Some(label), body);
    }

    pub fn after_all_body(&mut self, label: &str, body: Body) {
        self.add_hook(HookKind::AfterAll, Some(label), body);
    }

    pub fn before_each_body(&mut self, label: &str, body: Body) {
        self.add_hook(HookKind::BeforeEach, Some(label), body);
    }

    pub fn after_each_body(&mut self, label: &str, body: Body) {
        self.add_hook(HookKind::AfterEach, Some(label), body);
    }

    fn add_hook(&mut self, kind: HookKind, label: Option<&str>, body: Body) {
        let hook = Hook::new(&self.suite.meta, kind, label, body)
            .unwrap_or_else(|err| panic!("latte: {err}"));
        match kind {
            HookKind::BeforeAll => self.suite.before_all.push(hook),
            HookKind::AfterAll => self.suite.after_all.push(hook),
            HookKind::BeforeEach => self.suite.before_each.push(hook.into()),
            HookKind::AfterEach => self.suite.after_each.push(hook.into()),
        }
    }
}

// ============================================================================
// ItBuilder — fluent decorators, registers the test on Drop
// ============================================================================

/// Builder returned by the `it` family. Decorators chain; the test is
/// registered when the builder drops (at the end of the statement).
pub struct ItBuilder<'a> {
    suite: &'a mut Suite,
    title: String,
    body: Option<Body>,
    only: bool,
    skip: bool,
    timeout_ms: Option<u64>,
    slow_ms: Option<u64>,
    retries: Option<u32>,
}

impl ItBuilder<'_> {
    /// Mark this test exclusive.
    pub fn only(mut self) -> Self {
        self.only = true;
        self
    }

    /// Report this test as pending without running it.
    pub fn skip(mut self) -> Self {
        self.skip = true;
        self
    }

    /// Fail the test if an attempt exceeds `ms` milliseconds; `0` disables
    /// the timeout.
    pub fn timeout(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Flag the test as slow above `ms` milliseconds.
    pub fn slow(mut self, ms: u64) -> Self {
        self.slow_ms = Some(ms);
        self
    }

    /// Retry the test up to `n` additional times on failure.
    pub fn retries(mut self, n: u32) -> Self {
        self.retries = Some(n);
        self
    }
}

impl Drop for ItBuilder<'_> {
    fn drop(&mut self) {
        let title = std::mem::take(&mut self.title);
        let mut test = Test::new(&self.suite.meta, &title, self.body.take())
            .unwrap_or_else(|err| panic!("latte: {err}"));
        if self.only {
            test.meta.config.only = true;
        }
        if self.skip {
            test.meta.config.skip = true;
        }
        if let Some(ms) = self.timeout_ms {
            test.meta.config.timeout_ms = ms;
        }
        if let Some(ms) = self.slow_ms {
            test.meta.config.slow_ms = ms;
        }
        if let Some(n) = self.retries {
            test.meta.config.retries = n;
        }
        self.suite.tests.push(test);
    }
}
