//! Async execution engine — depth-first traversal of the suite tree with
//! hook ordering, retries, timeouts, bail, and exclusive mode.
//!
//! The engine is a sequence of awaited steps on one logical thread: no two
//! runnables ever overlap, and the only suspension points are a job's
//! settlement and the cooperative yield between tests.

use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, trace};

use crate::error::TestError;
use crate::filter::Filter;
use crate::job::{self, Handle, Outcome, RunContext};
use crate::reporter::{Record, RecordKind, Reporter};
use crate::stats::Stats;
use crate::suite::{Hook, Suite, Test};

// ============================================================================
// RunConfig / RunReport
// ============================================================================

/// Run-wide configuration. Per-runnable defaults (timeout, slow, retries)
/// are part of the root [`Config`](crate::Config) at build time; this only
/// carries what the engine itself consults.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub filter: Filter,
    /// Halt the whole run on the first failure.
    pub bail: bool,
}

impl RunConfig {
    pub fn new() -> RunConfig {
        RunConfig::default()
    }

    pub fn bail(mut self, bail: bool) -> Self {
        self.bail = bail;
        self
    }

    pub fn grep(mut self, pattern: regex::Regex) -> Self {
        self.filter = self.filter.grep(pattern);
        self
    }

    pub fn fgrep(mut self, needle: impl Into<String>) -> Self {
        self.filter = self.filter.fgrep(needle);
        self
    }

    pub fn invert(mut self, invert: bool) -> Self {
        self.filter = self.filter.invert(invert);
        self
    }
}

/// Everything a run produced: counters, the ordered outcome list, and the
/// fatal error if an unattributable failure aborted the run.
#[derive(Debug)]
pub struct RunReport {
    pub stats: Stats,
    pub records: Vec<Record>,
    pub fatal: Option<TestError>,
}

impl RunReport {
    /// Failed records, in completion order.
    pub fn failures(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(|record| record.failed())
    }

    pub fn passed(&self) -> bool {
        self.stats.failures == 0 && self.fatal.is_none()
    }

    /// Process exit status: the failure count capped at 255, forced nonzero
    /// when the run died fatally.
    pub fn exit_code(&self) -> i32 {
        let code = self.stats.failures.min(255) as i32;
        if code == 0 && self.fatal.is_some() {
            1
        } else {
            code
        }
    }
}

// ============================================================================
// Flow control
// ============================================================================

/// How a completed step steers its enclosing loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    /// A hook failed: drop the owning suite's remaining own-level work but
    /// let sibling suites run.
    AbortSuite,
    /// Bail or fatal: unwind everything.
    Halt,
}

enum HookOutcome {
    Ok,
    Pending,
    Failed,
}

// ============================================================================
// Runner
// ============================================================================

/// The engine. Feed it a built [`Suite`] tree and await the report.
///
/// ```rust,no_run
/// use latte::{RunConfig, Runner, SpecReporter};
///
/// # async fn demo() {
/// let suite = latte::suite(|ctx| {
///     ctx.describe("Calculator", |ctx| {
///         ctx.it("adds two numbers", |_| {
///             assert_eq!(2 + 3, 5);
///         });
///     });
/// });
///
/// let report = Runner::new(RunConfig::default())
///     .reporter(SpecReporter::new())
///     .run(suite)
///     .await;
/// assert_eq!(report.exit_code(), 0);
/// # }
/// ```
pub struct Runner {
    config: RunConfig,
    reporters: Vec<Box<dyn Reporter>>,
    ctx: Arc<RunContext>,
    stats: Stats,
    records: Vec<Record>,
}

impl Runner {
    pub fn new(config: RunConfig) -> Runner {
        Runner {
            config,
            reporters: Vec::new(),
            ctx: RunContext::new(),
            stats: Stats::default(),
            records: Vec::new(),
        }
    }

    /// Attach a reporter. Reporters receive events in attachment order.
    pub fn reporter(mut self, reporter: impl Reporter + 'static) -> Runner {
        self.reporters.push(Box::new(reporter));
        self
    }

    /// Run the tree to completion and produce the report.
    pub async fn run(mut self, mut root: Suite) -> RunReport {
        root.apply_filter(&self.config.filter, false);
        let exclusive = root.has_only();
        debug!(exclusive, bail = self.config.bail, "run starting");

        self.stats.marker.mark();
        for reporter in &mut self.reporters {
            reporter.start();
        }

        let _ = self.run_suite(&mut root, exclusive, false).await;

        self.stats.marker.mark();
        let fatal = self.ctx.take_fatal();
        if let Some(err) = &fatal {
            debug!(%err, "run aborted by unattributable error");
        }

        let report = RunReport {
            stats: std::mem::take(&mut self.stats),
            records: std::mem::take(&mut self.records),
            fatal,
        };
        for reporter in &mut self.reporters {
            reporter.end(&report);
        }
        report
    }

    fn run_suite<'a>(
        &'a mut self,
        suite: &'a mut Suite,
        exclusive: bool,
        parent_pending: bool,
    ) -> BoxFuture<'a, Flow> {
        async move {
            // A suite with nothing to run is invisible: no events, no stats.
            if suite.total(&self.config.filter, exclusive) == 0 {
                return Flow::Continue;
            }

            self.stats.suites += 1;
            suite.meta.marker.mark();
            for reporter in &mut self.reporters {
                reporter.suite_start(&suite.meta);
            }
            trace!(suite = %suite.meta.full_title(), "suite start");

            let mut pending = parent_pending || suite.meta.config.skip;
            let mut flow = Flow::Continue;

            if !pending {
                for hook in &suite.before_all {
                    match self.run_hook(hook, None).await {
                        HookOutcome::Ok => {}
                        HookOutcome::Pending => {
                            pending = true;
                            break;
                        }
                        HookOutcome::Failed => {
                            flow = self.failure_flow();
                            break;
                        }
                    }
                }
            }

            if flow == Flow::Continue {
                let matching = suite.matching;
                let before_each = &suite.before_each;
                let after_each = &suite.after_each;
                for test in &mut suite.tests {
                    if !test.included(matching, &self.config.filter, exclusive) {
                        continue;
                    }
                    flow = self.run_test(test, before_each, after_each, pending).await;
                    if flow != Flow::Continue {
                        break;
                    }
                    // Cooperative yield so a finished test's leftover timers
                    // and microtasks cannot bleed into the next one.
                    tokio::task::yield_now().await;
                }
            }

            if flow == Flow::Continue {
                for child in &mut suite.suites {
                    flow = self.run_suite(child, exclusive, pending).await;
                    if flow == Flow::Halt {
                        break;
                    }
                }
            }

            // Cleanup runs even when the suite aborted early.
            if !pending {
                for hook in &suite.after_all {
                    match self.run_hook(hook, None).await {
                        HookOutcome::Ok | HookOutcome::Pending => {}
                        HookOutcome::Failed => {
                            if self.config.bail {
                                flow = Flow::Halt;
                            }
                            break;
                        }
                    }
                }
            }

            for reporter in &mut self.reporters {
                reporter.suite_end(&suite.meta);
            }
            suite.meta.marker.mark();
            trace!(suite = %suite.meta.full_title(), "suite end");

            // A hook abort is scoped to this suite; siblings continue.
            match flow {
                Flow::Halt => Flow::Halt,
                _ => Flow::Continue,
            }
        }
        .boxed()
    }

    async fn run_test(
        &mut self,
        test: &mut Test,
        before_each: &[Arc<Hook>],
        after_each: &[Arc<Hook>],
        suite_pending: bool,
    ) -> Flow {
        for reporter in &mut self.reporters {
            reporter.test_start(&test.meta);
        }
        trace!(test = %test.meta.full_title(), "test start");
        test.meta.marker.mark();
        test.current_retry = 0;

        let outcome = 'attempt: loop {
            // Configured skip short-circuits before any hook runs.
            if suite_pending || test.meta.config.skip || test.body.is_none() {
                break Outcome::Pending;
            }

            for hook in before_each {
                match self.run_hook(hook, Some(&test.meta.title)).await {
                    HookOutcome::Ok => {}
                    HookOutcome::Pending => break 'attempt Outcome::Pending,
                    HookOutcome::Failed => {
                        test.meta.marker.mark();
                        return self.failure_flow();
                    }
                }
            }

            let handle = Handle::new(test.meta.config);
            let body_outcome = match &test.body {
                Some(body) => job::run_body(&self.ctx, body, &handle).await,
                None => Outcome::Pending,
            };
            // Mutators on the handle persist onto the test.
            test.meta.config = handle.config();

            for hook in after_each {
                match self.run_hook(hook, Some(&test.meta.title)).await {
                    HookOutcome::Ok | HookOutcome::Pending => {}
                    HookOutcome::Failed => {
                        test.meta.marker.mark();
                        return self.failure_flow();
                    }
                }
            }

            match body_outcome {
                Outcome::Failed(err) if test.current_retry < test.meta.config.retries => {
                    test.current_retry += 1;
                    debug!(
                        test = %test.meta.full_title(),
                        retry = test.current_retry,
                        %err,
                        "retrying failed test"
                    );
                }
                terminal => break terminal,
            }
        };

        test.meta.marker.mark();
        let record = Record::new(
            test.meta.display_title(),
            test.meta.full_title(),
            RecordKind::Test,
            test.meta.depth,
            test.meta.marker.duration().as_millis() as u64,
            test.meta.config.slow_ms,
            test.current_retry,
            &outcome,
        );

        self.stats.tests += 1;
        match outcome {
            Outcome::Passed => self.stats.passes += 1,
            Outcome::Pending => self.stats.pending += 1,
            Outcome::Failed(_) => self.stats.failures += 1,
        }
        let failed = record.failed();
        for reporter in &mut self.reporters {
            reporter.test_end(&record);
        }
        self.records.push(record);

        if self.ctx.is_fatal() {
            return Flow::Halt;
        }
        if failed && self.config.bail {
            debug!("bail active; halting run");
            return Flow::Halt;
        }
        Flow::Continue
    }

    /// Run one hook attempt. A failed hook is recorded as a failed runnable
    /// under its invocation title; the caller decides how far to abort.
    async fn run_hook(&mut self, hook: &Hook, for_test: Option<&str>) -> HookOutcome {
        trace!(hook = %hook.title_for(for_test), "hook start");
        let handle = Handle::new(hook.meta.config);
        let started = Instant::now();
        let outcome = job::run_body(&self.ctx, &hook.body, &handle).await;

        match outcome {
            Outcome::Passed => HookOutcome::Ok,
            Outcome::Pending => HookOutcome::Pending,
            Outcome::Failed(err) => {
                let title = hook.title_for(for_test);
                debug!(hook = %title, %err, "hook failed");
                let full_title = if hook.meta.path.is_empty() {
                    title.clone()
                } else {
                    format!("{} {}", hook.meta.path.join(" "), title)
                };
                let record = Record::new(
                    title,
                    full_title,
                    RecordKind::Hook,
                    hook.meta.depth,
                    started.elapsed().as_millis() as u64,
                    hook.meta.config.slow_ms,
                    0,
                    &Outcome::Failed(err),
                );
                self.stats.failures += 1;
                for reporter in &mut self.reporters {
                    reporter.test_end(&record);
                }
                self.records.push(record);
                HookOutcome::Failed
            }
        }
    }

    fn failure_flow(&self) -> Flow {
        if self.config.bail || self.ctx.is_fatal() {
            Flow::Halt
        } else {
            Flow::AbortSuite
        }
    }
}
