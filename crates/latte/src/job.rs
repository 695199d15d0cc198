//! Job controller — runs one runnable body exactly once per attempt.
//!
//! A job wraps a body (synchronous, future-returning, or callback-style) in
//! a uniform settle-once abstraction racing a timeout. Exactly one terminal
//! resolution is delivered per attempt; anything arriving after that is a
//! stray and is routed by [`RunContext`] to whichever job is active, or to
//! the run-fatal path when none is.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::error::TestError;
use crate::suite::Config;

// ============================================================================
// Outcome
// ============================================================================

/// Terminal outcome of one body attempt. The skip signal is a variant, not
/// an error: it can never leak into a reporter or the fatal path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed(TestError),
    Pending,
}

// ============================================================================
// Body — the three completion protocols
// ============================================================================

/// A runnable body. The registration form picks the completion protocol, so
/// exactly one completion channel exists per body.
pub enum Body {
    /// Runs to completion on the engine thread; a panic is the only failure
    /// signal. Timeouts cannot preempt it.
    Sync(Box<dyn Fn(&Handle) + Send + Sync>),
    /// Returns a future; settlement is the future resolving (or panicking).
    Future(Box<dyn Fn(Handle) -> BoxFuture<'static, ()> + Send + Sync>),
    /// Receives a [`Done`] handle; settlement is the first `done` call.
    Callback(Box<dyn Fn(Handle, Done) + Send + Sync>),
}

impl Body {
    pub fn sync(f: impl Fn(&Handle) + Send + Sync + 'static) -> Body {
        Body::Sync(Box::new(f))
    }

    pub fn future<F, Fut>(f: F) -> Body
    where
        F: Fn(Handle) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        Body::Future(Box::new(move |handle| f(handle).boxed()))
    }

    pub fn callback(f: impl Fn(Handle, Done) + Send + Sync + 'static) -> Body {
        Body::Callback(Box::new(f))
    }
}

// ============================================================================
// Handle — the ambient context passed to every body
// ============================================================================

struct AttemptState {
    config: Config,
    skip: bool,
}

/// Handle passed to every body. Mutators adjust the current runnable's
/// configuration; [`skip`](Handle::skip) marks the attempt pending.
#[derive(Clone)]
pub struct Handle {
    state: Arc<Mutex<AttemptState>>,
}

impl Handle {
    pub(crate) fn new(config: Config) -> Handle {
        Handle {
            state: Arc::new(Mutex::new(AttemptState { config, skip: false })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AttemptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the timeout in milliseconds; `0` disables it.
    pub fn timeout(&self, ms: u64) {
        self.lock().config.timeout_ms = ms;
    }

    /// Set the slow threshold in milliseconds.
    pub fn slow(&self, ms: u64) {
        self.lock().config.slow_ms = ms;
    }

    /// Set the retry budget for this runnable.
    pub fn retries(&self, n: u32) {
        self.lock().config.retries = n;
    }

    /// Mark the current attempt pending. Return from the body right after;
    /// [`skip!`](crate::skip) does both.
    pub fn skip(&self) {
        self.lock().skip = true;
    }

    pub(crate) fn config(&self) -> Config {
        self.lock().config
    }

    pub(crate) fn skip_requested(&self) -> bool {
        self.lock().skip
    }
}

// ============================================================================
// Done — callback-style settlement
// ============================================================================

/// Completion callback handed to [`Body::Callback`] bodies. Cloneable so it
/// can be moved into spawned work; the first settlement wins, and any extra
/// call surfaces as a "done() called multiple times" failure.
#[derive(Clone)]
pub struct Done {
    gen: u64,
    calls: Arc<AtomicU32>,
    ctx: Arc<RunContext>,
}

impl Done {
    fn new(gen: u64, ctx: Arc<RunContext>) -> Done {
        Done {
            gen,
            calls: Arc::new(AtomicU32::new(0)),
            ctx,
        }
    }

    /// Settle the current attempt successfully.
    pub fn ok(&self) {
        self.settle(Ok(()));
    }

    /// Settle the current attempt with a failure.
    pub fn err(&self, message: impl Into<String>) {
        self.settle(Err(TestError::Failed(message.into())));
    }

    fn settle(&self, result: Result<(), TestError>) {
        let prior = self.calls.fetch_add(1, Ordering::SeqCst);
        if prior > 0 {
            self.ctx.route(self.gen, Err(TestError::MultipleDone));
        } else {
            self.ctx.route(self.gen, result);
        }
    }
}

// ============================================================================
// RunContext — the single-active-job slot and stray routing
// ============================================================================

type Settlement = Result<(), TestError>;

struct JobSlot {
    gen: u64,
    tx: mpsc::UnboundedSender<Settlement>,
}

/// Run-wide shared state: the single in-flight job and the fatal-error cell.
///
/// Invariant: at most one job is active process-wide at any instant. The
/// engine owns begin/end pairing; violating it is an internal bug, asserted.
pub(crate) struct RunContext {
    current: Mutex<Option<JobSlot>>,
    next_gen: AtomicU64,
    fatal: Mutex<Option<TestError>>,
}

impl RunContext {
    pub(crate) fn new() -> Arc<RunContext> {
        Arc::new(RunContext {
            current: Mutex::new(None),
            next_gen: AtomicU64::new(0),
            fatal: Mutex::new(None),
        })
    }

    fn lock_current(&self) -> MutexGuard<'_, Option<JobSlot>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> (u64, mpsc::UnboundedReceiver<Settlement>) {
        let mut slot = self.lock_current();
        assert!(
            slot.is_none(),
            "latte: internal error: a job is already active"
        );
        let gen = self.next_gen.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = mpsc::unbounded_channel();
        *slot = Some(JobSlot { gen, tx });
        trace!(gen, "job begin");
        (gen, rx)
    }

    fn end(&self, gen: u64) {
        let mut slot = self.lock_current();
        if slot.as_ref().map_or(false, |s| s.gen == gen) {
            *slot = None;
            trace!(gen, "job end");
        }
    }

    /// Deliver a settlement to its attempt. A settlement whose attempt is no
    /// longer current is a stray: a stray success is dropped, a stray error
    /// fails the currently active job if one exists, else aborts the run.
    pub(crate) fn route(&self, gen: u64, result: Settlement) {
        let slot = self.lock_current();
        match &*slot {
            Some(current) if current.gen == gen => {
                let _ = current.tx.send(result);
            }
            Some(current) => match result {
                Ok(()) => trace!(gen, "late settlement from a finished attempt dropped"),
                Err(err) => {
                    warn!(%err, gen, active = current.gen, "stray error routed to the active job");
                    let _ = current.tx.send(Err(err));
                }
            },
            None => match result {
                Ok(()) => trace!(gen, "late settlement with no active job dropped"),
                Err(err) => {
                    warn!(%err, gen, "unattributable error with no active job; aborting the run");
                    let mut fatal = self.fatal.lock().unwrap_or_else(PoisonError::into_inner);
                    if fatal.is_none() {
                        *fatal = Some(err);
                    }
                }
            },
        }
    }

    pub(crate) fn is_fatal(&self) -> bool {
        self.fatal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub(crate) fn take_fatal(&self) -> Option<TestError> {
        self.fatal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

// ============================================================================
// Running one attempt
// ============================================================================

/// Run one body attempt to a terminal [`Outcome`].
///
/// The timeout is sampled after the body's synchronous prefix, so a
/// `handle.timeout(..)` call at the top of a body applies to this attempt.
pub(crate) async fn run_body(ctx: &Arc<RunContext>, body: &Body, handle: &Handle) -> Outcome {
    let (gen, mut rx) = ctx.begin();

    let result = match body {
        Body::Sync(f) => match catch_unwind(AssertUnwindSafe(|| f(handle))) {
            // A stray error routed here while the body ran still fails it.
            Ok(()) => match rx.try_recv() {
                Ok(Err(err)) => Err(err),
                _ => Ok(()),
            },
            Err(payload) => Err(TestError::Failed(panic_message(payload))),
        },

        Body::Future(f) => match catch_unwind(AssertUnwindSafe(|| f(handle.clone()))) {
            Err(payload) => Err(TestError::Failed(panic_message(payload))),
            Ok(fut) => {
                let mut caught = AssertUnwindSafe(fut).catch_unwind();
                let timeout_ms = effective_timeout(handle);
                if timeout_ms == 0 {
                    tokio::select! {
                        settled = &mut caught => from_unwind(settled),
                        Some(stray) = rx.recv() => stray,
                    }
                } else {
                    tokio::select! {
                        settled = &mut caught => from_unwind(settled),
                        Some(stray) = rx.recv() => stray,
                        _ = tokio::time::sleep(Duration::from_millis(timeout_ms)) => {
                            Err(TestError::Timeout(timeout_ms))
                        }
                    }
                }
            }
        },

        Body::Callback(f) => {
            let done = Done::new(gen, Arc::clone(ctx));
            match catch_unwind(AssertUnwindSafe(|| f(handle.clone(), done))) {
                Err(payload) => Err(TestError::Failed(panic_message(payload))),
                Ok(()) => {
                    let timeout_ms = effective_timeout(handle);
                    let first = if timeout_ms == 0 {
                        rx.recv().await
                    } else {
                        tokio::select! {
                            settlement = rx.recv() => settlement,
                            _ = tokio::time::sleep(Duration::from_millis(timeout_ms)) => {
                                Some(Err(TestError::Timeout(timeout_ms)))
                            }
                        }
                    };
                    let mut result = first
                        .unwrap_or_else(|| Err(TestError::Failed("settlement channel closed".into())));
                    // A body that settled twice back-to-back has both
                    // messages queued already.
                    if result.is_ok() {
                        if let Ok(extra) = rx.try_recv() {
                            result = Err(match extra {
                                Err(err) => err,
                                Ok(()) => TestError::MultipleDone,
                            });
                        }
                    }
                    result
                }
            }
        }
    };

    ctx.end(gen);

    if handle.skip_requested() {
        return Outcome::Pending;
    }
    match result {
        Ok(()) => Outcome::Passed,
        Err(err) => Outcome::Failed(err),
    }
}

fn effective_timeout(handle: &Handle) -> u64 {
    let config = handle.config();
    if config.timeouts_enabled {
        config.timeout_ms
    } else {
        0
    }
}

fn from_unwind(settled: Result<(), Box<dyn std::any::Any + Send>>) -> Result<(), TestError> {
    settled.map_err(|payload| TestError::Failed(panic_message(payload)))
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
