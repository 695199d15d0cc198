use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use latte::{Body, RunConfig, Runner};

mod common;
use common::{Events, RecordingReporter};

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test]
async fn each_hooks_run_outer_to_inner_in_both_directions() {
    common::init_tracing();
    let log = Events::new();
    let suite = latte::suite(|ctx| {
        let log = log.clone();
        ctx.describe("A", move |ctx| {
            let l = log.clone();
            ctx.before_each(move |_| l.push("A.before"));
            let l = log.clone();
            ctx.after_each(move |_| l.push("A.after"));
            let log = log.clone();
            ctx.describe("B", move |ctx| {
                let l = log.clone();
                ctx.before_each(move |_| l.push("B.before"));
                let l = log.clone();
                ctx.after_each(move |_| l.push("B.after"));
                let log = log.clone();
                ctx.describe("C", move |ctx| {
                    let l = log.clone();
                    ctx.before_each(move |_| l.push("C.before"));
                    let l = log.clone();
                    ctx.after_each(move |_| l.push("C.after"));
                    let l = log.clone();
                    ctx.it("t", move |_| l.push("body"));
                });
            });
        });
    });

    let report = Runner::new(RunConfig::default()).run(suite).await;
    assert_eq!(report.stats.passes, 1);
    // after-each chains are NOT reversed: outermost ancestor first, both ways.
    assert_eq!(
        log.snapshot(),
        vec![
            "A.before", "B.before", "C.before", "body", "A.after", "B.after", "C.after",
        ]
    );
}

#[tokio::test]
async fn before_all_runs_once_per_suite_not_per_test() {
    let setups = Arc::new(AtomicU32::new(0));
    let suite = latte::suite(|ctx| {
        ctx.describe("db", |ctx| {
            let setups = setups.clone();
            ctx.before_all(move |_| {
                setups.fetch_add(1, Ordering::SeqCst);
            });
            ctx.it("t1", |_| {});
            ctx.it("t2", |_| {});
        });
    });

    let report = Runner::new(RunConfig::default()).run(suite).await;
    assert_eq!(report.stats.passes, 2);
    assert_eq!(setups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn async_hooks_participate_like_sync_ones() {
    let n = Arc::new(AtomicU32::new(0));
    let suite = latte::suite(|ctx| {
        let hook_n = n.clone();
        ctx.before_each_async(move |_| {
            let hook_n = hook_n.clone();
            async move {
                tokio::task::yield_now().await;
                hook_n.fetch_add(1, Ordering::SeqCst);
            }
        });
        let n = n.clone();
        ctx.it("sees the async setup", move |_| {
            assert_eq!(n.load(Ordering::SeqCst), 1);
        });
    });

    let report = Runner::new(RunConfig::default()).run(suite).await;
    assert_eq!(report.stats.passes, 1);
}

// ============================================================================
// Hook failures
// ============================================================================

#[tokio::test]
async fn a_failing_before_each_is_reported_under_the_test_it_ran_for() {
    let body_ran = Arc::new(AtomicBool::new(false));
    let suite = latte::suite(|ctx| {
        ctx.describe("broken", |ctx| {
            ctx.before_each(|_| panic!("no fixture"));
            let body_ran = body_ran.clone();
            ctx.it("t1", move |_| body_ran.store(true, Ordering::SeqCst));
            ctx.it("t2", |_| {});
        });
        ctx.describe("healthy sibling", |ctx| {
            ctx.it("still runs", |_| {});
        });
    });

    let report = Runner::new(RunConfig::default()).run(suite).await;

    assert_eq!(report.stats.failures, 1);
    let failed: Vec<_> = report.failures().collect();
    assert_eq!(failed[0].title, "\"before each\" hook for \"t1\"");
    assert!(failed[0].err.as_ref().unwrap().message.contains("no fixture"));
    assert!(!body_ran.load(Ordering::SeqCst));

    // The broken suite's remaining work is dropped; the sibling still runs.
    assert_eq!(report.stats.tests, 1);
    assert_eq!(report.stats.passes, 1);
}

#[tokio::test]
async fn a_failing_before_all_drops_the_suite_but_cleanup_still_runs() {
    let cleaned = Arc::new(AtomicBool::new(false));
    let events = Events::new();
    let suite = latte::suite(|ctx| {
        ctx.describe("doomed", |ctx| {
            ctx.before_all(|_| panic!("cannot connect"));
            let cleaned = cleaned.clone();
            ctx.after_all(move |_| cleaned.store(true, Ordering::SeqCst));
            ctx.it("never runs", |_| {});
        });
    });

    let report = Runner::new(RunConfig::default())
        .reporter(RecordingReporter::new(events.clone()))
        .run(suite)
        .await;

    assert_eq!(report.stats.failures, 1);
    assert_eq!(report.stats.tests, 0);
    let failed: Vec<_> = report.failures().collect();
    assert_eq!(failed[0].title, "\"before all\" hook");
    assert!(cleaned.load(Ordering::SeqCst));
    assert_eq!(events.count_matching("test start:"), 0);
}

#[tokio::test]
async fn labeled_hooks_carry_their_label_in_the_failure_title() {
    let suite = latte::suite(|ctx| {
        ctx.describe("db", |ctx| {
            ctx.before_all_body("open pool", Body::sync(|_| panic!("no db")));
            ctx.it("t", |_| {});
        });
    });

    let report = Runner::new(RunConfig::default()).run(suite).await;
    let failed: Vec<_> = report.failures().collect();
    assert_eq!(failed[0].title, "\"before all\" hook: open pool");
    assert_eq!(failed[0].full_title, "db \"before all\" hook: open pool");
}

#[tokio::test]
async fn a_failing_after_each_aborts_the_remaining_tests() {
    let suite = latte::suite(|ctx| {
        ctx.describe("teardown trouble", |ctx| {
            ctx.after_each(|_| panic!("cannot clean up"));
            ctx.it("t1", |_| {});
            ctx.it("t2", |_| {});
        });
    });

    let report = Runner::new(RunConfig::default()).run(suite).await;
    // t1's body passed but the suite aborts before t2.
    assert_eq!(report.stats.failures, 1);
    let failed: Vec<_> = report.failures().collect();
    assert_eq!(failed[0].title, "\"after each\" hook for \"t1\"");
    assert_eq!(report.stats.tests, 0);
}

#[tokio::test]
async fn a_hook_failure_with_bail_halts_everything() {
    let sibling_ran = Arc::new(AtomicBool::new(false));
    let suite = latte::suite(|ctx| {
        ctx.describe("broken", |ctx| {
            ctx.before_all(|_| panic!("x"));
            ctx.it("t", |_| {});
        });
        ctx.describe("sibling", |ctx| {
            let sibling_ran = sibling_ran.clone();
            ctx.it("t", move |_| sibling_ran.store(true, Ordering::SeqCst));
        });
    });

    let report = Runner::new(RunConfig::default().bail(true)).run(suite).await;
    assert_eq!(report.stats.failures, 1);
    assert!(!sibling_ran.load(Ordering::SeqCst));
}

// ============================================================================
// Runtime skip from hooks
// ============================================================================

#[tokio::test]
async fn skip_in_before_each_marks_the_test_pending() {
    let body_ran = Arc::new(AtomicBool::new(false));
    let suite = latte::suite(|ctx| {
        ctx.describe("conditional", |ctx| {
            ctx.before_each(|h| h.skip());
            let body_ran = body_ran.clone();
            ctx.it("t", move |_| body_ran.store(true, Ordering::SeqCst));
        });
    });

    let report = Runner::new(RunConfig::default()).run(suite).await;
    assert_eq!(report.stats.pending, 1);
    assert_eq!(report.stats.failures, 0);
    assert!(!body_ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn skip_in_before_all_marks_the_whole_suite_pending() {
    let each_ran = Arc::new(AtomicBool::new(false));
    let suite = latte::suite(|ctx| {
        ctx.describe("unavailable", |ctx| {
            ctx.before_all(|h| h.skip());
            let each_ran = each_ran.clone();
            ctx.before_each(move |_| each_ran.store(true, Ordering::SeqCst));
            ctx.it("t1", |_| {});
            ctx.it("t2", |_| {});
        });
    });

    let report = Runner::new(RunConfig::default()).run(suite).await;
    assert_eq!(report.stats.pending, 2);
    assert_eq!(report.stats.failures, 0);
    assert!(!each_ran.load(Ordering::SeqCst));
}
