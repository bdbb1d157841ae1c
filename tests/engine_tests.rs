//! End-to-end tests for the iteration engine.
//!
//! Drives complete runs through the public surface: bounded and unbounded
//! runs, the stop sentinel, bridge handoff, retry ladders, pause/resume
//! parking, lifecycle event ordering, and statistics bookkeeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio_test::{assert_pending, assert_ready, task};

use steploop::{
    create, create_retrying, Event, EventKind, ListenerId, PolicyOverrides, RunContext,
    StepOutcome,
};

#[derive(Debug, Error)]
#[error("{0}")]
struct StepError(&'static str);

/// Registers one recording listener per event kind and returns the log of
/// event names in emission order.
fn record_event_names(ctx: &RunContext<u64>) -> Arc<Mutex<Vec<String>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    for kind in [
        EventKind::Start,
        EventKind::Stop,
        EventKind::Pause,
        EventKind::Resume,
        EventKind::Error,
        EventKind::Retry,
        EventKind::Iteration,
    ] {
        let sink = Arc::clone(&log);
        ctx.on(kind, move |event| {
            sink.lock().unwrap().push(event.kind().as_str().to_string());
        });
    }
    log
}

// ============================================================================
// Bounded Runs
// ============================================================================

#[tokio::test]
async fn test_bounded_run_executes_exactly_limit_iterations() {
    let calls = Arc::new(AtomicU64::new(0));

    let step_calls = Arc::clone(&calls);
    let mut controller = create(PolicyOverrides::new().with_limit(4)).controller(
        move |ctx: RunContext<u64>, _: ()| {
            let calls = Arc::clone(&step_calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, StepError>(StepOutcome::Continue(ctx.bridge().unwrap_or(0) + 1))
            }
        },
    );

    let summary = controller.start(()).await.expect("Run should succeed");

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(summary.stats.executions, 4);
    assert_eq!(summary.value, Some(4));
}

#[tokio::test]
async fn test_bounded_run_event_sequence() {
    let mut controller = create(PolicyOverrides::new().with_limit(3)).controller(
        |_: RunContext<u64>, _: ()| async move { Ok::<_, StepError>(StepOutcome::Continue(1)) },
    );

    let log = record_event_names(&controller.context());
    controller.start(()).await.expect("Run should succeed");

    assert_eq!(
        *log.lock().unwrap(),
        ["start", "iteration", "iteration", "iteration", "stop"]
    );
}

#[tokio::test]
async fn test_zero_limit_emits_start_and_stop_only() {
    let calls = Arc::new(AtomicU64::new(0));

    let step_calls = Arc::clone(&calls);
    let mut controller = create(PolicyOverrides::new().with_limit(0)).controller(
        move |_: RunContext<u64>, _: ()| {
            let calls = Arc::clone(&step_calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, StepError>(StepOutcome::Continue(1))
            }
        },
    );

    let log = record_event_names(&controller.context());
    let summary = controller.start(()).await.expect("Run should succeed");

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(summary.stats.executions, 0);
    assert_eq!(*log.lock().unwrap(), ["start", "stop"]);
}

#[tokio::test]
async fn test_interval_run_completes_all_iterations() {
    let mut controller = create(
        PolicyOverrides::new()
            .with_limit(5)
            .with_interval(Duration::from_millis(10)),
    )
    .controller(|ctx: RunContext<u64>, _: ()| async move {
        Ok::<_, StepError>(StepOutcome::Continue(ctx.bridge().unwrap_or(0) + 1))
    });

    let summary = controller.start(()).await.expect("Run should succeed");

    assert_eq!(summary.value, Some(5));
    assert_eq!(summary.stats.executions, 5);
}

// ============================================================================
// Stop Sentinel
// ============================================================================

#[tokio::test]
async fn test_stop_sentinel_ends_run_after_completed_iterations() {
    let mut controller = create(PolicyOverrides::new().with_limit(10)).controller(
        |ctx: RunContext<u64>, _: ()| async move {
            let done = ctx.bridge().unwrap_or(0);
            if done >= 3 {
                Ok::<_, StepError>(StepOutcome::Stop)
            } else {
                Ok(StepOutcome::Continue(done + 1))
            }
        },
    );

    let log = record_event_names(&controller.context());
    let summary = controller.start(()).await.expect("Run should succeed");

    // The invocation that returned Stop is not a completed iteration.
    assert_eq!(summary.stats.executions, 3);
    assert_eq!(summary.value, Some(3));
    assert_eq!(
        *log.lock().unwrap(),
        ["start", "iteration", "iteration", "iteration", "stop"]
    );
}

#[tokio::test]
async fn test_stop_on_first_invocation_keeps_seed() {
    let mut controller = create(PolicyOverrides::new().with_limit(10))
        .controller(|_: RunContext<u64>, _: ()| async move {
            Ok::<_, StepError>(StepOutcome::Stop)
        })
        .with_seed(9);

    let summary = controller.start(()).await.expect("Run should succeed");

    assert_eq!(summary.stats.executions, 0);
    assert_eq!(summary.value, Some(9));
    assert!(summary.stats.completed_at.is_some());
}

#[tokio::test]
async fn test_unbounded_run_ends_by_stop_sentinel() {
    let mut controller = create(PolicyOverrides::new()).controller(
        |ctx: RunContext<u64>, _: ()| async move {
            let done = ctx.bridge().unwrap_or(0);
            if done >= 50 {
                Ok::<_, StepError>(StepOutcome::Stop)
            } else {
                Ok(StepOutcome::Continue(done + 1))
            }
        },
    );

    let summary = controller.start(()).await.expect("Run should succeed");

    assert_eq!(summary.stats.executions, 50);
    assert_eq!(summary.value, Some(50));
}

// ============================================================================
// Bridge Handoff
// ============================================================================

#[tokio::test]
async fn test_bridge_carries_value_between_iterations() {
    let seen = Arc::new(Mutex::new(Vec::new()));

    let step_seen = Arc::clone(&seen);
    let mut controller = create(PolicyOverrides::new().with_limit(3)).controller(
        move |ctx: RunContext<u64>, _: ()| {
            let seen = Arc::clone(&step_seen);
            async move {
                let entry = ctx.bridge();
                seen.lock().unwrap().push(entry);
                Ok::<_, StepError>(StepOutcome::Continue(entry.unwrap_or(0) + 1))
            }
        },
    );

    let summary = controller.start(()).await.expect("Run should succeed");

    assert_eq!(*seen.lock().unwrap(), vec![None, Some(1), Some(2)]);
    assert_eq!(summary.value, Some(3));
}

#[tokio::test]
async fn test_seed_visible_to_first_iteration() {
    let first = Arc::new(Mutex::new(None));

    let step_first = Arc::clone(&first);
    let mut controller = create(PolicyOverrides::new().with_limit(1))
        .controller(move |ctx: RunContext<u64>, _: ()| {
            let first = Arc::clone(&step_first);
            async move {
                *first.lock().unwrap() = ctx.bridge();
                Ok::<_, StepError>(StepOutcome::Continue(0))
            }
        })
        .with_seed(100);

    controller.start(()).await.expect("Run should succeed");

    assert_eq!(*first.lock().unwrap(), Some(100));
}

// ============================================================================
// Error Handling and Retries
// ============================================================================

#[tokio::test]
async fn test_error_propagates_when_retry_disabled() {
    let mut controller = create(PolicyOverrides::new().with_limit(5)).controller(
        |ctx: RunContext<u64>, _: ()| async move {
            if ctx.bridge().is_some() {
                Err(StepError("second iteration failed"))
            } else {
                Ok(StepOutcome::Continue(1))
            }
        },
    );

    let ctx = controller.context();
    let log = record_event_names(&ctx);
    let err = controller.start(()).await.expect_err("Run should fail");

    assert_eq!(err.iteration, 2);
    assert_eq!(err.attempts, 1);
    assert_eq!(err.source.to_string(), "second iteration failed");

    // The failed slot is consumed; termination bookkeeping is skipped.
    let stats = ctx.stats();
    assert_eq!(ctx.iteration_count(), 2);
    assert_eq!(stats.executions, 1);
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.retries, 0);
    assert!(stats.is_running);
    assert!(stats.completed_at.is_none());

    assert_eq!(*log.lock().unwrap(), ["start", "iteration", "error"]);
}

#[tokio::test]
async fn test_retry_then_success_within_budget() {
    let failures = Arc::new(AtomicU64::new(0));

    let step_failures = Arc::clone(&failures);
    let mut controller = create_retrying(
        PolicyOverrides::new()
            .with_limit(5)
            .with_max_retries(2)
            .with_retry_delay(Duration::from_millis(50)),
    )
    .controller(move |ctx: RunContext<u64>, _: ()| {
        let failures = Arc::clone(&step_failures);
        async move {
            if failures.load(Ordering::SeqCst) < 2 {
                failures.fetch_add(1, Ordering::SeqCst);
                return Err(StepError("transient"));
            }
            Ok(StepOutcome::Continue(ctx.bridge().unwrap_or(0) + 1))
        }
    });

    let log = record_event_names(&controller.context());
    let summary = controller.start(()).await.expect("Run should succeed");

    assert_eq!(summary.stats.executions, 5);
    assert_eq!(summary.stats.errors, 2);
    assert_eq!(summary.stats.retries, 2);
    assert_eq!(summary.value, Some(5));

    assert_eq!(
        *log.lock().unwrap(),
        [
            "start", "error", "retry", "error", "retry", "iteration", "iteration", "iteration",
            "iteration", "iteration", "stop"
        ]
    );
}

#[tokio::test]
async fn test_retries_exhausted_propagates_last_error() {
    let mut controller = create_retrying(
        PolicyOverrides::new()
            .with_limit(5)
            .with_max_retries(2)
            .with_retry_delay(Duration::ZERO),
    )
    .controller(|_: RunContext<u64>, _: ()| async move {
        Err::<StepOutcome<u64>, _>(StepError("permanent"))
    });

    let ctx = controller.context();
    let log = record_event_names(&ctx);
    let err = controller.start(()).await.expect_err("Run should fail");

    assert_eq!(err.iteration, 1);
    assert_eq!(err.attempts, 3);

    let stats = ctx.stats();
    assert_eq!(stats.errors, 3);
    assert_eq!(stats.retries, 2);
    assert_eq!(stats.executions, 0);

    assert_eq!(
        *log.lock().unwrap(),
        ["start", "error", "retry", "error", "retry", "error"]
    );
}

#[tokio::test]
async fn test_error_on_last_permitted_iteration_consumes_slot() {
    let mut controller = create(PolicyOverrides::new().with_limit(2)).controller(
        |ctx: RunContext<u64>, _: ()| async move {
            if ctx.iteration_count() == 1 {
                Err(StepError("boom"))
            } else {
                Ok(StepOutcome::Continue(1))
            }
        },
    );

    let ctx = controller.context();
    let err = controller.start(()).await.expect_err("Run should fail");

    assert_eq!(err.iteration, 2);
    assert_eq!(ctx.iteration_count(), 2);
    assert_eq!(ctx.stats().executions, 1);
}

#[tokio::test]
async fn test_retry_events_carry_attempt_numbers_and_delay() {
    let recorded = Arc::new(Mutex::new(Vec::new()));

    let mut controller = create_retrying(
        PolicyOverrides::new()
            .with_limit(1)
            .with_max_retries(2)
            .with_retry_delay(Duration::from_millis(5)),
    )
    .controller(|_: RunContext<u64>, _: ()| async move {
        Err::<StepOutcome<u64>, _>(StepError("flaky"))
    });

    let sink = Arc::clone(&recorded);
    controller.context().on(EventKind::Retry, move |event| {
        if let Event::Retry {
            attempt,
            delay,
            message,
        } = event
        {
            sink.lock().unwrap().push((*attempt, *delay, message.clone()));
        }
    });

    controller.start(()).await.expect_err("Run should fail");

    assert_eq!(
        *recorded.lock().unwrap(),
        vec![
            (2, Duration::from_millis(5), "flaky".to_string()),
            (3, Duration::from_millis(5), "flaky".to_string()),
        ]
    );
}

// ============================================================================
// Pause and Resume
// ============================================================================

#[test]
fn test_pre_armed_pause_parks_driver_before_first_iteration() {
    let calls = Arc::new(AtomicU64::new(0));

    let step_calls = Arc::clone(&calls);
    let mut controller = create(PolicyOverrides::new().with_limit(1)).controller(
        move |_: RunContext<u64>, _: ()| {
            let calls = Arc::clone(&step_calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, StepError>(StepOutcome::Continue(1))
            }
        },
    );

    let ctx = controller.context();
    ctx.pause();

    let mut run = task::spawn(controller.start(()));
    assert_pending!(run.poll());
    assert_pending!(run.poll());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(ctx.is_paused());

    ctx.resume();
    assert!(run.is_woken());

    let summary = assert_ready!(run.poll()).expect("Run should succeed");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(summary.stats.executions, 1);
}

#[tokio::test]
async fn test_pause_during_run_defers_next_iteration_until_resume() {
    let mut controller = create(PolicyOverrides::new().with_limit(3)).controller(
        |ctx: RunContext<u64>, _: ()| async move {
            let done = ctx.bridge().unwrap_or(0);
            if done == 1 {
                // Pause before finishing the second iteration; a helper
                // task lifts the pause shortly after.
                ctx.pause();
                let resumer = ctx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    resumer.resume();
                });
            }
            Ok::<_, StepError>(StepOutcome::Continue(done + 1))
        },
    );

    let log = record_event_names(&controller.context());
    let summary = controller.start(()).await.expect("Run should succeed");

    assert_eq!(summary.stats.executions, 3);
    assert_eq!(
        *log.lock().unwrap(),
        [
            "start",
            "iteration",
            "pause",
            "iteration",
            "resume",
            "iteration",
            "stop"
        ]
    );
}

// ============================================================================
// Listener Registry Semantics
// ============================================================================

#[tokio::test]
async fn test_listener_removed_mid_run_stops_observing() {
    let observed = Arc::new(AtomicU64::new(0));
    let id_slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));

    let mut controller = create(PolicyOverrides::new().with_limit(4)).controller(
        |_: RunContext<u64>, _: ()| async move {
            Ok::<_, StepError>(StepOutcome::Continue(1))
        },
    );

    let ctx = controller.context();
    let counter = Arc::clone(&observed);
    let slot = Arc::clone(&id_slot);
    let remover = ctx.clone();
    let id = ctx.on(EventKind::Iteration, move |_| {
        let seen = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if seen == 2 {
            if let Some(id) = *slot.lock().unwrap() {
                remover.off(EventKind::Iteration, id);
            }
        }
    });
    *id_slot.lock().unwrap() = Some(id);

    controller.start(()).await.expect("Run should succeed");

    // The listener saw iterations 1 and 2, removed itself during the
    // second emission, and missed 3 and 4.
    assert_eq!(observed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
#[should_panic(expected = "listener boom")]
async fn test_panicking_listener_aborts_run() {
    let mut controller = create(PolicyOverrides::new().with_limit(1)).controller(
        |_: RunContext<u64>, _: ()| async move {
            Ok::<_, StepError>(StepOutcome::Continue(1))
        },
    );

    controller.context().on(EventKind::Start, |_| {
        panic!("listener boom");
    });

    let _ = controller.start(()).await;
}

// ============================================================================
// Statistics
// ============================================================================

#[tokio::test]
async fn test_stats_track_counts_and_timing() {
    let mut controller = create(PolicyOverrides::new().with_limit(3)).controller(
        |ctx: RunContext<u64>, _: ()| async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<_, StepError>(StepOutcome::Continue(ctx.bridge().unwrap_or(0) + 1))
        },
    );

    let summary = controller.start(()).await.expect("Run should succeed");
    let stats = summary.stats;

    assert_eq!(stats.executions, 3);
    assert!(stats.total_execution_time >= Duration::from_millis(30));
    assert!(stats.average_execution_time >= Duration::from_millis(10));
    assert!(stats.total_execution_time >= stats.average_execution_time);
    assert!(!stats.is_running);

    let completed = stats.completed_at.expect("completed_at should be set");
    assert!(completed >= stats.started_at);
}

#[tokio::test]
async fn test_stats_serialize_to_json() {
    let mut controller = create(PolicyOverrides::new().with_limit(2)).controller(
        |_: RunContext<u64>, _: ()| async move {
            Ok::<_, StepError>(StepOutcome::Continue(1))
        },
    );

    let summary = controller.start(()).await.expect("Run should succeed");
    let json = serde_json::to_value(&summary.stats).expect("Stats should serialize");

    assert_eq!(json["executions"], 2);
    assert_eq!(json["errors"], 0);
    assert_eq!(json["is_running"], false);
    assert!(json["started_at"].is_string());
    assert!(json["completed_at"].is_string());
}
