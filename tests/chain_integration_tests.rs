//! Integration tests for chain execution on a real runtime.
//!
//! These tests verify the executor contract end to end:
//! - steps run exactly once, in declaration order, across real thread hops
//! - the terminal consumer fires exactly once, after all steps, on the UI thread
//! - error handlers recover and replace the carried value
//! - unhandled failures abort silently, observable only via `on_chain_failed`
//! - independent chains make progress concurrently

use hopchain::{ChainRuntime, StepError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread::ThreadId;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

#[test]
fn test_steps_run_in_declaration_order_then_terminal() {
    let runtime = ChainRuntime::new().unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, done_rx) = mpsc::channel();

    let o0 = Arc::clone(&order);
    let o1 = Arc::clone(&order);
    let o2 = Arc::clone(&order);
    let o3 = Arc::clone(&order);
    let o4 = Arc::clone(&order);

    runtime
        .chain()
        .supply_on_worker(move || {
            o0.lock().unwrap().push(0);
            1u32
        })
        .function_on_ui(move |v: u32| {
            o1.lock().unwrap().push(1);
            v + 1
        })
        .consume_on_worker(move |_: Option<&u32>| {
            o2.lock().unwrap().push(2);
        })
        .function_on_worker(move |v: u32| {
            o3.lock().unwrap().push(3);
            v + 1
        })
        .execute(move |value: Option<u32>| {
            o4.lock().unwrap().push(4);
            done_tx.send(value).unwrap();
        });

    let value = done_rx.recv_timeout(WAIT).unwrap();
    assert_eq!(value, Some(3));
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_worker_supplies_x_ui_appends_y() {
    let runtime = ChainRuntime::new().unwrap();
    let (done_tx, done_rx) = mpsc::channel();

    runtime
        .chain()
        .supply_on_worker(|| "X".to_string())
        .function_on_ui(|v: String| format!("{v}Y"))
        .execute(move |value: Option<String>| {
            done_tx.send(value).unwrap();
        });

    assert_eq!(done_rx.recv_timeout(WAIT).unwrap().as_deref(), Some("XY"));
}

#[test]
fn test_error_handler_provides_fallback_value() {
    let runtime = ChainRuntime::new().unwrap();
    let seen_by_consumer = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&seen_by_consumer);
    let (done_tx, done_rx) = mpsc::channel();

    runtime
        .chain()
        .try_supply_on_worker(|| -> anyhow::Result<String> { anyhow::bail!("source offline") })
        .on_error(|_err| "fallback".to_string())
        .consume_on_ui(move |v: Option<&String>| {
            *seen.lock().unwrap() = v.cloned();
        })
        .function_on_worker(|v: String| format!("{v}-derived"))
        .execute(move |value: Option<String>| {
            done_tx.send(value).unwrap();
        });

    let value = done_rx.recv_timeout(WAIT).unwrap();
    assert_eq!(value.as_deref(), Some("fallback-derived"));
    assert_eq!(seen_by_consumer.lock().unwrap().as_deref(), Some("fallback"));
}

#[test]
fn test_handler_runs_exactly_once() {
    let runtime = ChainRuntime::new().unwrap();
    let handler_runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&handler_runs);
    let (done_tx, done_rx) = mpsc::channel();

    runtime
        .chain()
        .try_supply_on_worker(|| -> anyhow::Result<u32> { anyhow::bail!("nope") })
        .on_error(move |_err| {
            counter.fetch_add(1, Ordering::SeqCst);
            7u32
        })
        .execute(move |value: Option<u32>| {
            done_tx.send(value).unwrap();
        });

    assert_eq!(done_rx.recv_timeout(WAIT).unwrap(), Some(7));
    assert_eq!(handler_runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unhandled_failure_skips_rest_and_terminal() {
    let runtime = ChainRuntime::new().unwrap();
    let later_steps = Arc::new(AtomicUsize::new(0));
    let later_clone = Arc::clone(&later_steps);
    let terminal_runs = Arc::new(AtomicUsize::new(0));
    let terminal_clone = Arc::clone(&terminal_runs);
    let (failed_tx, failed_rx) = mpsc::channel();

    runtime
        .chain()
        .supply_on_worker(|| 1u32)
        .try_function_on_worker(|_: u32| -> anyhow::Result<u32> { anyhow::bail!("fatal") })
        .consume_on_ui(move |_: Option<&u32>| {
            later_clone.fetch_add(1, Ordering::SeqCst);
        })
        .on_chain_failed(move |err| {
            failed_tx.send(err).unwrap();
        })
        .execute(move |_: Option<u32>| {
            terminal_clone.fetch_add(1, Ordering::SeqCst);
        });

    let err = failed_rx.recv_timeout(WAIT).unwrap();
    assert!(matches!(err, StepError::Failed { index: 1, .. }));

    // Give any wrongly-scheduled work a moment to surface.
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(later_steps.load(Ordering::SeqCst), 0);
    assert_eq!(terminal_runs.load(Ordering::SeqCst), 0);
}

#[test]
fn test_panicking_step_without_handler_aborts() {
    let runtime = ChainRuntime::new().unwrap();
    let (failed_tx, failed_rx) = mpsc::channel();

    runtime
        .chain()
        .supply_on_worker(|| -> u32 { panic!("worker step exploded") })
        .on_chain_failed(move |err| {
            failed_tx.send(err).unwrap();
        })
        .execute(|_: Option<u32>| {});

    let err = failed_rx.recv_timeout(WAIT).unwrap();
    assert!(matches!(err, StepError::Panicked { index: 0, .. }));
    assert!(err.to_string().contains("worker step exploded"));
}

#[test]
fn test_ui_steps_share_one_thread_workers_do_not() {
    let runtime = ChainRuntime::new().unwrap();
    let ui_ids: Arc<Mutex<Vec<ThreadId>>> = Arc::new(Mutex::new(Vec::new()));
    let worker_ids: Arc<Mutex<Vec<ThreadId>>> = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, done_rx) = mpsc::channel();

    let u1 = Arc::clone(&ui_ids);
    let u2 = Arc::clone(&ui_ids);
    let w1 = Arc::clone(&worker_ids);
    let w2 = Arc::clone(&worker_ids);
    let terminal_ui_ids = Arc::clone(&ui_ids);

    runtime
        .chain()
        .supply_on_ui(move || {
            u1.lock().unwrap().push(std::thread::current().id());
            0u8
        })
        .consume_on_worker(move |_: Option<&u8>| {
            w1.lock().unwrap().push(std::thread::current().id());
        })
        .function_on_ui(move |v: u8| {
            u2.lock().unwrap().push(std::thread::current().id());
            v
        })
        .consume_on_worker(move |_: Option<&u8>| {
            w2.lock().unwrap().push(std::thread::current().id());
        })
        .execute(move |_: Option<u8>| {
            terminal_ui_ids
                .lock()
                .unwrap()
                .push(std::thread::current().id());
            done_tx.send(()).unwrap();
        });

    done_rx.recv_timeout(WAIT).unwrap();

    let ui_ids = ui_ids.lock().unwrap();
    let worker_ids = worker_ids.lock().unwrap();

    // Two UI steps plus the terminal consumer, all on the one UI thread.
    assert_eq!(ui_ids.len(), 3);
    assert!(ui_ids.iter().all(|id| *id == ui_ids[0]));

    // Worker steps never land on the UI thread.
    assert_eq!(worker_ids.len(), 2);
    assert!(worker_ids.iter().all(|id| *id != ui_ids[0]));
}

#[test]
fn test_independent_chains_run_concurrently() {
    let runtime = ChainRuntime::new().unwrap();

    // Chain A blocks in a worker step until chain B's worker step feeds it.
    // Completion of A therefore proves B ran while A was still in flight.
    let (feed_tx, feed_rx) = mpsc::channel::<&str>();
    let (a_done_tx, a_done_rx) = mpsc::channel();
    let (b_done_tx, b_done_rx) = mpsc::channel();

    runtime
        .chain()
        .supply_on_worker(move || feed_rx.recv_timeout(WAIT).unwrap().to_string())
        .execute(move |value: Option<String>| {
            a_done_tx.send(value).unwrap();
        });

    runtime
        .chain()
        .supply_on_worker(move || {
            feed_tx.send("from-b").unwrap();
            "b-done".to_string()
        })
        .execute(move |value: Option<String>| {
            b_done_tx.send(value).unwrap();
        });

    assert_eq!(
        a_done_rx.recv_timeout(WAIT).unwrap().as_deref(),
        Some("from-b")
    );
    assert_eq!(
        b_done_rx.recv_timeout(WAIT).unwrap().as_deref(),
        Some("b-done")
    );
}

#[test]
fn test_metrics_reflect_completed_chain() {
    let runtime = ChainRuntime::new().unwrap();
    let metrics = runtime.metrics();
    let (done_tx, done_rx) = mpsc::channel();

    runtime
        .chain()
        .supply_on_worker(|| 1u32)
        .function_on_ui(|v: u32| v + 1)
        .consume_on_worker(|_: Option<&u32>| {})
        .execute(move |_: Option<u32>| {
            done_tx.send(()).unwrap();
        });

    done_rx.recv_timeout(WAIT).unwrap();

    // Completion is recorded just after the terminal consumer returns;
    // poll briefly to avoid racing that last store.
    let deadline = std::time::Instant::now() + WAIT;
    while metrics.chains_completed.load(Ordering::Relaxed) == 0
        && std::time::Instant::now() < deadline
    {
        std::thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(metrics.chains_started.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.chains_completed.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.steps_executed.load(Ordering::Relaxed), 3);
    assert_eq!(metrics.chains_aborted.load(Ordering::Relaxed), 0);
}
