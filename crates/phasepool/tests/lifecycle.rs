//! Startup, shutdown and cancellation

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use phasepool::{
    BatchKind, CancellationToken, CollectorPhase, PartialBatchPolicy, PhasePool, PoolConfig,
    PoolError, TaskError, WorkerPhase,
};
use tracing_test::traced_test;

const WAIT: Duration = Duration::from_secs(10);

fn config(n: usize) -> PoolConfig {
    PoolConfig::new()
        .num_workers(n)
        .poll_interval(Duration::from_millis(5))
}

fn wait_for(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT;
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_shutdown_idempotent() {
    let mut pool = PhasePool::<i64>::builder(config(4)).spawn().unwrap();
    assert!(!pool.is_shutdown());
    assert_eq!(pool.num_workers(), 4);

    let started = Instant::now();
    let summary = pool.shutdown().unwrap();
    assert!(started.elapsed() < WAIT);
    assert_eq!(summary.phases, 0);
    assert_eq!(summary.executed, 0);

    assert_eq!(pool.shutdown(), None);
    assert!(pool.is_shutdown());
    for i in 0..4 {
        assert_eq!(pool.worker_phase(i), Some(WorkerPhase::Stopped));
    }
    assert_eq!(pool.worker_phase(4), None);
    assert_eq!(pool.collector_phase(), CollectorPhase::Stopped);
    assert_eq!(pool.wait_report(Duration::from_millis(10)).unwrap_err(), PoolError::ShutDown);
}

#[test]
fn test_drop_stops_threads() {
    let (done_tx, done_rx) = mpsc::channel();
    {
        let pool = PhasePool::<i64>::builder(config(2)).spawn().unwrap();
        pool.spawn(move || {
            done_tx.send(()).unwrap();
            Ok::<_, String>(1)
        })
        .unwrap();
        done_rx.recv_timeout(WAIT).unwrap();
    }
    // reaching this point means drop joined every thread
}

#[test]
fn test_queued_jobs_abandoned() {
    let mut pool = PhasePool::<i64>::builder(config(1)).spawn().unwrap();

    let (gate_tx, gate_rx) = mpsc::channel::<()>();
    pool.spawn(move || {
        gate_rx.recv().ok();
        Ok::<_, String>(42)
    })
    .unwrap();

    let ran = Arc::new(AtomicUsize::new(0));
    for v in 0..3 {
        let ran = Arc::clone(&ran);
        pool.spawn(move || {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(v)
        })
        .unwrap();
    }
    wait_for("first task to start", || pool.worker_phase(0) == Some(WorkerPhase::Execute));

    // stop through the token while the first task is still running
    pool.cancel_token().cancel();
    wait_for("queued jobs to be abandoned", || pool.stats().abandoned == 3);
    assert!(pool.is_shutdown());
    assert_eq!(pool.queue_depths().pending, 0);

    gate_tx.send(()).unwrap();
    let summary = pool.shutdown().unwrap();
    assert_eq!(summary.abandoned, 3);
    assert_eq!(summary.executed, 1);

    // queued closures were dropped without running
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(Arc::strong_count(&ran), 1);

    // the running task still completed and was drained
    let reports = pool.drain_reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].aggregate, 42);
}

#[test]
fn test_dropped_handles_resolve_abandoned() {
    let mut pool = PhasePool::<i64>::builder(config(1).partial_batch(PartialBatchPolicy::Stall))
        .spawn()
        .unwrap();
    pool.shutdown();

    let (promise, handle) = phasepool::pair::<i64>();
    assert_eq!(pool.submit(handle, move || promise.fulfill(1)), Err(PoolError::ShutDown));

    let (promise, handle) = phasepool::pair::<i64>();
    drop(promise);
    assert_eq!(handle.wait(), Err(TaskError::Abandoned));
}

#[test]
fn test_shutdown_waits_for_handed_off_promise() {
    let mut pool = PhasePool::<i64>::builder(config(2).partial_batch(PartialBatchPolicy::Stall))
        .spawn()
        .unwrap();

    let (promise, handle) = phasepool::pair::<i64>();
    let helper = Arc::new(std::sync::Mutex::new(None));
    let slot = Arc::clone(&helper);
    pool.submit(handle, move || {
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            promise.fulfill(17);
        });
        *slot.lock().unwrap() = Some(worker);
    })
    .unwrap();
    wait_for("first arrival", || pool.stats().arrived == 1);

    let summary = pool.shutdown().unwrap();
    assert_eq!(summary.executed, 1);
    let reports = pool.drain_reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].kind, BatchKind::Final);
    assert_eq!(reports[0].aggregate, 17);
    assert!(reports[0].is_clean());

    if let Some(worker) = helper.lock().unwrap().take() {
        worker.join().unwrap();
    };
}

#[test]
fn test_parent_token_cancels_pool() {
    let parent = CancellationToken::new();
    let mut pool = PhasePool::<i64>::builder(config(3).partial_batch(PartialBatchPolicy::Stall))
        .cancel_token(&parent)
        .spawn()
        .unwrap();

    pool.spawn(|| Ok::<_, String>(1)).unwrap();
    wait_for("first arrival", || pool.stats().arrived == 1);

    parent.cancel();
    wait_for("collector to stop", || pool.collector_phase() == CollectorPhase::Stopped);
    assert!(pool.is_shutdown());
    assert!(pool.spawn(|| Ok::<_, String>(2)).is_err());

    let summary = pool.shutdown().unwrap();
    assert_eq!(summary.executed, 1);
    let report = pool.wait_report(WAIT).unwrap();
    assert_eq!(report.kind, BatchKind::Final);
    assert_eq!(report.aggregate, 1);
}

#[test]
fn test_pool_token_does_not_cancel_parent() {
    let parent = CancellationToken::new();
    let mut pool = PhasePool::<i64>::builder(config(1))
        .cancel_token(&parent)
        .spawn()
        .unwrap();
    pool.shutdown();
    assert!(pool.cancel_token().is_cancelled());
    assert!(!parent.is_cancelled());
}

#[test]
#[traced_test]
fn test_stall_warning_logged() {
    let mut pool = PhasePool::<i64>::builder(
        config(3)
            .partial_batch(PartialBatchPolicy::Stall)
            .stall_warning(Some(Duration::from_millis(20))),
    )
    .spawn()
    .unwrap();

    pool.spawn(|| Ok::<_, String>(1)).unwrap();
    wait_for("stall diagnostic", || pool.stats().stalled_phases == 1);
    assert!(logs_contain("phase stalled"));
    assert!(pool.try_report().is_none());

    // once the batch fills it completes normally
    pool.spawn(|| Ok::<_, String>(2)).unwrap();
    pool.spawn(|| Ok::<_, String>(3)).unwrap();
    let report = pool.wait_report(WAIT).unwrap();
    assert_eq!(report.kind, BatchKind::Full);
    assert_eq!(report.aggregate, 6);
    assert_eq!(pool.stats().stalled_phases, 1);
    pool.shutdown();
}

#[test]
fn test_invalid_config_rejected() {
    assert_eq!(PhasePool::<i64>::new(0).unwrap_err(), PoolError::ZeroWorkers);
    assert!(matches!(
        PhasePool::<i64>::builder(config(2).thread_prefix("")).spawn(),
        Err(PoolError::Config(_))
    ));
}
