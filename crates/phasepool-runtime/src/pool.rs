//! Pool handle: construction, submission, reports and shutdown
//!
//! ```ignore
//! let mut pool = PhasePool::<i64>::new(5)?;
//! for i in 0..20 {
//!     let id = (i % 5) as i64;
//!     pool.spawn(move || Ok::<_, String>(id * 10))?;
//! }
//! for _ in 0..4 {
//!     let report = pool.wait_report(Duration::from_secs(1))?;
//!     assert_eq!(report.aggregate, 100);
//! }
//! pool.shutdown();
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use phasepool_core::{
    Aggregate, CancellationToken, CollectorPhase, PhaseReport, PoolError, PoolResult,
    SubmissionId, Sum, WorkerError, WorkerId, WorkerPhase,
};

use crate::collector::collector_loop;
use crate::config::PoolConfig;
use crate::handle::{self, ResultHandle};
use crate::reports::{ReportCallback, ReportLog};
use crate::shared::{Job, Shared, Signal};
use crate::worker::worker_loop;

/// Counters snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub submitted: u64,
    pub executed: u64,
    /// Queued jobs dropped by shutdown
    pub abandoned: u64,
    /// Barrier releases (full, partial and final)
    pub phases: u64,
    pub stalled_phases: u64,
    pub pending: usize,
    pub dispatched: usize,
    /// Arrivals in the current generation
    pub arrived: usize,
}

/// Jobs waiting for a worker, and handles waiting to be drained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueDepths {
    pub pending: usize,
    pub dispatched: usize,
}

/// Returned by the first `shutdown` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownSummary {
    pub abandoned: u64,
    pub phases: u64,
    pub executed: u64,
    /// Pool threads whose join reported a panic
    pub thread_panics: Vec<WorkerError>,
}

/// Barrier-synchronized worker pool
///
/// N workers execute tasks in phases of N. Once all N tasks of a phase are
/// done, the collector drains their results in submission order, folds the
/// successful ones with `A` and publishes a `PhaseReport` before releasing
/// the workers into the next phase.
///
/// Tasks are expected to arrive in multiples of N. A trailing batch with
/// fewer tasks is handled according to `PoolConfig::partial_batch`.
pub struct PhasePool<T: Send + 'static, A: Aggregate<T> = Sum> {
    shared: Arc<Shared<T>>,
    reports: Arc<ReportLog<PhaseReport<A::Output>>>,
    workers: Vec<JoinHandle<()>>,
    collector: Option<JoinHandle<()>>,
    joined: bool,
    _aggregate: PhantomData<fn() -> A>,
}

impl<T> PhasePool<T, Sum>
where
    T: Send + 'static,
    Sum: Aggregate<T>,
{
    /// Start a summing pool with `num_workers` workers
    ///
    /// Other settings come from `PoolConfig::from_env`.
    pub fn new(num_workers: usize) -> PoolResult<Self> {
        Self::builder(PoolConfig::from_env().num_workers(num_workers)).spawn()
    }

    pub fn builder(config: PoolConfig) -> PoolBuilder<T, Sum> {
        PoolBuilder::new(config)
    }
}

impl<T, A> PhasePool<T, A>
where
    T: Send + 'static,
    A: Aggregate<T>,
{
    /// Submit a task together with the handle its outcome arrives on
    ///
    /// The task is expected to complete the `Promise` paired with `handle`.
    /// Fails with `ShutDown` once stop was requested.
    pub fn submit<F>(&self, handle: ResultHandle<T>, task: F) -> PoolResult<SubmissionId>
    where
        F: FnOnce() + Send + 'static,
    {
        let id = {
            let mut state = self.shared.monitor.lock();
            if state.stop {
                return Err(PoolError::ShutDown);
            }
            if self.shared.token.is_cancelled() {
                return Err(PoolError::Cancelled);
            }
            let id = state.next_id;
            state.next_id = id.next();
            state.submitted += 1;
            state.queue.push(Job {
                id,
                task: Box::new(task),
                handle,
            });
            id
        };
        self.shared.monitor.notify_one(Signal::TaskReady);
        tracing::trace!(submission = %id, "task submitted");
        Ok(id)
    }

    /// Submit a fallible closure; `Err(e)` becomes `TaskError::Failed`
    pub fn spawn<F, E>(&self, f: F) -> PoolResult<SubmissionId>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        E: fmt::Display,
    {
        let (promise, handle) = handle::pair();
        self.submit(handle, move || match f() {
            Ok(value) => promise.fulfill(value),
            Err(err) => promise.fail(err),
        })
    }

    /// Next unread report, if any
    pub fn try_report(&self) -> Option<PhaseReport<A::Output>> {
        self.reports.try_next()
    }

    /// Block for the next report
    ///
    /// Fails with `Timeout`, or with `ShutDown` when the collector has
    /// exited and every report was read.
    pub fn wait_report(&self, timeout: Duration) -> PoolResult<PhaseReport<A::Output>> {
        self.reports.wait_next(timeout)
    }

    /// Every unread report, oldest first
    pub fn drain_reports(&self) -> Vec<PhaseReport<A::Output>> {
        self.reports.drain()
    }

    /// Phases published so far
    pub fn phases_completed(&self) -> u64 {
        self.reports.published()
    }

    #[inline]
    pub fn num_workers(&self) -> usize {
        self.shared.config.num_workers
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// The pool's cancellation token; cancelling it stops the pool
    pub fn cancel_token(&self) -> CancellationToken {
        self.shared.token.clone()
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.shared.monitor.lock();
        PoolStats {
            submitted: state.submitted,
            executed: state.executed,
            abandoned: state.abandoned,
            phases: state.barrier.generation(),
            stalled_phases: state.stalled_phases,
            pending: state.queue.len(),
            dispatched: state.dispatched.len(),
            arrived: state.barrier.arrived(),
        }
    }

    pub fn queue_depths(&self) -> QueueDepths {
        let state = self.shared.monitor.lock();
        QueueDepths {
            pending: state.queue.len(),
            dispatched: state.dispatched.len(),
        }
    }

    /// Current phase of worker `index` (`None` if out of range)
    pub fn worker_phase(&self, index: usize) -> Option<WorkerPhase> {
        self.shared.worker_phase(index)
    }

    pub fn collector_phase(&self) -> CollectorPhase {
        self.shared.collector_phase()
    }

    /// Stop was requested, by `shutdown` or through the token
    pub fn is_shutdown(&self) -> bool {
        self.shared.monitor.lock().stop || self.shared.token.is_cancelled()
    }

    /// Stop the pool and join every thread
    ///
    /// Queued jobs are abandoned; jobs already running finish and their
    /// results are published as a final phase, waited for up to
    /// `result_timeout` each. Returns `None` on every call after the first.
    pub fn shutdown(&mut self) -> Option<ShutdownSummary> {
        if self.joined {
            return None;
        }
        self.joined = true;

        tracing::debug!("shutting down phase pool");
        self.shared.request_stop();

        let mut thread_panics = Vec::new();
        let threads = self.workers.drain(..).chain(self.collector.take());
        for handle in threads {
            let name = handle.thread().name().unwrap_or("unnamed").to_string();
            if handle.join().is_err() {
                tracing::error!(thread = %name, "pool thread panicked");
                thread_panics.push(WorkerError::Panicked(name));
            }
        }
        self.reports.close();

        let summary = {
            let state = self.shared.monitor.lock();
            ShutdownSummary {
                abandoned: state.abandoned,
                phases: state.barrier.generation(),
                executed: state.executed,
                thread_panics,
            }
        };
        tracing::info!(
            abandoned = summary.abandoned,
            phases = summary.phases,
            executed = summary.executed,
            "phase pool stopped"
        );
        Some(summary)
    }

    fn start_threads(&mut self, aggregate: A) -> PoolResult<()> {
        let prefix = self.shared.config.thread_prefix.clone();
        let parent = tracing::Span::current();

        for index in 0..self.shared.config.num_workers {
            let shared = Arc::clone(&self.shared);
            let span = tracing::debug_span!(parent: &parent, "worker", worker = index);
            let handle = thread::Builder::new()
                .name(format!("{}-worker-{}", prefix, index))
                .spawn(move || {
                    let _entered = span.enter();
                    worker_loop(shared, WorkerId::new(index));
                })
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;
            self.workers.push(handle);
        }

        let shared = Arc::clone(&self.shared);
        let reports = Arc::clone(&self.reports);
        let span = tracing::debug_span!(parent: &parent, "collector");
        let handle = thread::Builder::new()
            .name(format!("{}-collector", prefix))
            .spawn(move || {
                let _entered = span.enter();
                collector_loop(shared, aggregate, reports);
            })
            .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;
        self.collector = Some(handle);
        Ok(())
    }
}

impl<T, A> Drop for PhasePool<T, A>
where
    T: Send + 'static,
    A: Aggregate<T>,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<T, A> fmt::Debug for PhasePool<T, A>
where
    T: Send + 'static,
    A: Aggregate<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhasePool")
            .field("num_workers", &self.num_workers())
            .field("stats", &self.stats())
            .field("collector", &self.collector_phase())
            .finish()
    }
}

/// Builder for pools with a custom aggregate, callback or parent token
pub struct PoolBuilder<T, A: Aggregate<T>> {
    config: PoolConfig,
    aggregate: A,
    on_phase: Option<ReportCallback<PhaseReport<A::Output>>>,
    parent: Option<CancellationToken>,
    _task: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> PoolBuilder<T, Sum>
where
    Sum: Aggregate<T>,
{
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            aggregate: Sum,
            on_phase: None,
            parent: None,
            _task: PhantomData,
        }
    }
}

impl<T, A> PoolBuilder<T, A>
where
    T: Send + 'static,
    A: Aggregate<T>,
{
    /// Start from `config` with an explicit aggregate
    pub fn with_aggregate(config: PoolConfig, aggregate: A) -> Self {
        Self {
            config,
            aggregate,
            on_phase: None,
            parent: None,
            _task: PhantomData,
        }
    }

    /// Replace the aggregate
    ///
    /// A callback registered earlier is discarded, since the report type
    /// changes with the aggregate; register `on_phase` afterwards.
    pub fn aggregate<B: Aggregate<T>>(self, aggregate: B) -> PoolBuilder<T, B> {
        PoolBuilder {
            config: self.config,
            aggregate,
            on_phase: None,
            parent: self.parent,
            _task: PhantomData,
        }
    }

    /// Call `callback` on the collector thread for every published report
    pub fn on_phase<F>(mut self, callback: F) -> Self
    where
        F: Fn(&PhaseReport<A::Output>) + Send + Sync + 'static,
    {
        self.on_phase = Some(Box::new(callback));
        self
    }

    /// Stop the pool when `parent` is cancelled
    pub fn cancel_token(mut self, parent: &CancellationToken) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Validate the config and start every thread
    ///
    /// If a thread fails to spawn, the threads already started are stopped
    /// and joined before the error is returned.
    pub fn spawn(self) -> PoolResult<PhasePool<T, A>> {
        self.config.validate()?;
        self.config.log_summary();

        let token = match &self.parent {
            Some(parent) => parent.child(),
            None => CancellationToken::new(),
        };
        let num_workers = self.config.num_workers;

        let mut pool = PhasePool {
            shared: Arc::new(Shared::new(self.config, token)),
            reports: Arc::new(ReportLog::new(self.on_phase)),
            workers: Vec::with_capacity(num_workers),
            collector: None,
            joined: false,
            _aggregate: PhantomData,
        };

        if let Err(err) = pool.start_threads(self.aggregate) {
            tracing::error!(error = %err, "failed to start phase pool");
            pool.shutdown();
            return Err(err);
        }

        tracing::info!(num_workers, "phase pool started");
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phasepool_core::{BatchKind, Collect, Fold, TaskError};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Instant;
    use tracing_test::traced_test;

    const WAIT: Duration = Duration::from_secs(5);

    fn config(n: usize) -> PoolConfig {
        PoolConfig::new()
            .num_workers(n)
            .poll_interval(Duration::from_millis(5))
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = PhasePool::<i64>::builder(config(0)).spawn().unwrap_err();
        assert_eq!(err, PoolError::ZeroWorkers);
    }

    #[test]
    fn test_single_phase_sum() {
        let mut pool = PhasePool::<i64>::builder(config(3)).spawn().unwrap();
        for v in [1, 2, 3] {
            pool.spawn(move || Ok::<_, String>(v)).unwrap();
        }
        let report = pool.wait_report(WAIT).unwrap();
        assert_eq!(report.aggregate, 6);
        assert_eq!(report.kind, BatchKind::Full);
        assert!(report.is_clean());

        let summary = pool.shutdown().unwrap();
        assert_eq!(summary.executed, 3);
        assert_eq!(summary.phases, 1);
        assert_eq!(pool.shutdown(), None);
    }

    #[test]
    fn test_collect_keeps_submission_order() {
        let mut pool = PoolBuilder::with_aggregate(config(4), Collect).spawn().unwrap();
        for v in 0..4u32 {
            // later submissions finish first
            pool.spawn(move || {
                std::thread::sleep(Duration::from_millis(u64::from(4 - v) * 5));
                Ok::<_, String>(v)
            })
            .unwrap();
        }
        let report = pool.wait_report(WAIT).unwrap();
        assert_eq!(report.aggregate, vec![0, 1, 2, 3]);
        pool.shutdown();
    }

    #[test]
    fn test_callback_and_counters() {
        let total = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&total);
        let mut pool = PhasePool::<u64>::builder(config(2))
            .on_phase(move |report| {
                seen.fetch_add(report.aggregate, Ordering::SeqCst);
            })
            .spawn()
            .unwrap();

        for v in 1..=4 {
            pool.spawn(move || Ok::<_, String>(v)).unwrap();
        }
        pool.wait_report(WAIT).unwrap();
        pool.wait_report(WAIT).unwrap();

        assert_eq!(total.load(Ordering::SeqCst), 10);
        assert_eq!(pool.phases_completed(), 2);
        let stats = pool.stats();
        assert_eq!(stats.submitted, 4);
        assert_eq!(stats.executed, 4);
        assert_eq!(stats.phases, 2);
        pool.shutdown();
    }

    #[test]
    fn test_submit_after_shutdown() {
        let mut pool = PhasePool::<i64>::builder(config(2)).spawn().unwrap();
        pool.shutdown();
        assert!(pool.is_shutdown());
        let (_promise, handle) = handle::pair();
        assert_eq!(pool.submit(handle, || {}), Err(PoolError::ShutDown));
        assert_eq!(pool.collector_phase(), CollectorPhase::Stopped);
        assert_eq!(pool.worker_phase(0), Some(WorkerPhase::Stopped));
    }

    #[test]
    fn test_shutdown_drains_running_batch_as_final() {
        let mut pool = PhasePool::<i64>::builder(
            config(3).partial_batch(crate::config::PartialBatchPolicy::Stall),
        )
        .spawn()
        .unwrap();
        pool.spawn(|| Ok::<_, String>(4)).unwrap();
        pool.spawn(|| Ok::<_, String>(5)).unwrap();

        let deadline = Instant::now() + WAIT;
        while pool.stats().arrived < 2 {
            assert!(Instant::now() < deadline, "tasks never arrived");
            std::thread::sleep(Duration::from_millis(1));
        }

        pool.shutdown().unwrap();
        let reports = pool.drain_reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].kind, BatchKind::Final);
        assert_eq!(reports[0].aggregate, 9);
    }

    #[test]
    fn test_failures_reported_per_task() {
        let mut pool = PhasePool::<i64>::builder(config(2)).spawn().unwrap();
        pool.spawn(|| Err::<i64, _>("no data")).unwrap();
        let ok = pool.spawn(|| Ok::<_, &str>(8)).unwrap();

        let report = pool.wait_report(WAIT).unwrap();
        assert_eq!(report.aggregate, 8);
        assert_eq!(report.failures[0].error, TaskError::Failed("no data".into()));
        assert!(report.failure_for(ok).is_none());
        pool.shutdown();
    }

    #[test]
    fn test_collector_panic_in_summary() {
        let fold = Fold::new(0i64, |_: i64, _: i64| -> i64 { panic!("fold bug") });
        let mut pool = PoolBuilder::<i64, _>::with_aggregate(config(1), fold).spawn().unwrap();
        pool.spawn(|| Ok::<_, String>(1)).unwrap();

        let deadline = Instant::now() + WAIT;
        while pool.worker_phase(0) != Some(WorkerPhase::AwaitRelease) {
            assert!(Instant::now() < deadline, "task never arrived");
            std::thread::sleep(Duration::from_millis(1));
        }

        let summary = pool.shutdown().unwrap();
        assert_eq!(
            summary.thread_panics,
            vec![WorkerError::Panicked("phasepool-collector".into())]
        );
        assert!(pool.drain_reports().is_empty());
    }

    #[test]
    #[traced_test]
    fn test_lifecycle_logged() {
        let mut pool = PhasePool::<i64>::builder(config(1)).spawn().unwrap();
        pool.spawn(|| Ok::<_, String>(1)).unwrap();
        pool.wait_report(WAIT).unwrap();
        pool.shutdown();
        assert!(logs_contain("phase pool started"));
        assert!(logs_contain("phase complete"));
        assert!(logs_contain("phase pool stopped"));
    }
}
