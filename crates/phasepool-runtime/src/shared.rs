//! State shared between the pool handle, the workers and the collector
//!
//! Everything mutable lives in one `PoolState` behind one `Monitor`, so the
//! queue, the dispatched handles, the barrier and the stop flag always
//! change together. Per-thread phases are mirrored into atomics for
//! lock-free introspection only; no decision is ever taken on them.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

use phasepool_core::{
    CancellationToken, CollectorPhase, JobQueue, Monitor, PhaseBarrier, SubmissionId, WorkerId,
    WorkerPhase,
};

use crate::config::PoolConfig;
use crate::handle::ResultHandle;

/// Type-erased task body
pub(crate) type Task = Box<dyn FnOnce() + Send + 'static>;

/// A submitted task together with the handle its outcome arrives on
pub(crate) struct Job<T> {
    pub id: SubmissionId,
    pub task: Task,
    pub handle: ResultHandle<T>,
}

/// Handle of a job a worker has taken, waiting to be drained
pub(crate) struct Dispatched<T> {
    pub id: SubmissionId,
    pub handle: ResultHandle<T>,
}

/// Condition variables of the pool monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signal {
    /// Queue became non-empty (workers in AWAIT_TASK)
    TaskReady = 0,
    /// A worker arrived at the barrier (collector in AWAIT_BATCH)
    BatchReady = 1,
    /// The collector released the barrier (workers in AWAIT_RELEASE)
    Released = 2,
}

impl From<Signal> for usize {
    #[inline]
    fn from(signal: Signal) -> usize {
        signal as usize
    }
}

pub(crate) const SIGNALS: usize = 3;

/// Lock-protected pool state
pub(crate) struct PoolState<T> {
    /// Submitted, not yet taken by a worker
    pub queue: JobQueue<Job<T>>,
    /// Taken by a worker, not yet drained (submission order)
    pub dispatched: JobQueue<Dispatched<T>>,
    pub barrier: PhaseBarrier,
    /// The collector holds a batch that is not released yet; no dispatching
    pub draining: bool,
    pub stop: bool,
    pub next_id: SubmissionId,
    pub submitted: u64,
    pub executed: u64,
    pub abandoned: u64,
    pub stalled_phases: u64,
    /// Last barrier arrival or release, whichever is later
    pub last_progress: Instant,
    /// Stall diagnostic already emitted for the current generation
    pub stall_reported: bool,
}

impl<T> PoolState<T> {
    pub fn new(parties: usize) -> Self {
        Self {
            queue: JobQueue::new(),
            dispatched: JobQueue::with_capacity(parties),
            barrier: PhaseBarrier::new(parties),
            draining: false,
            stop: false,
            next_id: SubmissionId::new(0),
            submitted: 0,
            executed: 0,
            abandoned: 0,
            stalled_phases: 0,
            last_progress: Instant::now(),
            stall_reported: false,
        }
    }

    /// Every dispatched job of this phase has reached the barrier
    #[inline]
    pub fn settled(&self) -> bool {
        self.barrier.arrived() == self.dispatched.len()
    }

    /// The current batch has arrivals but can never fill on its own
    pub fn is_partial(&self) -> bool {
        self.queue.is_empty()
            && self.barrier.arrived() > 0
            && !self.barrier.is_full()
            && self.settled()
    }

    /// Set `stop` and take every pending job out of the queue
    ///
    /// The returned jobs must be dropped after the lock is released: their
    /// promises resolve the handles to `Abandoned` on drop.
    #[must_use]
    pub fn stop(&mut self) -> Vec<Job<T>> {
        if self.stop {
            return Vec::new();
        }
        self.stop = true;
        let pending = self.queue.take_all();
        self.abandoned += pending.len() as u64;
        pending
    }
}

/// Shared by the pool handle and every pool thread
pub(crate) struct Shared<T> {
    pub monitor: Monitor<PoolState<T>, SIGNALS>,
    pub token: CancellationToken,
    pub config: PoolConfig,
    worker_phases: Box<[AtomicU8]>,
    collector_phase: AtomicU8,
}

impl<T> Shared<T> {
    pub fn new(config: PoolConfig, token: CancellationToken) -> Self {
        let worker_phases = (0..config.num_workers)
            .map(|_| AtomicU8::new(WorkerPhase::AwaitTask as u8))
            .collect();
        Self {
            monitor: Monitor::new(PoolState::new(config.num_workers)),
            token,
            config,
            worker_phases,
            collector_phase: AtomicU8::new(CollectorPhase::AwaitBatch as u8),
        }
    }

    /// Stop the pool: abandon queued jobs, cancel the token, wake everyone
    ///
    /// Safe to call any number of times from any thread not holding the
    /// lock. Returns the number of jobs abandoned by this call.
    pub fn request_stop(&self) -> usize {
        let pending = self.monitor.lock().stop();
        let count = pending.len();
        drop(pending);

        self.token.cancel();
        self.monitor.notify_every();
        if count > 0 {
            tracing::debug!(abandoned = count, "abandoned queued jobs");
        }
        count
    }

    #[inline]
    pub fn set_worker_phase(&self, worker: WorkerId, phase: WorkerPhase) {
        if let Some(slot) = self.worker_phases.get(worker.index()) {
            slot.store(phase as u8, Ordering::Release);
        }
    }

    pub fn worker_phase(&self, index: usize) -> Option<WorkerPhase> {
        self.worker_phases
            .get(index)
            .map(|slot| WorkerPhase::from(slot.load(Ordering::Acquire)))
    }

    #[inline]
    pub fn set_collector_phase(&self, phase: CollectorPhase) {
        self.collector_phase.store(phase as u8, Ordering::Release);
    }

    pub fn collector_phase(&self) -> CollectorPhase {
        CollectorPhase::from(self.collector_phase.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::pair;
    use phasepool_core::TaskError;

    fn job(state: &mut PoolState<i32>) -> ResultHandle<i32> {
        let (promise, handle) = pair();
        let id = state.next_id;
        state.next_id = id.next();
        state.queue.push(Job {
            id,
            task: Box::new(move || promise.fulfill(1)),
            handle: handle.observer(),
        });
        handle
    }

    #[test]
    fn test_stop_abandons_pending() {
        let mut state = PoolState::new(2);
        let first = job(&mut state);
        let second = job(&mut state);

        let pending = state.stop();
        assert_eq!(pending.len(), 2);
        assert!(state.stop);
        assert!(state.queue.is_empty());
        assert_eq!(state.abandoned, 2);
        drop(pending);

        assert_eq!(first.wait(), Err(TaskError::Abandoned));
        assert_eq!(second.wait(), Err(TaskError::Abandoned));

        // second stop is a no-op
        assert!(state.stop().is_empty());
        assert_eq!(state.abandoned, 2);
    }

    #[test]
    fn test_partial_detection() {
        let mut state: PoolState<i32> = PoolState::new(3);
        assert!(!state.is_partial());

        let (_promise, handle) = pair();
        state.dispatched.push(Dispatched { id: SubmissionId::new(0), handle });
        assert!(!state.is_partial(), "dispatched but not arrived");

        state.barrier.arrive().unwrap();
        assert!(state.settled());
        assert!(state.is_partial());

        let _queued = job(&mut state);
        assert!(!state.is_partial(), "more work can still fill the batch");
    }

    #[test]
    fn test_phase_mirrors() {
        let shared: Shared<i32> =
            Shared::new(PoolConfig::new().num_workers(2), CancellationToken::new());
        assert_eq!(shared.worker_phase(1), Some(WorkerPhase::AwaitTask));
        assert_eq!(shared.worker_phase(2), None);

        shared.set_worker_phase(WorkerId::new(1), WorkerPhase::Execute);
        assert_eq!(shared.worker_phase(1), Some(WorkerPhase::Execute));

        shared.set_collector_phase(CollectorPhase::Drain);
        assert_eq!(shared.collector_phase(), CollectorPhase::Drain);
    }

    #[test]
    fn test_request_stop_cancels_token() {
        let shared: Shared<i32> =
            Shared::new(PoolConfig::new().num_workers(1), CancellationToken::new());
        let handle = job(&mut shared.monitor.lock());
        assert_eq!(shared.request_stop(), 1);
        assert!(shared.token.is_cancelled());
        assert_eq!(handle.wait(), Err(TaskError::Abandoned));
        assert_eq!(shared.request_stop(), 0);
    }
}
