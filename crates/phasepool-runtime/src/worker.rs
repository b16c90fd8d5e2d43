//! Worker threads
//!
//! Each worker cycles through
//!
//! ```text
//! AWAIT_TASK -> EXECUTE -> MARK_DONE -> AWAIT_RELEASE -> AWAIT_TASK ...
//! ```
//!
//! and leaves the cycle from any wait point once stop is set. A worker takes
//! at most one job per phase, so at most N handles are ever dispatched and
//! not yet drained.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use phasepool_core::{SubmissionId, WorkerId, WorkerPhase};

use crate::handle::ResultHandle;
use crate::shared::{Dispatched, Shared, Signal, Task};

/// Entry point of a worker thread
pub(crate) fn worker_loop<T: Send + 'static>(shared: Arc<Shared<T>>, worker: WorkerId) {
    tracing::debug!(%worker, "worker started");

    loop {
        shared.set_worker_phase(worker, WorkerPhase::AwaitTask);
        let Some((submission, task, observer)) = await_task(&shared) else {
            break;
        };

        shared.set_worker_phase(worker, WorkerPhase::Execute);
        execute(worker, submission, task, &observer);
        drop(observer);

        shared.set_worker_phase(worker, WorkerPhase::MarkDone);
        let Some(generation) = mark_done(&shared, worker) else {
            break;
        };

        shared.set_worker_phase(worker, WorkerPhase::AwaitRelease);
        if !await_release(&shared, generation) {
            break;
        }
    }

    shared.set_worker_phase(worker, WorkerPhase::Stopped);
    tracing::debug!(%worker, "worker stopped");
}

/// AWAIT_TASK: take the oldest job and move its handle to the dispatched FIFO
///
/// Returns `None` once stop is set. Shutdown empties the queue in the same
/// critical section that sets stop, so no job is left behind.
fn await_task<T>(shared: &Shared<T>) -> Option<(SubmissionId, Task, ResultHandle<T>)> {
    let mut state = shared.monitor.lock();
    loop {
        if state.stop {
            return None;
        }
        if shared.token.is_cancelled() {
            drop(state);
            shared.request_stop();
            return None;
        }
        // a dispatch now would be counted against the batch being drained
        if state.draining {
            state = shared
                .monitor
                .wait_timeout(state, Signal::TaskReady, shared.config.poll_interval)
                .0;
            continue;
        }
        if let Some(job) = state.queue.pop() {
            let observer = job.handle.observer();
            state.dispatched.push(Dispatched { id: job.id, handle: job.handle });
            return Some((job.id, job.task, observer));
        }
        state = shared
            .monitor
            .wait_timeout(state, Signal::TaskReady, shared.config.poll_interval)
            .0;
    }
}

/// EXECUTE: run the task outside the lock, turning a panic into a task failure
fn execute<T>(worker: WorkerId, submission: SubmissionId, task: Task, observer: &ResultHandle<T>) {
    tracing::trace!(%worker, %submission, "executing task");
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
        let message = panic_message(payload.as_ref());
        tracing::warn!(%worker, %submission, panic = %message, "task panicked");
        observer.record_panic(message);
    }
}

/// MARK_DONE: count this worker's arrival and wake the collector if needed
///
/// Returns the generation the arrival was counted in.
fn mark_done<T>(shared: &Shared<T>, worker: WorkerId) -> Option<u64> {
    let mut state = shared.monitor.lock();
    state.executed += 1;
    state.last_progress = Instant::now();

    match state.barrier.arrive() {
        Ok(arrival) => {
            let wake = arrival.is_last || state.stop;
            drop(state);
            if wake {
                tracing::trace!(%worker, generation = arrival.generation, "batch complete");
                shared.monitor.notify_one(Signal::BatchReady);
            }
            Some(arrival.generation)
        }
        Err(err) => {
            drop(state);
            tracing::error!(%worker, error = %err, "barrier arrival rejected");
            shared.request_stop();
            None
        }
    }
}

/// AWAIT_RELEASE: wait for the collector to advance the generation
///
/// Returns `false` when the worker should stop instead.
fn await_release<T>(shared: &Shared<T>, generation: u64) -> bool {
    let mut state = shared.monitor.lock();
    loop {
        if state.barrier.released_since(generation) {
            return true;
        }
        if state.stop {
            return false;
        }
        if shared.token.is_cancelled() {
            drop(state);
            shared.request_stop();
            return false;
        }
        state = shared
            .monitor
            .wait_timeout(state, Signal::Released, shared.config.poll_interval)
            .0;
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::handle::pair;
    use crate::shared::Job;
    use phasepool_core::{CancellationToken, TaskError};
    use std::thread;
    use std::time::Duration;

    fn shared(n: usize) -> Arc<Shared<i32>> {
        let config = PoolConfig::new()
            .num_workers(n)
            .poll_interval(Duration::from_millis(5));
        Arc::new(Shared::new(config, CancellationToken::new()))
    }

    fn push(shared: &Shared<i32>, value: i32) -> ResultHandle<i32> {
        let (promise, handle) = pair();
        let mut state = shared.monitor.lock();
        let id = state.next_id;
        state.next_id = id.next();
        state.queue.push(Job {
            id,
            task: Box::new(move || promise.fulfill(value)),
            handle: handle.observer(),
        });
        handle
    }

    #[test]
    fn test_panic_message() {
        let payload = panic::catch_unwind(|| panic!("plain")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "plain");

        let payload = panic::catch_unwind(|| panic!("formatted {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "formatted 7");
    }

    #[test]
    fn test_worker_waits_for_release() {
        let shared = shared(1);
        let result = push(&shared, 11);

        let runner = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || worker_loop(shared, WorkerId::new(0)))
        };

        // the single worker fills the barrier and parks in AWAIT_RELEASE
        let deadline = Instant::now() + Duration::from_secs(5);
        while shared.worker_phase(0) != Some(WorkerPhase::AwaitRelease) {
            assert!(Instant::now() < deadline, "worker never reached AWAIT_RELEASE");
            thread::sleep(Duration::from_millis(1));
        }
        {
            let state = shared.monitor.lock();
            assert!(state.barrier.is_full());
            assert_eq!(state.dispatched.len(), 1);
            assert_eq!(state.executed, 1);
        }
        assert_eq!(result.wait(), Ok(11));

        shared.request_stop();
        runner.join().unwrap();
        assert_eq!(shared.worker_phase(0), Some(WorkerPhase::Stopped));
    }

    #[test]
    fn test_panicking_task_recorded() {
        let shared = shared(1);
        let (promise, handle) = pair::<i32>();
        {
            let mut state = shared.monitor.lock();
            state.queue.push(Job {
                id: SubmissionId::new(0),
                task: Box::new(move || {
                    let _promise = promise;
                    panic!("task exploded");
                }),
                handle: handle.observer(),
            });
        }

        let runner = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || worker_loop(shared, WorkerId::new(0)))
        };

        // the outcome is final once the worker has arrived at the barrier
        let deadline = Instant::now() + Duration::from_secs(5);
        while shared.worker_phase(0) != Some(WorkerPhase::AwaitRelease) {
            assert!(Instant::now() < deadline, "worker never arrived");
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(handle.wait(), Err(TaskError::Panicked("task exploded".into())));
        shared.request_stop();
        runner.join().unwrap();
    }

    #[test]
    fn test_external_cancel_stops_worker() {
        let shared = shared(2);
        let runner = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || worker_loop(shared, WorkerId::new(0)))
        };

        shared.token.cancel();
        runner.join().unwrap();
        assert!(shared.monitor.lock().stop);
    }

    #[test]
    fn test_no_dispatch_while_draining() {
        let shared = shared(2);
        shared.monitor.lock().draining = true;
        let result = push(&shared, 3);

        let runner = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || worker_loop(shared, WorkerId::new(0)))
        };

        thread::sleep(Duration::from_millis(30));
        {
            let state = shared.monitor.lock();
            assert_eq!(state.queue.len(), 1);
            assert!(state.dispatched.is_empty());
        }

        shared.monitor.lock().draining = false;
        shared.monitor.notify_all(Signal::TaskReady);
        assert_eq!(result.wait_timeout(Duration::from_secs(5)), Ok(3));

        shared.request_stop();
        runner.join().unwrap();
    }
}
