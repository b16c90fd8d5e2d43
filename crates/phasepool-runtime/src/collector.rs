//! Result collector thread
//!
//! The collector alternates between two states:
//!
//! - `AWAIT_BATCH`: wait until a batch is ready to drain. Full batches come
//!   from the N-th barrier arrival, partial batches from the flush policy,
//!   the final batch from shutdown.
//! - `DRAIN`: consume the batch's handles in submission order, fold the
//!   values, release the barrier and publish a `PhaseReport`.
//!
//! The barrier is only ever reset here, after the batch was drained, so a
//! worker can never start phase `g + 1` while results of phase `g` are
//! still being consumed.

use std::sync::Arc;
use std::time::Instant;

use phasepool_core::{
    Aggregate, BatchKind, CancellationToken, CollectorPhase, PhaseId, PhaseReport, TaskFailure,
};

use crate::config::PartialBatchPolicy;
use crate::reports::ReportLog;
use crate::shared::{Dispatched, PoolState, Shared, Signal};

/// Entry point of the collector thread
pub(crate) fn collector_loop<T, A>(
    shared: Arc<Shared<T>>,
    aggregate: A,
    reports: Arc<ReportLog<PhaseReport<A::Output>>>,
) where
    T: Send + 'static,
    A: Aggregate<T>,
{
    tracing::debug!("collector started");

    loop {
        shared.set_collector_phase(CollectorPhase::AwaitBatch);
        let Some((batch, kind)) = await_batch(&shared) else {
            break;
        };

        shared.set_collector_phase(CollectorPhase::Drain);
        let report = drain(&shared, &aggregate, batch, kind);
        reports.publish(report);

        if kind == BatchKind::Final {
            break;
        }
    }

    reports.close();
    shared.set_collector_phase(CollectorPhase::Stopped);
    tracing::debug!("collector stopped");
}

/// AWAIT_BATCH: block until there is a batch to drain
///
/// Returns `None` when the pool is stopping and nothing is left in flight.
fn await_batch<T>(shared: &Shared<T>) -> Option<(Vec<Dispatched<T>>, BatchKind)> {
    let mut state = shared.monitor.lock();
    loop {
        let batch = if state.barrier.is_full() {
            let parties = state.barrier.parties();
            Some((state.dispatched.take_batch(parties), BatchKind::Full))
        } else if state.stop {
            if state.dispatched.is_empty() {
                return None;
            }
            // otherwise tasks are still running; their arrivals wake us
            if state.settled() {
                Some((state.dispatched.take_all(), BatchKind::Final))
            } else {
                None
            }
        } else if shared.token.is_cancelled() {
            drop(state);
            shared.request_stop();
            state = shared.monitor.lock();
            continue;
        } else if state.is_partial() {
            partial_batch(shared, &mut state).map(|batch| (batch, BatchKind::Partial))
        } else {
            None
        };

        if let Some(batch) = batch {
            // idle workers must not dispatch into a batch that is being drained
            state.draining = true;
            return Some(batch);
        }

        state = shared
            .monitor
            .wait_timeout(state, Signal::BatchReady, shared.config.poll_interval)
            .0;
    }
}

/// Stall diagnostic and flush decision for a batch that cannot fill
fn partial_batch<T>(shared: &Shared<T>, state: &mut PoolState<T>) -> Option<Vec<Dispatched<T>>> {
    let idle = state.last_progress.elapsed();

    if let Some(limit) = shared.config.stall_warning {
        if !state.stall_reported && idle >= limit {
            state.stall_reported = true;
            state.stalled_phases += 1;
            tracing::warn!(
                phase = %PhaseId::new(state.barrier.generation()),
                arrived = state.barrier.arrived(),
                parties = state.barrier.parties(),
                idle_ms = idle.as_millis() as u64,
                "phase stalled: fewer tasks than workers and no more submissions"
            );
        }
    }

    match shared.config.partial_batch {
        PartialBatchPolicy::FlushAfter(delay) if idle >= delay => Some(state.dispatched.take_all()),
        _ => None,
    }
}

/// DRAIN: consume every handle of the batch and release the barrier
fn drain<T, A>(
    shared: &Shared<T>,
    aggregate: &A,
    batch: Vec<Dispatched<T>>,
    kind: BatchKind,
) -> PhaseReport<A::Output>
where
    A: Aggregate<T>,
{
    let started = Instant::now();
    // once stop is set the pool token is cancelled; dispatched work is still
    // waited for, bounded only by `result_timeout`
    let stopping = kind == BatchKind::Final || shared.monitor.lock().stop;
    let unstoppable = CancellationToken::new();
    let token = if stopping { &unstoppable } else { &shared.token };
    let mut acc = aggregate.empty();
    let mut succeeded = 0;
    let mut failures = Vec::new();

    for (index, Dispatched { id, handle }) in batch.into_iter().enumerate() {
        // a timeout past the end of the clock means no deadline
        let deadline = shared
            .config
            .result_timeout
            .and_then(|t| Instant::now().checked_add(t));
        match handle.wait_until(deadline, token, shared.config.poll_interval) {
            Ok(value) => {
                acc = aggregate.fold(acc, value);
                succeeded += 1;
            }
            Err(error) => {
                tracing::debug!(submission = %id, index, %error, "task produced no result");
                failures.push(TaskFailure { index, submission: id, error });
            }
        }
    }

    let phase = {
        let mut state = shared.monitor.lock();
        let phase = match kind {
            BatchKind::Full => match state.barrier.release() {
                Ok(phase) => phase,
                Err(err) => {
                    tracing::error!(error = %err, "full batch drained from an incomplete barrier");
                    state.barrier.force_release()
                }
            },
            BatchKind::Partial | BatchKind::Final => state.barrier.force_release(),
        };
        state.draining = false;
        state.last_progress = Instant::now();
        state.stall_reported = false;
        phase
    };
    shared.monitor.notify_all(Signal::Released);
    shared.monitor.notify_all(Signal::TaskReady);

    let elapsed = started.elapsed();
    tracing::info!(
        %phase,
        %kind,
        succeeded,
        failed = failures.len(),
        elapsed_us = elapsed.as_micros() as u64,
        "phase complete"
    );

    PhaseReport {
        phase,
        aggregate: acc,
        succeeded,
        failures,
        kind,
        elapsed,
    }
}
