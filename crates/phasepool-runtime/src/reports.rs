//! Published phase reports
//!
//! The collector is the only producer. Consumers poll (`try_next`), block
//! (`wait_next`) or take everything at once (`drain`). An optional callback
//! sees every report on the collector thread before it is queued.

use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crossbeam_queue::SegQueue;
use phasepool_core::{Monitor, PoolError, PoolResult};

use crate::worker::panic_message;

/// Callback invoked on the collector thread for each published report
pub type ReportCallback<R> = Box<dyn Fn(&R) + Send + Sync + 'static>;

#[derive(Default)]
struct LogState {
    published: u64,
    closed: bool,
}

/// Unbounded report queue with blocking reads
pub struct ReportLog<R> {
    queue: SegQueue<R>,
    monitor: Monitor<LogState, 1>,
    callback: Option<ReportCallback<R>>,
}

const PUBLISHED: usize = 0;

/// Wait slice when the caller asked for no deadline
const UNBOUNDED_SLICE: Duration = Duration::from_secs(1);

impl<R> ReportLog<R> {
    pub fn new(callback: Option<ReportCallback<R>>) -> Self {
        Self {
            queue: SegQueue::new(),
            monitor: Monitor::default(),
            callback,
        }
    }

    /// Hand a report to the callback, then queue it for consumers
    pub fn publish(&self, report: R) {
        if let Some(callback) = &self.callback {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(&report))) {
                tracing::warn!(
                    panic = %panic_message(payload.as_ref()),
                    "phase callback panicked"
                );
            }
        }

        self.queue.push(report);
        self.monitor.lock().published += 1;
        self.monitor.notify_all(PUBLISHED);
    }

    /// No more reports will be published
    pub fn close(&self) {
        self.monitor.lock().closed = true;
        self.monitor.notify_all(PUBLISHED);
    }

    pub fn try_next(&self) -> Option<R> {
        self.queue.pop()
    }

    /// Block until a report is available
    ///
    /// Fails with `Timeout` after `timeout`, or with `ShutDown` once the log
    /// is closed and empty. A timeout too large to form a deadline
    /// (`Duration::MAX`) waits without bound.
    pub fn wait_next(&self, timeout: Duration) -> PoolResult<R> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.monitor.lock();
        loop {
            if let Some(report) = self.queue.pop() {
                return Ok(report);
            }
            if state.closed {
                return Err(PoolError::ShutDown);
            }
            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(PoolError::Timeout);
                    }
                    deadline - now
                }
                None => UNBOUNDED_SLICE,
            };
            state = self.monitor.wait_timeout(state, PUBLISHED, wait).0;
        }
    }

    /// Every report not yet taken, oldest first
    pub fn drain(&self) -> Vec<R> {
        std::iter::from_fn(|| self.queue.pop()).collect()
    }

    /// Reports published so far, taken or not
    pub fn published(&self) -> u64 {
        self.monitor.lock().published
    }

    pub fn is_closed(&self) -> bool {
        self.monitor.lock().closed
    }
}
