//! Promise / result handle pairs
//!
//! A task's outcome travels from the worker (or whatever thread the task
//! hands its `Promise` to) to the collector through a one-shot slot. The
//! promise writes exactly once; the handle reads exactly once.
//!
//! ```ignore
//! let (promise, handle) = phasepool_runtime::handle::pair::<i64>();
//! pool.submit(handle, move || promise.fulfill(compute()))?;
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use phasepool_core::{CancellationToken, TaskError};

use crate::latch::{Latch, PlatformLatch};

type Outcome<T> = Result<T, TaskError>;

struct Slot<T> {
    outcome: Mutex<Option<Outcome<T>>>,
    latch: PlatformLatch,
}

impl<T> Slot<T> {
    /// Store `outcome` unless one is already present
    ///
    /// With `over_abandoned`, an `Abandoned` outcome is replaced; that is
    /// how a worker records a panic after unwinding dropped the promise.
    fn store(&self, outcome: Outcome<T>, over_abandoned: bool) -> bool {
        {
            let mut slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
            match &*slot {
                None => {}
                Some(Err(TaskError::Abandoned)) if over_abandoned => {}
                Some(_) => return false,
            }
            *slot = Some(outcome);
        }
        self.latch.set();
        true
    }

    fn take(&self) -> Option<Outcome<T>> {
        self.outcome.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Create a connected promise / handle pair
pub fn pair<T>() -> (Promise<T>, ResultHandle<T>) {
    let slot = Arc::new(Slot {
        outcome: Mutex::new(None),
        latch: PlatformLatch::new(),
    });
    (
        Promise { slot: Some(Arc::clone(&slot)) },
        ResultHandle { slot },
    )
}

/// Write side of a task outcome
///
/// Dropping a promise without completing it resolves the handle to
/// `TaskError::Abandoned`.
pub struct Promise<T> {
    slot: Option<Arc<Slot<T>>>,
}

impl<T> Promise<T> {
    /// Complete with a value
    pub fn fulfill(self, value: T) {
        self.complete(Ok(value));
    }

    /// Complete with `TaskError::Failed`
    pub fn fail(self, reason: impl fmt::Display) {
        self.complete(Err(TaskError::failed(reason)));
    }

    /// Complete with an arbitrary outcome
    pub fn complete(mut self, outcome: Result<T, TaskError>) {
        if let Some(slot) = self.slot.take() {
            slot.store(outcome, false);
        }
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.store(Err(TaskError::Abandoned), false);
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("completed", &self.slot.is_none())
            .finish()
    }
}

/// Read side of a task outcome, consumed by the collector
pub struct ResultHandle<T> {
    slot: Arc<Slot<T>>,
}

impl<T> ResultHandle<T> {
    /// Has the promise side completed (or been dropped)
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.slot.latch.is_set()
    }

    /// Block until the outcome is available
    pub fn wait(self) -> Result<T, TaskError> {
        self.slot.latch.wait(None);
        self.slot.take().unwrap_or(Err(TaskError::Abandoned))
    }

    /// Block for at most `timeout`
    pub fn wait_timeout(self, timeout: Duration) -> Result<T, TaskError> {
        if self.slot.latch.wait(Some(timeout)) {
            self.slot.take().unwrap_or(Err(TaskError::Abandoned))
        } else {
            Err(TaskError::TimedOut)
        }
    }

    /// Block until ready, `deadline` passes or `token` is cancelled
    ///
    /// The token is polled every `slice`. A ready outcome always wins over
    /// cancellation and timeout.
    pub fn wait_until(
        self,
        deadline: Option<Instant>,
        token: &CancellationToken,
        slice: Duration,
    ) -> Result<T, TaskError> {
        loop {
            if self.slot.latch.is_set() {
                return self.slot.take().unwrap_or(Err(TaskError::Abandoned));
            }
            if token.is_cancelled() {
                return Err(TaskError::Cancelled);
            }
            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(TaskError::TimedOut);
                    }
                    (deadline - now).min(slice)
                }
                None => slice,
            };
            self.slot.latch.wait(Some(wait));
        }
    }

    /// Record a panic for this handle's task
    ///
    /// Overrides `Abandoned` (the promise was dropped during unwinding) but
    /// never a real outcome the task managed to deliver first.
    pub(crate) fn record_panic(&self, message: String) -> bool {
        self.slot.store(Err(TaskError::Panicked(message)), true)
    }

    /// Second reference to the same slot, used by the worker that runs the task
    pub(crate) fn observer(&self) -> ResultHandle<T> {
        ResultHandle { slot: Arc::clone(&self.slot) }
    }
}

impl<T> fmt::Debug for ResultHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultHandle")
            .field("ready", &self.is_ready())
            .finish()
    }
}
