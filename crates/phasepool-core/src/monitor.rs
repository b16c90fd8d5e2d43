//! One mutex guarding shared state plus a fixed set of condition variables
//!
//! Every wait state of the pool is "lock, check predicate, wait on one
//! condvar, re-check". `Monitor` keeps that pattern in one place so the
//! worker and collector loops only spell out their predicates.
//!
//! All waits are bounded by a caller-provided interval. Callers loop and
//! re-check their predicate (and their cancellation token) after every
//! return, so spurious and partial-state wakeups are harmless.
//!
//! Poisoning is recovered rather than propagated: no user code runs while
//! the lock is held, so a poisoned guard still holds consistent state.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Mutex-protected state `S` with `K` condition variables
pub struct Monitor<S, const K: usize> {
    state: Mutex<S>,
    conds: [Condvar; K],
}

impl<S, const K: usize> Monitor<S, K> {
    pub fn new(state: S) -> Self {
        Self {
            state: Mutex::new(state),
            conds: std::array::from_fn(|_| Condvar::new()),
        }
    }

    /// Acquire the lock
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, S> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block on condition `cond` for at most `timeout`
    ///
    /// Returns the re-acquired guard and whether the wait timed out.
    pub fn wait_timeout<'a>(
        &self,
        guard: MutexGuard<'a, S>,
        cond: impl Into<usize>,
        timeout: Duration,
    ) -> (MutexGuard<'a, S>, bool) {
        let (guard, result) = self.conds[cond.into()]
            .wait_timeout(guard, timeout)
            .unwrap_or_else(PoisonError::into_inner);
        (guard, result.timed_out())
    }

    /// Wake one thread waiting on `cond`
    #[inline]
    pub fn notify_one(&self, cond: impl Into<usize>) {
        self.conds[cond.into()].notify_one();
    }

    /// Wake every thread waiting on `cond`
    #[inline]
    pub fn notify_all(&self, cond: impl Into<usize>) {
        self.conds[cond.into()].notify_all();
    }

    /// Wake every thread waiting on any condition
    pub fn notify_every(&self) {
        for cond in &self.conds {
            cond.notify_all();
        }
    }
}

impl<S: Default, const K: usize> Default for Monitor<S, K> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_wait_timeout_times_out() {
        let monitor: Monitor<u32, 1> = Monitor::new(0);
        let guard = monitor.lock();
        let start = Instant::now();
        let (_guard, timed_out) = monitor.wait_timeout(guard, 0usize, Duration::from_millis(20));
        assert!(timed_out || start.elapsed() < Duration::from_millis(20));
    }

    #[test]
    fn test_predicate_loop_sees_updates() {
        let monitor: Arc<Monitor<u32, 2>> = Arc::new(Monitor::new(0));
        let producer = Arc::clone(&monitor);

        let handle = thread::spawn(move || {
            for _ in 0..3 {
                thread::sleep(Duration::from_millis(5));
                *producer.lock() += 1;
                producer.notify_all(1usize);
            }
        });

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut guard = monitor.lock();
        while *guard != 3 {
            assert!(Instant::now() < deadline, "producer updates never seen");
            guard = monitor.wait_timeout(guard, 1usize, Duration::from_millis(50)).0;
        }
        drop(guard);
        handle.join().unwrap();
    }

    #[test]
    fn test_notify_every_wakes_each_condition() {
        let monitor: Arc<Monitor<bool, 3>> = Arc::new(Monitor::default());
        let waiters: Vec<_> = (0..3usize)
            .map(|cond| {
                let monitor = Arc::clone(&monitor);
                thread::spawn(move || {
                    let mut guard = monitor.lock();
                    while !*guard {
                        guard = monitor.wait_timeout(guard, cond, Duration::from_secs(5)).0;
                    }
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        *monitor.lock() = true;
        monitor.notify_every();
        for waiter in waiters {
            waiter.join().unwrap();
        }
    }
}
