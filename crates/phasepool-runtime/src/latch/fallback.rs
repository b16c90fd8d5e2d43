//! Fallback latch using std::sync::Condvar
//!
//! Used on platforms without futex support.

use super::Latch;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

pub struct CondvarLatch {
    set: Mutex<bool>,
    condvar: Condvar,
}

impl CondvarLatch {
    pub fn new() -> Self {
        Self {
            set: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }
}

impl Default for CondvarLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Latch for CondvarLatch {
    fn set(&self) {
        {
            let mut guard = self.set.lock().unwrap_or_else(PoisonError::into_inner);
            *guard = true;
        }
        self.condvar.notify_all();
    }

    fn is_set(&self) -> bool {
        *self.set.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut guard = self.set.lock().unwrap_or_else(PoisonError::into_inner);
        match timeout.and_then(|t| Instant::now().checked_add(t)) {
            Some(deadline) => {
                while !*guard {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    guard = self
                        .condvar
                        .wait_timeout(guard, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
            None => {
                while !*guard {
                    guard = self.condvar.wait(guard).unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
        *guard
    }
}
