//! Linux futex-based latch
//!
//! Futex word semantics:
//! - 0 = not set (waiters sleep on this value)
//! - 1 = set (FUTEX_WAIT returns immediately with EAGAIN)
//!
//! `set` swaps the word to 1 before reading the waiter count, and waiters
//! bump the count before reading the word, so one side always sees the
//! other: either the setter issues FUTEX_WAKE or the waiter skips the
//! sleep. The kernel's value check closes the remaining window.

use super::Latch;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

pub struct FutexLatch {
    word: AtomicU32,
    waiters: AtomicUsize,
}

impl FutexLatch {
    pub fn new() -> Self {
        Self {
            word: AtomicU32::new(0),
            waiters: AtomicUsize::new(0),
        }
    }

    /// FUTEX_WAIT while the word is 0; any return is treated as "re-check"
    fn futex_wait(&self, timeout: Option<Duration>) {
        let timespec = timeout.map(|d| libc::timespec {
            tv_sec: d.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
            tv_nsec: d.subsec_nanos() as libc::c_long,
        });
        let timespec_ptr = match &timespec {
            Some(ts) => ts as *const libc::timespec,
            None => std::ptr::null(),
        };

        // ETIMEDOUT, EAGAIN and EINTR all lead back to the caller's loop.
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.word.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                0u32,
                timespec_ptr,
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }

    fn futex_wake_all(&self) {
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.word.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                i32::MAX,
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }
}

impl Default for FutexLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Latch for FutexLatch {
    fn set(&self) {
        if self.word.swap(1, Ordering::SeqCst) == 0 && self.waiters.load(Ordering::SeqCst) > 0 {
            self.futex_wake_all();
        }
    }

    #[inline]
    fn is_set(&self) -> bool {
        self.word.load(Ordering::Acquire) != 0
    }

    fn wait(&self, timeout: Option<Duration>) -> bool {
        if self.is_set() {
            return true;
        }
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));

        self.waiters.fetch_add(1, Ordering::SeqCst);
        while self.word.load(Ordering::SeqCst) == 0 {
            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    Some(deadline - now)
                }
                None => None,
            };
            self.futex_wait(remaining);
        }
        self.waiters.fetch_sub(1, Ordering::SeqCst);

        self.is_set()
    }
}
