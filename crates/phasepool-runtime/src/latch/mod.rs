//! One-shot wake-up latch
//!
//! Backs every `ResultHandle`: the promise side sets the latch once its
//! outcome is stored, the collector waits on it (optionally bounded).
//! Platform-specific implementations use the cheapest primitive available.

use std::time::Duration;

/// One-shot latch: starts unset, `set` is permanent
pub trait Latch: Send + Sync {
    /// Mark the latch set and wake every waiter
    fn set(&self);

    /// Has `set` been called
    fn is_set(&self) -> bool;

    /// Block until set or until `timeout` elapses
    ///
    /// Returns whether the latch was set on return. Spurious wakeups are
    /// absorbed internally; a `false` return means the timeout elapsed.
    /// A timeout too large to form a deadline waits like `None`.
    fn wait(&self, timeout: Option<Duration>) -> bool;
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod futex_linux;
        pub use futex_linux::FutexLatch as PlatformLatch;
    } else {
        mod fallback;
        pub use fallback::CondvarLatch as PlatformLatch;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_wait_timeout_unset() {
        let latch = PlatformLatch::new();
        let start = Instant::now();
        assert!(!latch.wait(Some(Duration::from_millis(30))));
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn test_set_before_wait() {
        let latch = PlatformLatch::new();
        latch.set();
        assert!(latch.is_set());
        assert!(latch.wait(Some(Duration::ZERO)));
        assert!(latch.wait(None));
    }

    #[test]
    fn test_wait_max_duration() {
        let latch = Arc::new(PlatformLatch::new());
        let setter = {
            let latch = Arc::clone(&latch);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                latch.set();
            })
        };
        assert!(latch.wait(Some(Duration::MAX)));
        setter.join().unwrap();
    }

    #[test]
    fn test_set_wakes_all_waiters() {
        let latch = Arc::new(PlatformLatch::new());
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let latch = Arc::clone(&latch);
                thread::spawn(move || latch.wait(Some(Duration::from_secs(10))))
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        latch.set();

        for waiter in waiters {
            assert!(waiter.join().unwrap());
        }
    }
}
