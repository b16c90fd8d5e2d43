//! Library defaults, overridable through `PHASEPOOL_*` variables

/// Worker threads per pool
pub const NUM_WORKERS: usize = 4;

/// Per-result wait in DRAIN; 0 = unbounded
pub const RESULT_TIMEOUT_MS: u64 = 0;

/// Upper bound on any single condvar/latch wait before re-checking
/// the cancellation token
pub const POLL_INTERVAL_MS: u64 = 50;

/// Idle time after which a batch that cannot fill is flushed; 0 = stall
pub const FLUSH_PARTIAL_MS: u64 = 0;

/// Idle time after which a stalled phase is reported; 0 = never
pub const STALL_WARNING_MS: u64 = 5000;

/// Thread name prefix (`<prefix>-worker-<i>`, `<prefix>-collector`)
pub const THREAD_PREFIX: &str = "phasepool";
