//! Pool configuration
//!
//! Compile-time defaults with runtime environment overrides.
//!
//! # Configuration priority (highest wins)
//!
//! 1. Builder calls on the returned config
//! 2. Environment variables (`from_env`)
//! 3. Library defaults (`defaults`)
//!
//! # Example
//!
//! ```rust,ignore
//! use phasepool_runtime::config::{PoolConfig, PartialBatchPolicy};
//!
//! let config = PoolConfig::from_env()
//!     .num_workers(8)
//!     .result_timeout(Some(Duration::from_secs(2)))
//!     .partial_batch(PartialBatchPolicy::Stall);
//! ```

pub mod defaults;

use std::time::Duration;

use phasepool_core::constants::MAX_WORKERS;
use phasepool_core::env::{env_get, env_get_millis, env_get_opt, env_get_timeout, env_key};
use phasepool_core::{PoolError, PoolResult};

/// What the collector does with a batch that can never fill
///
/// A batch can't fill when fewer than N tasks were submitted, every one of
/// them has finished and the queue is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialBatchPolicy {
    /// Keep waiting for the remaining submissions
    Stall,
    /// Drain and release the partial batch after this much idle time
    FlushAfter(Duration),
}

impl PartialBatchPolicy {
    fn from_millis(ms: u64) -> Self {
        if ms == 0 {
            PartialBatchPolicy::Stall
        } else {
            PartialBatchPolicy::FlushAfter(Duration::from_millis(ms))
        }
    }
}

/// Pool configuration with builder pattern
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Worker threads, which is also the phase size N
    pub num_workers: usize,
    /// Bound on each per-result wait during DRAIN (None = unbounded)
    pub result_timeout: Option<Duration>,
    /// Longest single wait before re-checking cancellation
    pub poll_interval: Duration,
    /// Handling of batches that cannot fill
    pub partial_batch: PartialBatchPolicy,
    /// Warn once per phase after this much idle time with a partial batch
    pub stall_warning: Option<Duration>,
    /// Thread name prefix
    pub thread_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl PoolConfig {
    /// Create config from defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `PHASEPOOL_NUM_WORKERS` - Worker threads
    /// - `PHASEPOOL_RESULT_TIMEOUT_MS` - Per-result wait (0/none = unbounded)
    /// - `PHASEPOOL_POLL_INTERVAL_MS` - Cancellation re-check interval
    /// - `PHASEPOOL_FLUSH_PARTIAL_MS` - Partial batch flush delay (0 = stall)
    /// - `PHASEPOOL_STALL_WARNING_MS` - Stall diagnostic delay (0/none = off)
    /// - `PHASEPOOL_THREAD_PREFIX` - Thread name prefix
    pub fn from_env() -> Self {
        let base = Self::new();
        Self {
            num_workers: env_get(&env_key("NUM_WORKERS"), base.num_workers),
            result_timeout: env_get_timeout(&env_key("RESULT_TIMEOUT_MS"), base.result_timeout),
            poll_interval: env_get_millis(&env_key("POLL_INTERVAL_MS"), base.poll_interval),
            partial_batch: env_get_opt::<u64>(&env_key("FLUSH_PARTIAL_MS"))
                .map(PartialBatchPolicy::from_millis)
                .unwrap_or(base.partial_batch),
            stall_warning: env_get_timeout(&env_key("STALL_WARNING_MS"), base.stall_warning),
            thread_prefix: env_get(&env_key("THREAD_PREFIX"), base.thread_prefix),
        }
    }

    /// Create config with library defaults only (no env override).
    pub fn new() -> Self {
        Self {
            num_workers: defaults::NUM_WORKERS,
            result_timeout: millis_opt(defaults::RESULT_TIMEOUT_MS),
            poll_interval: Duration::from_millis(defaults::POLL_INTERVAL_MS),
            partial_batch: PartialBatchPolicy::from_millis(defaults::FLUSH_PARTIAL_MS),
            stall_warning: millis_opt(defaults::STALL_WARNING_MS),
            thread_prefix: defaults::THREAD_PREFIX.to_string(),
        }
    }

    // Builder methods

    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn result_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.result_timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, d: Duration) -> Self {
        self.poll_interval = d;
        self
    }

    pub fn partial_batch(mut self, policy: PartialBatchPolicy) -> Self {
        self.partial_batch = policy;
        self
    }

    pub fn stall_warning(mut self, d: Option<Duration>) -> Self {
        self.stall_warning = d;
        self
    }

    pub fn thread_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_prefix = prefix.into();
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> PoolResult<()> {
        if self.num_workers == 0 {
            return Err(PoolError::ZeroWorkers);
        }
        if self.num_workers > MAX_WORKERS {
            return Err(PoolError::Config("num_workers must be <= 256"));
        }
        if self.poll_interval.is_zero() {
            return Err(PoolError::Config("poll_interval must be > 0"));
        }
        if self.partial_batch == PartialBatchPolicy::FlushAfter(Duration::ZERO) {
            return Err(PoolError::Config("partial batch flush delay must be > 0"));
        }
        if self.thread_prefix.is_empty() {
            return Err(PoolError::Config("thread_prefix must not be empty"));
        }
        Ok(())
    }

    /// Emit the configuration at debug level
    pub fn log_summary(&self) {
        tracing::debug!(
            num_workers = self.num_workers,
            result_timeout = ?self.result_timeout,
            poll_interval = ?self.poll_interval,
            partial_batch = ?self.partial_batch,
            stall_warning = ?self.stall_warning,
            thread_prefix = %self.thread_prefix,
            "phasepool configuration"
        );
    }
}

fn millis_opt(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}
