//! Error types for the phase pool

use thiserror::Error;

/// Result type for pool operations
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors returned by pool construction, submission and report waits
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// A pool needs at least one worker
    #[error("pool needs at least one worker")]
    ZeroWorkers,

    /// Submission after shutdown was requested
    #[error("pool is shut down")]
    ShutDown,

    /// Wait exceeded its deadline
    #[error("operation timed out")]
    Timeout,

    /// Wait interrupted via CancellationToken
    #[error("operation cancelled")]
    Cancelled,

    /// Configuration rejected by `PoolConfig::validate`
    #[error("invalid config: {0}")]
    Config(&'static str),

    /// Worker or collector thread error
    #[error("worker error: {0}")]
    Worker(#[from] WorkerError),
}

/// Thread lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    /// OS refused to spawn a thread
    #[error("failed to spawn thread: {0}")]
    SpawnFailed(String),

    /// A pool thread (named) panicked outside of task code
    #[error("pool thread {0} panicked")]
    Panicked(String),
}

/// Outcome of a single task that did not produce a value
///
/// Carried by a `ResultHandle` and reported per task in `PhaseReport`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// Task completed its promise with an error
    #[error("task failed: {0}")]
    Failed(String),

    /// Task panicked while running on a worker
    #[error("task panicked: {0}")]
    Panicked(String),

    /// Promise dropped without a value (includes jobs abandoned at shutdown)
    #[error("task abandoned before producing a result")]
    Abandoned,

    /// Result wait exceeded `result_timeout`
    #[error("timed out waiting for task result")]
    TimedOut,

    /// Result wait interrupted by pool cancellation
    #[error("cancelled while waiting for task result")]
    Cancelled,
}

impl TaskError {
    /// Build a `Failed` error from anything printable
    pub fn failed(msg: impl std::fmt::Display) -> Self {
        TaskError::Failed(msg.to_string())
    }
}

/// Misuse of the phase barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BarrierError {
    /// `release` called before every party arrived
    #[error("barrier released with {arrived} of {parties} arrivals")]
    Incomplete { arrived: usize, parties: usize },

    /// More arrivals than parties in one generation
    #[error("barrier overrun: all {parties} parties already arrived")]
    Overrun { parties: usize },
}
