//! # phasepool-core
//!
//! Core types for the phasepool barrier-synchronized worker pool.
//!
//! This crate holds no threads and no platform code. Everything here is
//! plain data guarded by the caller's lock, plus the lock/condvar bundle
//! (`Monitor`) that the runtime builds its wait states on.
//! Thread management lives in `phasepool-runtime`.
//!
//! ## Modules
//!
//! - `id` - Submission, phase and worker identifiers
//! - `state` - Worker and collector state machines
//! - `error` - Error types
//! - `cancel` - Cancellation token for cooperative shutdown
//! - `monitor` - One mutex + a fixed set of condition variables
//! - `barrier` - Cyclic phase barrier with generation counter
//! - `queue` - FIFO job queue with batch helpers
//! - `aggregate` - Folding phase results into one value
//! - `report` - Per-phase reports and task failures
//! - `env` - Environment variable utilities

pub mod id;
pub mod state;
pub mod error;
pub mod cancel;
pub mod monitor;
pub mod barrier;
pub mod queue;
pub mod aggregate;
pub mod report;
pub mod env;

// Re-exports for convenience
pub use id::{PhaseId, SubmissionId, WorkerId};
pub use state::{CollectorPhase, WorkerPhase};
pub use error::{BarrierError, PoolError, PoolResult, TaskError, WorkerError};
pub use cancel::CancellationToken;
pub use monitor::Monitor;
pub use barrier::{Arrival, PhaseBarrier};
pub use queue::JobQueue;
pub use aggregate::{Aggregate, Collect, Fold, Sum};
pub use report::{BatchKind, PhaseReport, TaskFailure};
pub use env::{env_get, env_get_millis, env_get_opt, env_get_timeout, env_key};

/// Pool-wide limits
pub mod constants {
    /// Upper bound on the worker count accepted by config validation
    pub const MAX_WORKERS: usize = 256;

    /// Environment variable prefix used by `env_key`
    pub const ENV_PREFIX: &str = "PHASEPOOL_";
}
