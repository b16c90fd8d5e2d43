//! # phasepool - barrier-synchronized worker pool
//!
//! A fixed set of N worker threads executes submitted tasks in phases of N.
//! A dedicated collector thread waits until every worker of the phase is
//! done, drains the N results in submission order, folds them into one
//! aggregate and only then releases the workers into the next phase.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::time::Duration;
//! use phasepool::PhasePool;
//!
//! fn main() -> phasepool::PoolResult<()> {
//!     let mut pool = PhasePool::<i64>::new(5)?;
//!
//!     for i in 0..20 {
//!         let id = (i % 5) as i64;
//!         pool.spawn(move || Ok::<_, String>(id * 10))?;
//!     }
//!
//!     for _ in 0..4 {
//!         let report = pool.wait_report(Duration::from_secs(1))?;
//!         println!("{}: aggregate {}", report.phase, report.aggregate);
//!     }
//!
//!     pool.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//!        submit(handle, task)
//!               │
//!               ▼
//!   ┌───────────────────────┐        ┌──────────────────────────┐
//!   │   queue: Job FIFO     │        │  dispatched: handle FIFO │
//!   └───────────────────────┘        └──────────────────────────┘
//!               │ dequeue (one per worker per phase)   ▲
//!               ▼                                      │
//!   ┌────────┐ ┌────────┐     ┌────────┐               │
//!   │worker 0│ │worker 1│ ... │worker N│ ──────────────┘
//!   └────────┘ └────────┘     └────────┘
//!               │ arrive at barrier (N-th arrival wakes collector)
//!               ▼
//!   ┌─────────────────────────────────────────────────────────┐
//!   │ collector: drain N handles → aggregate → release → report│
//!   └─────────────────────────────────────────────────────────┘
//! ```
//!
//! All shared state sits behind one mutex with three condition variables
//! (task ready, batch ready, released). The barrier carries a generation
//! counter; workers wait for the generation to change.
//!
//! ## Partial batches
//!
//! Task counts are expected to be multiples of N. By default a trailing
//! batch that can never fill waits (`PartialBatchPolicy::Stall`, with a
//! logged stall warning) until more tasks arrive or the pool shuts down, where
//! it is drained as the final phase. `PartialBatchPolicy::FlushAfter` opts
//! into draining it after an idle delay.
//!
//! ## Logging
//!
//! The crates emit `tracing` events and never install a subscriber. With
//! the `subscriber` feature, `init_logging` installs a formatting
//! subscriber filtered by `PHASEPOOL_LOG`.

// Re-export core types
pub use phasepool_core::{
    Aggregate,
    BatchKind,
    CancellationToken,
    Collect,
    CollectorPhase,
    Fold,
    PhaseId,
    PhaseReport,
    PoolError,
    PoolResult,
    SubmissionId,
    Sum,
    TaskError,
    TaskFailure,
    WorkerError,
    WorkerId,
    WorkerPhase,
};

// Re-export env utilities
pub use phasepool_core::{env_get, env_get_millis, env_get_opt, env_get_timeout};

// Re-export runtime types
pub use phasepool_runtime::{
    pair,
    PartialBatchPolicy,
    PhasePool,
    PoolBuilder,
    PoolConfig,
    PoolStats,
    Promise,
    QueueDepths,
    ResultHandle,
    ShutdownSummary,
};

pub use phasepool_runtime::config::defaults;

/// Environment variable read by `init_logging`
pub const LOG_ENV: &str = "PHASEPOOL_LOG";

/// Install a `fmt` subscriber filtered by `PHASEPOOL_LOG` (default `info`)
///
/// Does nothing if a global subscriber is already set.
#[cfg(feature = "subscriber")]
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init();
}
