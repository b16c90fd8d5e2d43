//! # phasepool-runtime
//!
//! Threads and lifecycle for the phasepool barrier-synchronized worker pool.
//!
//! This crate provides:
//! - Worker threads (AWAIT_TASK / EXECUTE / MARK_DONE / AWAIT_RELEASE)
//! - The result collector (AWAIT_BATCH / DRAIN)
//! - Promise / result handle pairs over a platform latch
//! - Configuration with environment overrides
//! - Shutdown with a final drain of in-flight work

pub mod config;
pub mod handle;
pub mod latch;
pub mod pool;
pub mod reports;

mod collector;
mod shared;
mod worker;

// Re-exports
pub use config::{PartialBatchPolicy, PoolConfig};
pub use handle::{pair, Promise, ResultHandle};
pub use latch::{Latch, PlatformLatch};
pub use pool::{PhasePool, PoolBuilder, PoolStats, QueueDepths, ShutdownSummary};
pub use reports::{ReportCallback, ReportLog};
