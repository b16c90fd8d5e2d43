//! Worker and collector state machines
//!
//! Workers cycle `AwaitTask -> Execute -> MarkDone -> AwaitRelease` until
//! they reach `Stopped`. The collector cycles `AwaitBatch -> Drain`.
//! Both are published through an `AtomicU8` per thread, hence `repr(u8)`.

use core::fmt;

/// Current state of a worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerPhase {
    /// Waiting for the job queue to become non-empty
    AwaitTask = 0,

    /// Running a task outside the pool lock
    Execute = 1,

    /// Arriving at the phase barrier
    MarkDone = 2,

    /// Waiting for the collector to release the barrier
    AwaitRelease = 3,

    /// Thread has exited its loop
    Stopped = 4,
}

impl WorkerPhase {
    /// Is the worker parked on a condition variable
    #[inline]
    pub const fn is_waiting(&self) -> bool {
        matches!(self, WorkerPhase::AwaitTask | WorkerPhase::AwaitRelease)
    }

    #[inline]
    pub const fn is_stopped(&self) -> bool {
        matches!(self, WorkerPhase::Stopped)
    }
}

impl From<u8> for WorkerPhase {
    fn from(v: u8) -> Self {
        match v {
            0 => WorkerPhase::AwaitTask,
            1 => WorkerPhase::Execute,
            2 => WorkerPhase::MarkDone,
            3 => WorkerPhase::AwaitRelease,
            _ => WorkerPhase::Stopped,
        }
    }
}

impl From<WorkerPhase> for u8 {
    fn from(phase: WorkerPhase) -> u8 {
        phase as u8
    }
}

impl fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerPhase::AwaitTask => write!(f, "AWAIT_TASK"),
            WorkerPhase::Execute => write!(f, "EXECUTE"),
            WorkerPhase::MarkDone => write!(f, "MARK_DONE"),
            WorkerPhase::AwaitRelease => write!(f, "AWAIT_RELEASE"),
            WorkerPhase::Stopped => write!(f, "STOP"),
        }
    }
}

/// Current state of the collector thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CollectorPhase {
    /// Waiting for a full (or flushable) batch
    AwaitBatch = 0,

    /// Consuming result handles and folding the aggregate
    Drain = 1,

    /// Thread has exited its loop
    Stopped = 2,
}

impl From<u8> for CollectorPhase {
    fn from(v: u8) -> Self {
        match v {
            0 => CollectorPhase::AwaitBatch,
            1 => CollectorPhase::Drain,
            _ => CollectorPhase::Stopped,
        }
    }
}

impl From<CollectorPhase> for u8 {
    fn from(phase: CollectorPhase) -> u8 {
        phase as u8
    }
}

impl fmt::Display for CollectorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectorPhase::AwaitBatch => write!(f, "AWAIT_BATCH"),
            CollectorPhase::Drain => write!(f, "DRAIN"),
            CollectorPhase::Stopped => write!(f, "STOP"),
        }
    }
}
