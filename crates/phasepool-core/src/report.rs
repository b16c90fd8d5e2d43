//! Per-phase reports

use std::fmt;
use std::time::Duration;

use crate::error::TaskError;
use crate::id::{PhaseId, SubmissionId};

/// How a batch came to be drained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    /// Every worker arrived; the barrier released normally
    Full,
    /// A batch that could not fill was flushed by policy
    Partial,
    /// In-flight tasks drained during shutdown
    Final,
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchKind::Full => write!(f, "full"),
            BatchKind::Partial => write!(f, "partial"),
            BatchKind::Final => write!(f, "final"),
        }
    }
}

/// One task of a phase that produced no value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    /// Position within the phase's batch (0-based, submission order)
    pub index: usize,
    pub submission: SubmissionId,
    pub error: TaskError,
}

/// Outcome of one barrier phase
#[derive(Debug, Clone)]
pub struct PhaseReport<A> {
    pub phase: PhaseId,
    /// Aggregate over the successful results only
    pub aggregate: A,
    /// Number of results folded into `aggregate`
    pub succeeded: usize,
    pub failures: Vec<TaskFailure>,
    pub kind: BatchKind,
    /// Time spent in DRAIN
    pub elapsed: Duration,
}

impl<A> PhaseReport<A> {
    /// Number of tasks drained in this phase
    #[inline]
    pub fn len(&self) -> usize {
        self.succeeded + self.failures.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// No task of the phase failed
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failure recorded for `submission`, if any
    pub fn failure_for(&self, submission: SubmissionId) -> Option<&TaskFailure> {
        self.failures.iter().find(|f| f.submission == submission)
    }
}
