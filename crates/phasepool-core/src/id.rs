//! Identifier types
//!
//! Submissions are numbered in the order they enter the pool. Phases are
//! numbered by the barrier generation they completed. Workers are numbered
//! by spawn index.

use core::fmt;

/// Monotonic identifier assigned to every submitted task
///
/// Ids start at 0 and increase by one per `submit`. The maximum value
/// (u64::MAX) is reserved as a sentinel for "no submission".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct SubmissionId(u64);

impl SubmissionId {
    /// Sentinel value indicating no submission
    pub const NONE: SubmissionId = SubmissionId(u64::MAX);

    #[inline]
    pub const fn new(id: u64) -> Self {
        SubmissionId(id)
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == u64::MAX
    }

    /// The id following this one
    #[inline]
    pub const fn next(self) -> Self {
        SubmissionId(self.0 + 1)
    }
}

impl From<u64> for SubmissionId {
    #[inline]
    fn from(id: u64) -> Self {
        SubmissionId(id)
    }
}

impl fmt::Debug for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "SubmissionId(NONE)")
        } else {
            write!(f, "SubmissionId({})", self.0)
        }
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a completed phase
///
/// Equal to the barrier generation that was current while the phase ran,
/// so the first phase is `PhaseId(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PhaseId(u64);

impl PhaseId {
    #[inline]
    pub const fn new(generation: u64) -> Self {
        PhaseId(generation)
    }

    #[inline]
    pub const fn generation(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "phase-{}", self.0)
    }
}

/// Index of a worker thread within its pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct WorkerId(usize);

impl WorkerId {
    #[inline]
    pub const fn new(index: usize) -> Self {
        WorkerId(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}
