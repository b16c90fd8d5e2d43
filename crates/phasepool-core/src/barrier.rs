//! Cyclic phase barrier
//!
//! `PhaseBarrier` is plain data kept under the pool lock. Workers `arrive`
//! after finishing their task; the collector `release`s once it has drained
//! the batch. Each release resets the count and advances the generation.
//! Workers wait for the generation to change rather than for the count to
//! reach zero, which rules out a worker of phase `g` being held back (or
//! let through) by the count of phase `g + 1`.

use crate::error::BarrierError;
use crate::id::PhaseId;

/// Result of one `arrive` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arrival {
    /// Generation the arrival was counted in
    pub generation: u64,
    /// Count after this arrival
    pub arrived: usize,
    /// This arrival filled the barrier; the caller must wake the collector
    pub is_last: bool,
}

/// Counter + generation for N parties
#[derive(Debug, Clone)]
pub struct PhaseBarrier {
    parties: usize,
    arrived: usize,
    generation: u64,
}

impl PhaseBarrier {
    /// Create a barrier for `parties` workers
    ///
    /// `parties` must be non-zero; the pool validates this before
    /// constructing the barrier.
    pub fn new(parties: usize) -> Self {
        debug_assert!(parties > 0, "barrier needs at least one party");
        Self {
            parties,
            arrived: 0,
            generation: 0,
        }
    }

    /// Count one arrival in the current generation
    pub fn arrive(&mut self) -> Result<Arrival, BarrierError> {
        if self.arrived >= self.parties {
            return Err(BarrierError::Overrun { parties: self.parties });
        }
        self.arrived += 1;
        Ok(Arrival {
            generation: self.generation,
            arrived: self.arrived,
            is_last: self.arrived == self.parties,
        })
    }

    /// Release a full barrier
    ///
    /// Fails unless every party arrived. Returns the id of the phase that
    /// just completed.
    pub fn release(&mut self) -> Result<PhaseId, BarrierError> {
        if !self.is_full() {
            return Err(BarrierError::Incomplete {
                arrived: self.arrived,
                parties: self.parties,
            });
        }
        Ok(self.advance())
    }

    /// Release regardless of the arrival count
    ///
    /// Used for partial-batch flushes and the final batch at shutdown.
    pub fn force_release(&mut self) -> PhaseId {
        self.advance()
    }

    fn advance(&mut self) -> PhaseId {
        let done = PhaseId::new(self.generation);
        self.arrived = 0;
        self.generation += 1;
        done
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.arrived == self.parties
    }

    #[inline]
    pub fn arrived(&self) -> usize {
        self.arrived
    }

    #[inline]
    pub fn parties(&self) -> usize {
        self.parties
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Has the barrier been released since `generation`
    #[inline]
    pub fn released_since(&self, generation: u64) -> bool {
        self.generation != generation
    }
}
