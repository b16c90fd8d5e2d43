//! Cancellation token for cooperative shutdown
//!
//! Every pool owns a token. Worker and collector threads check it at each
//! suspension point; `PhasePool::shutdown` cancels it. A caller can pass
//! its own token when building a pool, in which case the pool token is a
//! child of it and cancelling the caller's token stops the pool as well.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Token for checking and triggering cancellation
///
/// Clones share state. Children observe their ancestors' cancellation,
/// never the other way round.
#[derive(Clone)]
pub struct CancellationToken {
    node: Arc<TokenNode>,
}

struct TokenNode {
    cancelled: AtomicBool,
    parent: Option<CancellationToken>,
}

impl CancellationToken {
    /// Create a new root token
    pub fn new() -> Self {
        Self {
            node: Arc::new(TokenNode {
                cancelled: AtomicBool::new(false),
                parent: None,
            }),
        }
    }

    /// Create a child token linked to this one
    pub fn child(&self) -> Self {
        Self {
            node: Arc::new(TokenNode {
                cancelled: AtomicBool::new(false),
                parent: Some(self.clone()),
            }),
        }
    }

    /// Check this token and its ancestors
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        if self.node.cancelled.load(Ordering::Acquire) {
            return true;
        }
        match &self.node.parent {
            Some(parent) => parent.is_cancelled(),
            None => false,
        }
    }

    /// Request cancellation of this token and its descendants
    pub fn cancel(&self) {
        self.node.cancelled.store(true, Ordering::Release);
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
