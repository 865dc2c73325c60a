#![forbid(unsafe_code)]

//! Explicit cancellation tokens for effect-owned asynchronous work.
//!
//! An effect that starts externally-driven work (a request, a timer) must
//! own its cancellation: the body creates a [`CancelSource`], hands the
//! [`CancelToken`] to the work, and returns a cleanup that calls
//! [`cancel`](CancelSource::cancel). The runtime guarantees the cleanup
//! runs before the registration's next body and on teardown; a completion
//! that checks its token after that sees cancelled and becomes a no-op.
//!
//! ```
//! use heddle_runtime::cancel::CancelSource;
//!
//! let source = CancelSource::new();
//! let token = source.token();
//! assert!(!token.is_cancelled());
//! source.cancel();
//! assert!(token.is_cancelled());
//! ```

use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(1);

/// Total number of cancellations signalled (for diagnostics/telemetry).
static CANCELLATIONS_TOTAL: AtomicU64 = AtomicU64::new(0);

/// Read the total cancellation count.
#[must_use]
pub fn cancellations_total() -> u64 {
    CANCELLATIONS_TOTAL.load(Ordering::Relaxed)
}

struct TokenInner {
    id: u64,
    cancelled: Cell<bool>,
}

/// The controlling half: owned by the effect's cleanup thunk.
pub struct CancelSource {
    inner: Rc<TokenInner>,
}

impl CancelSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(TokenInner {
                id: NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed),
                cancelled: Cell::new(false),
            }),
        }
    }

    /// Hand out an observing token for the work being started.
    #[must_use]
    pub fn token(&self) -> CancelToken {
        CancelToken {
            inner: Rc::clone(&self.inner),
        }
    }

    /// Signal cancellation. Idempotent; only the first call counts.
    pub fn cancel(&self) {
        if !self.inner.cancelled.replace(true) {
            CANCELLATIONS_TOTAL.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(token_id = self.inner.id, "cancelled");
        }
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelSource")
            .field("id", &self.inner.id)
            .field("cancelled", &self.inner.cancelled.get())
            .finish()
    }
}

/// The observing half: cheaply cloneable, checked by completion callbacks
/// at their natural entry points.
#[derive(Clone)]
pub struct CancelToken {
    inner: Rc<TokenInner>,
}

impl CancelToken {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.get()
    }

    /// Stable identifier, for logging.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("id", &self.inner.id)
            .field("cancelled", &self.inner.cancelled.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_observes_cancellation() {
        let source = CancelSource::new();
        let token = source.token();
        let clone = token.clone();

        assert!(!token.is_cancelled());
        source.cancel();
        assert!(token.is_cancelled());
        assert!(clone.is_cancelled());
    }

    #[test]
    fn cancel_is_idempotent() {
        let before = cancellations_total();
        let source = CancelSource::new();
        source.cancel();
        source.cancel();
        source.cancel();
        assert_eq!(cancellations_total() - before, 1);
    }

    #[test]
    fn ids_are_unique() {
        let a = CancelSource::new();
        let b = CancelSource::new();
        assert_ne!(a.token().id(), b.token().id());
    }
}
