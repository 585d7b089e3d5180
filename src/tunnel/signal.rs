//! One-shot stop broadcast shared by the two directions of a session

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Idempotent "stop now" signal.
///
/// Raising it any number of times from any task is safe; exactly one
/// [`StopSignal::raise`] call observes the transition. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    raised: AtomicBool,
    token: CancellationToken,
}

impl StopSignal {
    /// Create an unraised signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a signal that is also raised when `parent` is cancelled
    pub fn child_of(parent: &CancellationToken) -> Self {
        Self {
            inner: Arc::new(Inner {
                raised: AtomicBool::new(false),
                token: parent.child_token(),
            }),
        }
    }

    /// Raise the signal.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn raise(&self) -> bool {
        let first = !self.inner.raised.swap(true, Ordering::AcqRel);
        if first {
            self.inner.token.cancel();
        }
        first
    }

    /// Non-blocking check
    pub fn is_raised(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Wait until the signal is raised
    pub async fn raised(&self) {
        self.inner.token.cancelled().await
    }
}
