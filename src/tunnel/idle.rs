//! Session-wide idle tracking
//!
//! Both directions of a session share one clock. Either direction touches
//! it when bytes arrive, so a one-way transfer keeps the whole session
//! alive.

use std::future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Last-activity clock shared by the directions of one session
#[derive(Debug, Clone)]
pub struct IdleClock {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    origin: Instant,
    /// Milliseconds since `origin` at the last activity
    last_active: AtomicU64,
}

impl IdleClock {
    /// Start a clock; creation counts as activity
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                origin: Instant::now(),
                last_active: AtomicU64::new(0),
            }),
        }
    }

    fn now_ms(&self) -> u64 {
        self.inner.origin.elapsed().as_millis() as u64
    }

    /// Record activity
    pub fn touch(&self) {
        self.inner
            .last_active
            .fetch_max(self.now_ms(), Ordering::Relaxed);
    }

    /// Time since either direction last saw data
    pub fn idle_for(&self) -> Duration {
        let last = self.inner.last_active.load(Ordering::Relaxed);
        Duration::from_millis(self.now_ms().saturating_sub(last))
    }

    /// Resolve once the session has been quiet for `limit`. `None` never
    /// resolves.
    pub async fn expired(&self, limit: Option<Duration>) {
        let Some(limit) = limit else {
            return future::pending().await;
        };

        loop {
            let idle = self.idle_for();
            if idle >= limit {
                return;
            }
            tokio::time::sleep(limit - idle).await;
        }
    }
}

impl Default for IdleClock {
    fn default() -> Self {
        Self::new()
    }
}
