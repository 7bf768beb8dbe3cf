//! Global request spacing
//!
//! One [`RateLimiter`] is shared by everything that sends requests during a
//! run. Consecutive request starts are at least `delay` apart no matter how
//! many tasks hold a clone.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Shared minimum-interval limiter
#[derive(Debug, Clone)]
pub struct RateLimiter {
    delay: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    /// Creates a limiter enforcing `delay` between request starts
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// The enforced interval
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Waits until a request may start, then claims that slot
    ///
    /// The lock is held across the sleep, so waiters queue up in order and
    /// each one measures from the previous claim.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(previous) = *last {
            let ready_at = previous + self.delay;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }

        *last = Some(Instant::now());
    }
}
