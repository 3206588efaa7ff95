use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Longest wait between two calls, one day.
pub const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Minimum-interval gate for outbound requests.
///
/// Each `acquire` waits until `1 / calls_per_second` has passed since the
/// previous `acquire` returned. The lock is held across the wait, so callers
/// are released one at a time in arrival order (tokio's mutex is FIFO-fair).
/// There is no burst allowance.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// A non-positive rate disables the gate; rates too small to express
    /// as a `Duration` wait at most [`MAX_INTERVAL`].
    pub fn new(calls_per_second: f64) -> Self {
        let interval = if calls_per_second > 0.0 && calls_per_second.is_finite() {
            Duration::try_from_secs_f64(1.0 / calls_per_second)
                .map_or(MAX_INTERVAL, |d| d.min(MAX_INTERVAL))
        } else {
            Duration::ZERO
        };

        Self {
            interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn acquire(&self) {
        let mut last_call = self.last_call.lock().await;

        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                sleep(self.interval - elapsed).await;
            }
        }

        // Re-sample after the wait so oversleeping does not accumulate.
        *last_call = Some(Instant::now());
    }
}
