use std::time::Duration;

use tokio::{
    sync::Mutex,
    time::{sleep, Instant},
};

/// Default ceiling on outbound web-search calls.
pub const DEFAULT_CALLS_PER_SECOND: u32 = 4;

/// Single-slot throttle spacing outbound calls at least `min_interval` apart.
///
/// The lock is held across the wait so check-and-update is one critical
/// section even when several requests verify concurrently.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Limiter with an explicit spacing between calls.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Limiter allowing at most `calls_per_second` calls.
    #[must_use]
    pub fn per_second(calls_per_second: u32) -> Self {
        let calls = u64::from(calls_per_second.max(1));
        Self::new(Duration::from_millis(1_000 / calls))
    }

    /// Waits until the next call is permitted and records it.
    /// Returns how long the caller was held back.
    pub async fn acquire(&self) -> Duration {
        let mut last_call = self.last_call.lock().await;
        let mut waited = Duration::ZERO;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                waited = self.min_interval - elapsed;
                sleep(waited).await;
            }
        }
        *last_call = Some(Instant::now());
        waited
    }

    /// Configured spacing.
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::per_second(DEFAULT_CALLS_PER_SECOND)
    }
}
