//! Client-side request pacing.
//!
//! Each exchange client owns one [`Throttle`] and awaits
//! [`acquire`](Throttle::acquire) before every REST call. With a non-zero
//! interval, consecutive requests through the same client are spaced at
//! least `min_interval` apart; concurrent callers queue on the internal
//! mutex in arrival order.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Minimum-spacing request throttle.
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    /// Earliest instant the next request may be sent.
    next_slot: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    /// A throttle that never waits.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Build from the pass-through rate limit settings.
    pub fn from_config(config: &tx_core::config::RateLimitConfig, default_ms: u64) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        Self::new(Duration::from_millis(config.min_interval_ms.unwrap_or(default_ms)))
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until the next request slot is available and claim it.
    pub async fn acquire(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let mut slot = self.next_slot.lock().await;
        let now = Instant::now();
        if let Some(at) = *slot {
            if at > now {
                tokio::time::sleep_until(at).await;
            }
        }
        *slot = Some(Instant::now() + self.min_interval);
    }
}
