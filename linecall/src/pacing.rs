//! Pacing policy for streaming producers.
//!
//! A deliberate delay between successive writes so progressive delivery is
//! observable. The delay is a cooperative `tokio::time::sleep`: it suspends
//! only the producing task, never other calls or the opposite direction of the
//! same call.

use std::time::Duration;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pacing {
    delay: Duration,
}

impl Pacing {
    /// No delay at all.
    pub const fn none() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }

    pub const fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self::fixed(Duration::from_millis(millis))
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_none(&self) -> bool {
        self.delay.is_zero()
    }

    /// Suspend the current task for the configured delay.
    pub async fn pace(&self) {
        if !self.is_none() {
            tokio::time::sleep(self.delay).await;
        }
    }
}
