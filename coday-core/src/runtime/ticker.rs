//! Shared periodic-tick abstraction backing both the agent loop's "still
//! thinking" cadence (§4.7, every 3s while waiting on a provider call) and
//! the session gateway's heartbeat (§4.9 supplemental feature, every 10s).
//! A single small wrapper avoids two near-identical `tokio::time::interval`
//! call sites drifting apart.

use std::time::Duration;
use tokio::time::{self, Interval, MissedTickBehavior};

/// Cadence used by the agent loop to emit `Event::Text` "thinking" updates
/// while a provider call is in flight.
pub const THINKING_INTERVAL: Duration = Duration::from_secs(3);

/// Cadence used by the session gateway to emit `Event::HeartBeat` on an
/// otherwise idle SSE stream.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// A periodic tick source. Ticks that land while the consumer is busy are
/// coalesced into a single tick (`MissedTickBehavior::Delay`) rather than
/// bursting, since both call sites only care about "time has passed," not
/// exact tick count.
pub struct Ticker {
    interval: Interval,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.reset();
        Self { interval }
    }

    /// Wait for the next tick.
    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn ticks_at_configured_period() {
        let mut ticker = Ticker::new(Duration::from_millis(50));
        let start = Instant::now();
        ticker.tick().await; // first tick fires immediately
        ticker.tick().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
