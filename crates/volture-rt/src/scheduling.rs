//! ---
//! volture_section: "01-core-functionality"
//! volture_subsection: "module"
//! volture_type: "source"
//! volture_scope: "code"
//! volture_description: "Runtime helpers supporting the tick driver."
//! volture_version: "v0.1.0"
//! volture_owner: "tbd"
//! ---
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

/// Async fixed-period interval. A late tick delays the schedule rather than
/// bursting to catch up.
#[derive(Debug)]
pub struct RateLimiter {
    period: Duration,
    interval: tokio::time::Interval,
}

impl RateLimiter {
    /// Panics if `period` is zero.
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { period, interval }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_follow_period() {
        let mut limiter = RateLimiter::new(Duration::from_secs(2));
        let first = limiter.tick().await;
        let second = limiter.tick().await;
        assert_eq!(second - first, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_is_immediate_and_late_ticks_delay() {
        let start = Instant::now();
        let mut limiter = RateLimiter::new(Duration::from_millis(500));
        assert_eq!(limiter.period(), Duration::from_millis(500));
        assert_eq!(limiter.tick().await, start);

        tokio::time::sleep(Duration::from_millis(1_200)).await;
        // The missed tick fires at once; the schedule restarts from now.
        assert_eq!(limiter.tick().await, start + Duration::from_millis(500));
        assert_eq!(limiter.tick().await, start + Duration::from_millis(1_700));
    }
}
