//! Drift-correcting fallback clock
//!
//! The fallback never counts its own wake-ups. Every wake recomputes the
//! remaining time from a wall-clock [`Anchor`], so missed or delayed wake-ups
//! (a throttled scheduler, a suspended host) are corrected on the next one.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::debug;

use super::clock::whole_seconds_between;

/// How often the fallback clock wakes while active
pub const FALLBACK_PERIOD: Duration = Duration::from_secs(1);

/// Wall-clock reference point of a running countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    /// When the reference was taken
    pub at: DateTime<Utc>,
    /// Remaining seconds at that moment
    pub remaining: u64,
}

impl Anchor {
    pub fn new(at: DateTime<Utc>, remaining: u64) -> Self {
        Self { at, remaining }
    }

    /// Remaining seconds at `now`, i.e. `max(r0 - floor(now - t0), 0)`
    pub fn remaining_at(&self, now: DateTime<Utc>) -> u64 {
        self.remaining
            .saturating_sub(whole_seconds_between(self.at, now))
    }
}

/// Backup clock that only runs while the primary clock shows no progress
#[derive(Debug, Default)]
pub struct FallbackClock {
    ticker: Option<Interval>,
    activations: u32,
}

impl FallbackClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.ticker.is_some()
    }

    /// Number of times the fallback took over in this timer's lifetime
    pub fn activations(&self) -> u32 {
        self.activations
    }

    /// Begin periodic wakes; returns false if already active
    pub fn activate(&mut self) -> bool {
        if self.ticker.is_some() {
            return false;
        }
        let mut ticker = interval_at(Instant::now() + FALLBACK_PERIOD, FALLBACK_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
        self.activations += 1;
        debug!("Fallback clock activated (activation #{})", self.activations);
        true
    }

    /// Cancel the schedule; returns whether it was active
    pub fn stop(&mut self) -> bool {
        self.ticker.take().is_some()
    }

    /// Resolve on the next scheduled wake; pending forever while inactive
    pub async fn wake(&mut self) {
        match self.ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_anchor_floors_elapsed_time() {
        let t0 = Utc::now();
        let anchor = Anchor::new(t0, 90);

        assert_eq!(anchor.remaining_at(t0), 90);
        assert_eq!(anchor.remaining_at(t0 + TimeDelta::milliseconds(999)), 90);
        assert_eq!(anchor.remaining_at(t0 + TimeDelta::milliseconds(10_400)), 80);
    }

    #[test]
    fn test_anchor_clamps_at_zero() {
        let t0 = Utc::now();
        let anchor = Anchor::new(t0, 30);
        assert_eq!(anchor.remaining_at(t0 + TimeDelta::minutes(10)), 0);
    }

    #[test]
    fn test_anchor_ignores_backwards_clock() {
        let t0 = Utc::now();
        let anchor = Anchor::new(t0, 30);
        assert_eq!(anchor.remaining_at(t0 - TimeDelta::seconds(20)), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activate_is_idempotent() {
        let mut fallback = FallbackClock::new();
        assert!(!fallback.is_active());

        assert!(fallback.activate());
        assert!(!fallback.activate());
        assert_eq!(fallback.activations(), 1);

        assert!(fallback.stop());
        assert!(!fallback.stop());
        assert!(!fallback.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wakes_once_per_period() {
        let mut fallback = FallbackClock::new();
        fallback.activate();

        let start = Instant::now();
        fallback.wake().await;
        assert_eq!(start.elapsed(), FALLBACK_PERIOD);
        fallback.wake().await;
        assert_eq!(start.elapsed(), FALLBACK_PERIOD * 2);
    }
}
