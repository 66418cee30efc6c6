//! Wall-clock sources used for drift correction

use chrono::{DateTime, Utc};

/// Source of wall-clock time
///
/// Drift correction measures elapsed time against this clock, so it must keep
/// advancing while the host is suspended and scheduled work is not.
pub trait WallClock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// The system's real-time clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Whole seconds between two instants, floored and never negative
pub fn whole_seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    (to - from).num_seconds().max(0) as u64
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_whole_seconds_floor() {
        let t0 = Utc::now();
        assert_eq!(whole_seconds_between(t0, t0), 0);
        assert_eq!(whole_seconds_between(t0, t0 + TimeDelta::milliseconds(1_999)), 1);
        assert_eq!(whole_seconds_between(t0, t0 + TimeDelta::seconds(75)), 75);
    }

    #[test]
    fn test_whole_seconds_clock_went_backwards() {
        let t0 = Utc::now();
        assert_eq!(whole_seconds_between(t0, t0 - TimeDelta::seconds(5)), 0);
    }
}
