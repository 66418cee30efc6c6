//! Resume watch background task

use std::{sync::Arc, time::Duration};
use chrono::TimeDelta;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Wall-clock slack tolerated between two samples before calling it a resume
const RESUME_TOLERANCE: Duration = Duration::from_secs(2);

/// How far the wall clock ran ahead of the monotonic clock, if beyond `tolerance`
///
/// The monotonic clock stands still while the host is suspended; the wall
/// clock does not.
pub fn suspended_for(
    wall_elapsed: TimeDelta,
    monotonic_elapsed: Duration,
    tolerance: Duration,
) -> Option<Duration> {
    let wall = wall_elapsed.to_std().ok()?;
    let gap = wall.checked_sub(monotonic_elapsed)?;
    (gap > tolerance).then_some(gap)
}

/// Background task that detects host suspension and resyncs running timers
pub async fn resume_watch_task(state: Arc<AppState>, period: Duration) {
    info!("Starting resume watch task (every {}s)", period.as_secs());

    let clock = Arc::clone(&state.services.clock);
    let mut interval = interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await;

    let mut last_wall = clock.now();
    let mut last_monotonic = Instant::now();

    loop {
        interval.tick().await;

        let wall = clock.now();
        let monotonic = Instant::now();
        let gap = suspended_for(
            wall - last_wall,
            monotonic.duration_since(last_monotonic),
            RESUME_TOLERANCE,
        );
        last_wall = wall;
        last_monotonic = monotonic;

        let Some(gap) = gap else {
            continue;
        };
        info!("Host resume detected (~{}s unaccounted for), resyncing timers", gap.as_secs());
        match state.resync_running() {
            Ok(count) => debug!("Resynced {} running timer(s)", count),
            Err(e) => warn!("Failed to resync timers after resume: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::sleep;

    use super::*;
    use crate::{
        notify::{testing::FakeDevice, CompletionNotifier, NotifierSettings},
        state::NewTimer,
        timer::{clock::testing::TestClock, TimerOptions, TimerServices},
    };

    #[test]
    fn test_no_gap_when_clocks_agree() {
        let tolerance = Duration::from_secs(2);
        assert_eq!(
            suspended_for(TimeDelta::seconds(15), Duration::from_secs(15), tolerance),
            None
        );
        assert_eq!(
            suspended_for(TimeDelta::seconds(16), Duration::from_secs(15), tolerance),
            None
        );
    }

    #[test]
    fn test_gap_after_suspension() {
        let gap = suspended_for(
            TimeDelta::seconds(615),
            Duration::from_secs(15),
            Duration::from_secs(2),
        );
        assert_eq!(gap, Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_wall_clock_going_backwards_is_not_a_resume() {
        let gap = suspended_for(
            TimeDelta::seconds(-3600),
            Duration::from_secs(15),
            Duration::from_secs(2),
        );
        assert_eq!(gap, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resyncs_running_timers_after_resume() {
        let device = Arc::new(FakeDevice::default());
        let clock = Arc::new(TestClock::new());
        let notifier = CompletionNotifier::new(
            device.clone(),
            None,
            device.clone(),
            NotifierSettings::default(),
        );
        let services = TimerServices {
            notifier: Arc::new(notifier),
            wake_lock: device.clone(),
            clock: clock.clone(),
        };
        let state = Arc::new(AppState::new(
            20554,
            "127.0.0.1".to_string(),
            120,
            TimerOptions::default(),
            services,
        ));
        tokio::spawn(resume_watch_task(Arc::clone(&state), Duration::from_secs(15)));

        let handle = state.create_timer(NewTimer::default()).unwrap();
        handle.start();
        sleep(Duration::from_millis(10_500)).await;
        assert_eq!(handle.snapshot().remaining_seconds, 110);

        // Suspended for a minute: nothing ran, wall time moved on
        clock.jump(Duration::from_secs(60));
        sleep(Duration::from_secs(5)).await;

        assert_eq!(handle.snapshot().remaining_seconds, 45);
    }
}
