//! Timer state structure and management

use serde::{Deserialize, Serialize};

use crate::utils::format_clock;

/// Quick rest durations offered alongside every countdown, in seconds
pub const QUICK_PRESETS: [u64; 5] = [30, 60, 90, 120, 180];

/// Lifecycle phase of a countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    /// Configured but never started since the last reset
    Idle,
    Running,
    Paused,
    /// Reached zero while running; only an explicit reset leaves this phase
    Completed,
}

/// Countdown state owned by a single timer instance
///
/// Running and completed are both derived from [`TimerPhase`], so a state can
/// never report both at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub remaining_seconds: u64,
    pub initial_seconds: u64,
    pub phase: TimerPhase,
}

impl TimerState {
    /// Create an idle timer configured for `initial_seconds`
    pub fn new(initial_seconds: u64) -> Self {
        Self {
            remaining_seconds: initial_seconds,
            initial_seconds,
            phase: TimerPhase::Idle,
        }
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    /// Check if the countdown is actively decrementing
    pub fn is_running(&self) -> bool {
        self.phase == TimerPhase::Running
    }

    /// Check if the countdown reached zero and has not been reset since
    pub fn is_completed(&self) -> bool {
        self.phase == TimerPhase::Completed
    }

    /// Seconds counted down from the configured duration
    ///
    /// Zero when the remaining time was adjusted above the configured duration.
    pub fn elapsed_seconds(&self) -> u64 {
        self.initial_seconds.saturating_sub(self.remaining_seconds)
    }

    /// Share of the configured duration already elapsed, in `0.0..=100.0`
    pub fn progress_percent(&self) -> f64 {
        if self.initial_seconds == 0 {
            return 0.0;
        }
        let percent = self.elapsed_seconds() as f64 / self.initial_seconds as f64 * 100.0;
        percent.clamp(0.0, 100.0)
    }

    /// Remaining time as `MM:SS`
    pub fn display(&self) -> String {
        format_clock(self.remaining_seconds)
    }

    /// Whether a quick preset matches the configured duration
    pub fn is_preset_selected(&self, preset_seconds: u64) -> bool {
        preset_seconds == self.initial_seconds
    }
}
