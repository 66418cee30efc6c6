//! State management module
//!
//! Per-countdown state and the server-wide registry of countdown instances.

pub mod app_state;
pub mod timer_state;

// Re-export main types
pub use app_state::{AppState, NewTimer};
pub use timer_state::{TimerPhase, TimerState, QUICK_PRESETS};
