//! Background tasks module
//!
//! The per-countdown controller and primary clock tasks, plus the resume
//! watch that runs alongside the HTTP server.

pub mod countdown;
pub mod primary_clock;
pub mod resume_watch;

// Re-export main functions
pub use primary_clock::{ClockCommand, ClockEvent, PrimaryClock};
pub use resume_watch::resume_watch_task;
