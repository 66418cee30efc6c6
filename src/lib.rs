//! Rest Timer - A background countdown server for workout rest periods
//!
//! This library provides countdown instances that keep accurate time while
//! their host is throttled or suspended, and alert on completion through
//! haptic, audible, and desktop-notification channels.

pub mod config;
pub mod state;
pub mod timer;
pub mod notify;
pub mod api;
pub mod services;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use state::AppState;
pub use api::create_router;
pub use timer::{spawn_timer, TimerHandle};
pub use utils::signals::shutdown_signal;
