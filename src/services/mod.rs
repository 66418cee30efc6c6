//! Host integrations module
//!
//! Concrete device ports for a desktop host: notifications, tones, and the
//! sleep inhibitor standing in for a screen wake lock.

pub mod desktop;
pub mod inhibit;
pub mod system;
pub mod tone;

// Re-export main types
pub use desktop::DesktopNotifications;
pub use inhibit::Inhibitor;
pub use system::*;
pub use tone::{TerminalBell, ToneCommand};
