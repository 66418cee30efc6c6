//! Completion alerts and the device capabilities they rely on
//!
//! Every capability is reached through an injected port so that hosts without
//! a given device (no vibration motor, no notification daemon) simply degrade.

pub mod notifier;
pub mod ports;
pub mod wake_lock;

pub use notifier::{CompletionNotifier, NotifierSettings};
pub use ports::{
    AudioPort, HapticPort, NotificationPermission, NotificationPort, SystemNotification,
    Unsupported, WakeLockPort,
};
pub use wake_lock::WakeLock;
