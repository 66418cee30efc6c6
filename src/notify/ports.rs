//! Device capability ports

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Permission to show system notifications, as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPermission {
    /// Never asked
    Default,
    Granted,
    Denied,
}

/// A system notification as handed to a [`NotificationPort`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemNotification {
    pub title: String,
    pub body: String,
    /// Notifications sharing a tag replace each other instead of stacking
    pub tag: String,
    /// Vibration hint in milliseconds, on/off alternating
    pub vibrate: Vec<u64>,
    /// Dismiss automatically after this long
    pub timeout: Duration,
    /// Keep on screen until dismissed or timed out
    pub require_interaction: bool,
}

pub trait HapticPort: Send + Sync {
    /// Run a vibration pattern (milliseconds, on/off alternating)
    fn vibrate(&self, pattern_ms: &[u64]) -> Result<(), String>;
}

pub trait AudioPort: Send + Sync {
    /// Prepare the tone ahead of time; called once at construction
    fn prime(&self) -> Result<(), String>;

    fn play_tone(&self) -> Result<(), String>;

    fn stop(&self) -> Result<(), String>;
}

pub trait NotificationPort: Send + Sync {
    fn permission(&self) -> NotificationPermission;

    /// Ask the user for permission. Only call this in response to a user action.
    fn request_permission(&self) -> NotificationPermission;

    /// Display a notification. Clicking it should focus the app and dismiss it.
    fn show(&self, notification: &SystemNotification) -> Result<(), String>;

    /// Dismiss the notification carrying `tag`, if still shown
    fn close(&self, tag: &str) -> Result<(), String>;
}

pub trait WakeLockPort: Send + Sync {
    fn acquire(&self) -> Result<(), String>;

    /// Must be safe to call when nothing is held
    fn release(&self) -> Result<(), String>;
}

/// Stand-in for a capability the host does not have
#[derive(Debug, Default, Clone, Copy)]
pub struct Unsupported;

impl HapticPort for Unsupported {
    fn vibrate(&self, _pattern_ms: &[u64]) -> Result<(), String> {
        Err("vibration is not supported on this host".to_string())
    }
}

impl AudioPort for Unsupported {
    fn prime(&self) -> Result<(), String> {
        Err("audio output is not supported on this host".to_string())
    }

    fn play_tone(&self) -> Result<(), String> {
        Err("audio output is not supported on this host".to_string())
    }

    fn stop(&self) -> Result<(), String> {
        Ok(())
    }
}

impl NotificationPort for Unsupported {
    fn permission(&self) -> NotificationPermission {
        NotificationPermission::Denied
    }

    fn request_permission(&self) -> NotificationPermission {
        NotificationPermission::Denied
    }

    fn show(&self, _notification: &SystemNotification) -> Result<(), String> {
        Err("system notifications are not supported on this host".to_string())
    }

    fn close(&self, _tag: &str) -> Result<(), String> {
        Ok(())
    }
}

impl WakeLockPort for Unsupported {
    fn acquire(&self) -> Result<(), String> {
        Err("wake lock is not supported on this host".to_string())
    }

    fn release(&self) -> Result<(), String> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_degrades() {
        let port = Unsupported;
        assert!(HapticPort::vibrate(&port, &[100]).is_err());
        assert_eq!(port.permission(), NotificationPermission::Denied);
        assert_eq!(port.request_permission(), NotificationPermission::Denied);
        assert!(WakeLockPort::release(&port).is_ok());
        assert!(AudioPort::stop(&port).is_ok());
    }

    #[test]
    fn test_permission_serializes_lowercase() {
        let json = serde_json::to_string(&NotificationPermission::Granted).unwrap();
        assert_eq!(json, "\"granted\"");
    }
}
