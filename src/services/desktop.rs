//! Desktop notifications through the platform notification server

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use notify_rust::{Notification, Timeout};
use tracing::{debug, info, warn};

use crate::notify::{NotificationPermission, NotificationPort, SystemNotification};

/// Server-assigned ids of the notifications on screen, by tag
type ShownIds = Arc<Mutex<HashMap<String, u32>>>;

/// [`NotificationPort`] backed by `notify-rust`
///
/// Permission starts out undecided. Requesting it probes the notification
/// server: reachable means granted, anything else means denied.
///
/// A notification reuses the server id of the one shown under the same tag,
/// so the server replaces it in place. Clicking it dismisses it.
#[derive(Debug)]
pub struct DesktopNotifications {
    app_name: String,
    permission: Mutex<NotificationPermission>,
    shown: ShownIds,
}

impl DesktopNotifications {
    pub fn new(app_name: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            permission: Mutex::new(NotificationPermission::Default),
            shown: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Id of the notification currently shown under `tag`
    fn shown_id(&self, tag: &str) -> Option<u32> {
        self.shown.lock().ok()?.get(tag).copied()
    }
}

fn remember(shown: &ShownIds, tag: &str, id: u32) {
    if let Ok(mut shown) = shown.lock() {
        shown.insert(tag.to_string(), id);
    }
}

/// Drop `tag` unless a newer notification has taken it over
fn forget(shown: &ShownIds, tag: &str, id: u32) {
    if let Ok(mut shown) = shown.lock() {
        if shown.get(tag) == Some(&id) {
            shown.remove(tag);
        }
    }
}

impl NotificationPort for DesktopNotifications {
    fn permission(&self) -> NotificationPermission {
        self.permission
            .lock()
            .map(|permission| *permission)
            .unwrap_or(NotificationPermission::Default)
    }

    fn request_permission(&self) -> NotificationPermission {
        let permission = match probe_server() {
            Ok(server) => {
                info!("Notification server available: {}", server);
                NotificationPermission::Granted
            }
            Err(e) => {
                warn!("Notification server unreachable: {}", e);
                NotificationPermission::Denied
            }
        };

        if let Ok(mut current) = self.permission.lock() {
            *current = permission;
        }
        permission
    }

    fn show(&self, notification: &SystemNotification) -> Result<(), String> {
        let timeout_ms = u32::try_from(notification.timeout.as_millis()).unwrap_or(u32::MAX);
        let mut desktop = Notification::new();
        desktop
            .summary(&notification.title)
            .body(&notification.body)
            .appname(&self.app_name)
            .action("default", "Open")
            .timeout(Timeout::Milliseconds(timeout_ms));
        if let Some(id) = self.shown_id(&notification.tag) {
            desktop.id(id);
        }
        if notification.require_interaction {
            mark_urgent(&mut desktop);
        }
        let desktop = desktop.finalize();

        // Showing and waiting for a click both block on the notification server
        let shown = Arc::clone(&self.shown);
        let tag = notification.tag.clone();
        std::thread::spawn(move || present(desktop, tag, shown));
        Ok(())
    }

    fn close(&self, tag: &str) -> Result<(), String> {
        let Some(id) = self.shown_id(tag) else {
            debug!("No notification '{}' left to close", tag);
            return Ok(());
        };

        forget(&self.shown, tag, id);
        let app_name = self.app_name.clone();
        std::thread::spawn(move || dismiss(&app_name, id));
        Ok(())
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn mark_urgent(notification: &mut Notification) {
    notification.urgency(notify_rust::Urgency::Critical);
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn mark_urgent(_notification: &mut Notification) {}

#[cfg(all(unix, not(target_os = "macos")))]
fn present(notification: Notification, tag: String, shown: ShownIds) {
    let handle = match notification.show() {
        Ok(handle) => handle,
        Err(e) => {
            warn!("Desktop notification failed: {}", e);
            return;
        }
    };

    let id = handle.id();
    remember(&shown, &tag, id);
    let app_name = notification.appname.clone();
    handle.wait_for_action(|action| {
        if action == "default" {
            debug!("Notification '{}' clicked", tag);
            dismiss(&app_name, id);
        }
    });
    forget(&shown, &tag, id);
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn present(notification: Notification, tag: String, _shown: ShownIds) {
    if let Err(e) = notification.show() {
        warn!("Desktop notification '{}' failed: {}", tag, e);
    }
}

/// Close notification `id` by replacing it with one that expires at once
///
/// The handle that could close it is consumed while waiting for a click.
fn dismiss(app_name: &str, id: u32) {
    let result = Notification::new()
        .appname(app_name)
        .summary("")
        .id(id)
        .timeout(Timeout::Milliseconds(1))
        .show();
    if let Err(e) = result {
        debug!("Failed to dismiss notification {}: {}", id, e);
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn probe_server() -> Result<String, String> {
    notify_rust::get_server_information()
        .map(|info| format!("{} {}", info.name, info.version))
        .map_err(|e| e.to_string())
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn probe_server() -> Result<String, String> {
    Ok("system notification center".to_string())
}
