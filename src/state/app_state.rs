//! Main application state: the registry of countdown instances

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Instant,
};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::{
    notify::NotificationPermission,
    timer::{spawn_timer, TimerHandle, TimerOptions, TimerServices},
    utils::format_uptime,
};

/// Per-request overrides for a new countdown
#[derive(Debug, Clone, Default)]
pub struct NewTimer {
    pub seconds: Option<u64>,
    pub title: Option<String>,
    pub body: Option<String>,
}

/// Shared server state holding every live countdown
#[derive(Debug)]
pub struct AppState {
    /// Live countdown instances by id
    timers: Arc<Mutex<HashMap<u64, TimerHandle>>>,
    next_id: AtomicU64,
    /// Defaults applied to every new instance
    pub options: TimerOptions,
    pub services: TimerServices,
    pub default_seconds: u64,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Arc<Mutex<Option<String>>>,
    pub last_action_time: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl AppState {
    pub fn new(
        port: u16,
        host: String,
        default_seconds: u64,
        options: TimerOptions,
        services: TimerServices,
    ) -> Self {
        Self {
            timers: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            options,
            services,
            default_seconds,
            start_time: Instant::now(),
            port,
            host,
            last_action: Arc::new(Mutex::new(None)),
            last_action_time: Arc::new(Mutex::new(None)),
        }
    }

    /// Spawn and register a new countdown instance
    pub fn create_timer(&self, request: NewTimer) -> Result<TimerHandle, String> {
        let seconds = request.seconds.unwrap_or(self.default_seconds);
        let mut options = self.options.clone();
        if let Some(title) = request.title {
            options.notification_title = title;
        }
        if let Some(body) = request.body {
            options.notification_body = body;
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = spawn_timer(id, seconds, options, self.services.clone())?;

        self.timers
            .lock()
            .map_err(|e| format!("Failed to lock timer registry: {}", e))?
            .insert(id, handle.clone());

        self.record_action(&format!("create timer {}", id));
        Ok(handle)
    }

    pub fn get_timer(&self, id: u64) -> Result<Option<TimerHandle>, String> {
        self.timers
            .lock()
            .map(|timers| timers.get(&id).cloned())
            .map_err(|e| format!("Failed to lock timer registry: {}", e))
    }

    /// Every live instance, ordered by id
    pub fn list_timers(&self) -> Result<Vec<TimerHandle>, String> {
        let timers = self.timers
            .lock()
            .map_err(|e| format!("Failed to lock timer registry: {}", e))?;

        let mut handles: Vec<TimerHandle> = timers.values().cloned().collect();
        handles.sort_by_key(|handle| handle.id());
        Ok(handles)
    }

    /// Unregister an instance and tear it down
    pub fn remove_timer(&self, id: u64) -> Result<Option<TimerHandle>, String> {
        let removed = self.timers
            .lock()
            .map_err(|e| format!("Failed to lock timer registry: {}", e))?
            .remove(&id);

        if let Some(handle) = &removed {
            handle.shutdown();
            self.record_action(&format!("delete timer {}", id));
        }
        Ok(removed)
    }

    /// Tear down every instance, e.g. on server shutdown
    pub fn shutdown_all(&self) -> Result<usize, String> {
        let drained: Vec<TimerHandle> = self.timers
            .lock()
            .map_err(|e| format!("Failed to lock timer registry: {}", e))?
            .drain()
            .map(|(_, handle)| handle)
            .collect();

        for handle in &drained {
            handle.shutdown();
        }
        info!("Shut down {} timer(s)", drained.len());
        Ok(drained.len())
    }

    /// Re-derive remaining time from the wall clock on every running instance
    ///
    /// Used after the host resumes from suspension, when no scheduled work
    /// ran for a while and each countdown must re-derive its remaining time
    /// from the wall clock.
    pub fn resync_running(&self) -> Result<usize, String> {
        let running: Vec<TimerHandle> = self
            .list_timers()?
            .into_iter()
            .filter(|handle| handle.snapshot().is_running())
            .collect();

        for handle in &running {
            handle.resync();
        }
        Ok(running.len())
    }

    pub fn record_action(&self, action: &str) {
        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        format_uptime(self.start_time.elapsed())
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }

    pub fn notification_permission(&self) -> NotificationPermission {
        self.services.notifier.permission()
    }

    /// Ask the notification backend for permission; may block briefly
    pub fn request_notification_permission(&self) -> NotificationPermission {
        let permission = self.services.notifier.request_permission();
        if permission == NotificationPermission::Denied {
            warn!("Notification permission denied, completion alerts will skip notifications");
        }
        self.record_action("request notification permission");
        permission
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::sleep;

    use super::*;
    use crate::{
        notify::{testing::FakeDevice, CompletionNotifier, NotifierSettings},
        timer::{clock::testing::TestClock, Visibility},
    };

    fn app_state(device: &Arc<FakeDevice>, clock: &Arc<TestClock>) -> AppState {
        let notifier = CompletionNotifier::new(
            device.clone(),
            Some(device.clone()),
            device.clone(),
            NotifierSettings::default(),
        );
        let services = TimerServices {
            notifier: Arc::new(notifier),
            wake_lock: device.clone(),
            clock: clock.clone(),
        };
        AppState::new(20554, "127.0.0.1".to_string(), 90, TimerOptions::default(), services)
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_uses_default_duration() {
        let state = app_state(&Arc::new(FakeDevice::default()), &Arc::new(TestClock::new()));

        let first = state.create_timer(NewTimer::default()).unwrap();
        let second = state
            .create_timer(NewTimer {
                seconds: Some(30),
                ..NewTimer::default()
            })
            .unwrap();

        assert_eq!(first.snapshot().initial_seconds, 90);
        assert_eq!(second.snapshot().initial_seconds, 30);
        assert_ne!(first.id(), second.id());

        let ids: Vec<u64> = state.list_timers().unwrap().iter().map(|h| h.id()).collect();
        assert_eq!(ids, vec![first.id(), second.id()]);
        assert_eq!(state.get_last_action().0, Some(format!("create timer {}", second.id())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_rejects_zero_seconds() {
        let state = app_state(&Arc::new(FakeDevice::default()), &Arc::new(TestClock::new()));

        let result = state.create_timer(NewTimer {
            seconds: Some(0),
            ..NewTimer::default()
        });
        assert!(result.is_err());
        assert!(state.list_timers().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_tears_down() {
        let state = app_state(&Arc::new(FakeDevice::default()), &Arc::new(TestClock::new()));
        let handle = state.create_timer(NewTimer::default()).unwrap();

        assert!(state.remove_timer(handle.id()).unwrap().is_some());
        assert!(state.remove_timer(handle.id()).unwrap().is_none());
        sleep(Duration::from_millis(10)).await;

        assert!(handle.is_closed());
        assert!(state.get_timer(handle.id()).unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resync_running_after_suspension() {
        let device = Arc::new(FakeDevice::default());
        let clock = Arc::new(TestClock::new());
        let state = app_state(&device, &clock);

        let running = state.create_timer(NewTimer::default()).unwrap();
        let idle = state.create_timer(NewTimer::default()).unwrap();
        running.start();
        sleep(Duration::from_millis(2_500)).await;

        clock.jump(Duration::from_secs(40));
        assert_eq!(state.resync_running().unwrap(), 1);
        sleep(Duration::from_millis(10)).await;

        assert_eq!(running.snapshot().remaining_seconds, 48);
        assert_eq!(idle.snapshot().remaining_seconds, 90);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resync_running_keeps_client_visibility() {
        let device = Arc::new(FakeDevice::default());
        let clock = Arc::new(TestClock::new());
        let state = app_state(&device, &clock);

        let handle = state.create_timer(NewTimer::default()).unwrap();
        handle.start();
        sleep(Duration::from_millis(2_500)).await;
        handle.set_visibility(Visibility::Hidden);

        clock.jump(Duration::from_secs(10));
        state.resync_running().unwrap();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.snapshot().remaining_seconds, 78);

        // Still hidden, so coming back resyncs again
        clock.jump(Duration::from_secs(10));
        handle.set_visibility(Visibility::Visible);
        sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.snapshot().remaining_seconds, 68);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_all() {
        let state = app_state(&Arc::new(FakeDevice::default()), &Arc::new(TestClock::new()));
        let a = state.create_timer(NewTimer::default()).unwrap();
        let b = state.create_timer(NewTimer::default()).unwrap();

        assert_eq!(state.shutdown_all().unwrap(), 2);
        sleep(Duration::from_millis(10)).await;

        assert!(a.is_closed());
        assert!(b.is_closed());
        assert!(state.list_timers().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_request() {
        let state = app_state(&Arc::new(FakeDevice::default()), &Arc::new(TestClock::new()));

        assert_eq!(state.notification_permission(), NotificationPermission::Default);
        assert_eq!(state.request_notification_permission(), NotificationPermission::Granted);
        assert_eq!(state.notification_permission(), NotificationPermission::Granted);
    }
}
