//! Multi-channel completion alert

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{task::JoinHandle, time::sleep};
use tracing::{debug, info, warn};

use super::ports::{
    AudioPort, HapticPort, NotificationPermission, NotificationPort, SystemNotification,
};

/// Haptic pulse fired on completion: on, off, on, off, on (ms)
pub const HAPTIC_PATTERN: [u64; 5] = [100, 50, 100, 50, 100];

/// Vibration hint attached to the system notification (ms)
pub const NOTIFICATION_VIBRATION: [u64; 5] = [200, 100, 200, 100, 200];

/// Tag shared by every completion notification so a new one replaces the last
pub const NOTIFICATION_TAG: &str = "workout-timer";

const TONE_LENGTH: Duration = Duration::from_millis(200);
const TONE_GAP: Duration = Duration::from_millis(100);

/// Tunables for the completion alert
#[derive(Debug, Clone)]
pub struct NotifierSettings {
    /// How many times the tone repeats; zero disables sound
    pub beeps: u32,
    /// When the system notification dismisses itself
    pub auto_dismiss: Duration,
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            beeps: 3,
            auto_dismiss: Duration::from_secs(15),
        }
    }
}

/// Fires haptic, audible and system-notification alerts
///
/// Channels are attempted independently: a missing or failing channel is
/// logged and the others still fire. The notifier itself has no dedupe
/// state; callers invoke it once per transition into completion.
pub struct CompletionNotifier {
    haptic: Arc<dyn HapticPort>,
    audio: Option<Arc<dyn AudioPort>>,
    notifications: Arc<dyn NotificationPort>,
    settings: NotifierSettings,
    /// Bumped on every notification shown; auto-dismiss only closes the latest
    shown: Arc<AtomicU64>,
}

impl std::fmt::Debug for CompletionNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionNotifier")
            .field("audio", &self.audio.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}

impl CompletionNotifier {
    /// Build a notifier, priming the audio source right away
    ///
    /// Playback on most platforms only succeeds if the source was prepared
    /// ahead of time, so priming happens here rather than on completion.
    pub fn new(
        haptic: Arc<dyn HapticPort>,
        audio: Option<Arc<dyn AudioPort>>,
        notifications: Arc<dyn NotificationPort>,
        settings: NotifierSettings,
    ) -> Self {
        if let Some(audio) = &audio {
            match audio.prime() {
                Ok(()) => debug!("Audio tone primed"),
                Err(e) => warn!("Failed to prime audio tone, playback may fail: {}", e),
            }
        }

        Self {
            haptic,
            audio,
            notifications,
            settings,
            shown: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn permission(&self) -> NotificationPermission {
        self.notifications.permission()
    }

    /// Ask for notification permission; call only on an explicit user action
    pub fn request_permission(&self) -> NotificationPermission {
        let permission = self.notifications.request_permission();
        info!("Notification permission is now {:?}", permission);
        permission
    }

    /// Alert the user on every available channel
    ///
    /// Returns the task playing the tone sequence, if any, so the caller can
    /// cut it short on teardown.
    pub fn notify(&self, title: &str, body: &str) -> Option<JoinHandle<()>> {
        info!("Timer complete, alerting: {}", title);

        if let Err(e) = self.haptic.vibrate(&HAPTIC_PATTERN) {
            warn!("Haptic feedback failed: {}", e);
        }

        let tones = match &self.audio {
            Some(audio) if self.settings.beeps > 0 => {
                Some(tokio::spawn(play_tones(Arc::clone(audio), self.settings.beeps)))
            }
            _ => None,
        };

        self.show_system_notification(title, body);

        tones
    }

    /// Stop any tone that is currently playing
    pub fn silence(&self) {
        if let Some(audio) = &self.audio {
            if let Err(e) = audio.stop() {
                debug!("Failed to stop tone: {}", e);
            }
        }
    }

    fn show_system_notification(&self, title: &str, body: &str) {
        let permission = self.notifications.permission();
        if permission != NotificationPermission::Granted {
            debug!("Skipping system notification, permission is {:?}", permission);
            return;
        }

        let notification = SystemNotification {
            title: title.to_string(),
            body: body.to_string(),
            tag: NOTIFICATION_TAG.to_string(),
            vibrate: NOTIFICATION_VIBRATION.to_vec(),
            timeout: self.settings.auto_dismiss,
            require_interaction: true,
        };

        if let Err(e) = self.notifications.show(&notification) {
            warn!("Failed to show notification: {}", e);
            return;
        }

        let sequence = self.shown.fetch_add(1, Ordering::SeqCst) + 1;
        let shown = Arc::clone(&self.shown);
        let notifications = Arc::clone(&self.notifications);
        let timeout = self.settings.auto_dismiss;
        tokio::spawn(async move {
            sleep(timeout).await;
            // A newer notification replaced this one and owns its own dismissal
            if shown.load(Ordering::SeqCst) != sequence {
                return;
            }
            if let Err(e) = notifications.close(NOTIFICATION_TAG) {
                debug!("Failed to dismiss notification: {}", e);
            }
        });
    }
}

async fn play_tones(audio: Arc<dyn AudioPort>, beeps: u32) {
    for _ in 0..beeps {
        if let Err(e) = audio.play_tone() {
            warn!("Audio play failed: {}", e);
            return;
        }
        sleep(TONE_LENGTH).await;
        if let Err(e) = audio.stop() {
            debug!("Failed to stop tone: {}", e);
        }
        sleep(TONE_GAP).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::FakeDevice;

    fn notifier_for(device: &Arc<FakeDevice>) -> CompletionNotifier {
        CompletionNotifier::new(
            device.clone(),
            Some(device.clone()),
            device.clone(),
            NotifierSettings::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_primes_audio_at_construction() {
        let device = Arc::new(FakeDevice::default());
        let _notifier = notifier_for(&device);
        assert_eq!(device.primed.load(Ordering::SeqCst), 1);
        assert_eq!(device.tones.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_every_channel_when_granted() {
        let device = Arc::new(FakeDevice::granted());
        let notifier = notifier_for(&device);

        let tones = notifier.notify("Rest over", "Next set");
        tones.unwrap().await.unwrap();

        assert_eq!(device.vibrations.lock().unwrap()[0], HAPTIC_PATTERN.to_vec());
        assert_eq!(device.tones.load(Ordering::SeqCst), 3);
        assert_eq!(device.tone_stops.load(Ordering::SeqCst), 3);

        let shown = device.shown.lock().unwrap().clone();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "Rest over");
        assert_eq!(shown[0].body, "Next set");
        assert_eq!(shown[0].tag, NOTIFICATION_TAG);
        assert_eq!(shown[0].vibrate, NOTIFICATION_VIBRATION.to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_dismisses_notification() {
        let device = Arc::new(FakeDevice::granted());
        let notifier = notifier_for(&device);

        notifier.notify("Rest over", "Next set");
        sleep(Duration::from_secs(14)).await;
        assert!(device.closed.lock().unwrap().is_empty());

        sleep(Duration::from_secs(2)).await;
        assert_eq!(*device.closed.lock().unwrap(), vec![NOTIFICATION_TAG.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacing_notification_keeps_its_own_dismissal() {
        let device = Arc::new(FakeDevice::granted());
        let notifier = notifier_for(&device);

        notifier.notify("First rest over", "Next set");
        sleep(Duration::from_secs(14)).await;
        notifier.notify("Second rest over", "Next set");

        // The first notification's deadline passes while the second is up
        sleep(Duration::from_millis(1_100)).await;
        assert_eq!(device.shown_count(), 2);
        assert!(device.closed.lock().unwrap().is_empty());

        sleep(Duration::from_secs(14)).await;
        assert_eq!(*device.closed.lock().unwrap(), vec![NOTIFICATION_TAG.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skips_notification_without_permission() {
        let device = Arc::new(FakeDevice::default());
        let notifier = notifier_for(&device);

        notifier.notify("Rest over", "Next set");

        assert_eq!(device.vibration_count(), 1);
        assert_eq!(device.shown_count(), 0);
        assert_eq!(device.permission_requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_channels_do_not_block_others() {
        let device = Arc::new(FakeDevice::granted());
        device.fail_haptic.store(true, Ordering::SeqCst);
        device.fail_audio.store(true, Ordering::SeqCst);
        let notifier = notifier_for(&device);

        let tones = notifier.notify("Rest over", "Next set");
        tones.unwrap().await.unwrap();

        assert_eq!(device.tones.load(Ordering::SeqCst), 0);
        assert_eq!(device.shown_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_beeps_disables_sound() {
        let device = Arc::new(FakeDevice::granted());
        let notifier = CompletionNotifier::new(
            device.clone(),
            Some(device.clone()),
            device.clone(),
            NotifierSettings {
                beeps: 0,
                ..NotifierSettings::default()
            },
        );

        assert!(notifier.notify("Rest over", "Next set").is_none());
        assert_eq!(device.shown_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_permission_passes_through() {
        let device = Arc::new(FakeDevice::default());
        let notifier = notifier_for(&device);

        assert_eq!(notifier.permission(), NotificationPermission::Default);
        assert_eq!(notifier.request_permission(), NotificationPermission::Granted);
        assert_eq!(notifier.permission(), NotificationPermission::Granted);
    }
}
