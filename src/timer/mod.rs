//! Background countdown timer
//!
//! Each countdown is an independent instance made of a controller task that
//! owns the [`TimerState`], a primary clock on its own task, and a
//! wall-clock anchored fallback clock that takes over if the primary clock
//! stops making progress. Hosts drive an instance through [`TimerHandle`].

pub mod clock;
pub mod fallback;

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{info, warn};

use crate::{
    notify::{CompletionNotifier, WakeLockPort},
    state::TimerState,
    tasks::{
        countdown::{countdown_task, Countdown},
        primary_clock::PrimaryClock,
    },
};
pub use clock::{SystemClock, WallClock};

const EVENT_CAPACITY: usize = 64;

/// Page visibility as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Hidden,
    Visible,
}

/// Commands accepted by a countdown instance
#[derive(Debug)]
pub enum TimerCommand {
    /// Set a new configured duration and go idle
    Configure(u64),
    Start,
    Pause,
    /// Back to idle at the configured duration
    Reset,
    /// Change the remaining time without changing the configured duration
    SetSeconds(u64),
    /// Shift the remaining time by a signed number of seconds
    Adjust(i64),
    Toggle,
    Visibility(Visibility),
    /// Recompute remaining time from the wall clock now
    Resync,
    /// Reply with the state once every earlier command has been applied
    Snapshot(oneshot::Sender<TimerState>),
    Shutdown,
}

/// Events published by a countdown instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimerEvent {
    Tick { remaining_seconds: u64 },
    Complete,
}

/// Per-instance behaviour
#[derive(Debug, Clone)]
pub struct TimerOptions {
    /// How long the primary clock may stay silent after a start before the
    /// fallback clock takes over
    pub grace_window: Duration,
    /// Run the primary clock at all; without it the fallback always takes over
    pub primary_clock: bool,
    pub notification_title: String,
    pub notification_body: String,
}

impl Default for TimerOptions {
    fn default() -> Self {
        Self {
            grace_window: Duration::from_secs(3),
            primary_clock: true,
            notification_title: "Timer Complete".to_string(),
            notification_body: "Your workout timer has finished!".to_string(),
        }
    }
}

/// Process-wide collaborators shared by every instance
#[derive(Clone)]
pub struct TimerServices {
    pub notifier: Arc<CompletionNotifier>,
    pub wake_lock: Arc<dyn WakeLockPort>,
    pub clock: Arc<dyn WallClock>,
}

impl std::fmt::Debug for TimerServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerServices")
            .field("notifier", &self.notifier)
            .field("clock", &self.clock)
            .finish()
    }
}

/// Handle used by the host to drive one countdown instance
///
/// Every command is fire-and-forget; results arrive as [`TimerEvent`]s and
/// snapshot updates. The instance tears itself down on [`shutdown`] or once
/// every handle has been dropped.
///
/// [`shutdown`]: TimerHandle::shutdown
#[derive(Debug)]
pub struct TimerHandle {
    id: u64,
    commands: mpsc::UnboundedSender<TimerCommand>,
    state: watch::Receiver<TimerState>,
    events: broadcast::Receiver<TimerEvent>,
}

impl Clone for TimerHandle {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            commands: self.commands.clone(),
            state: self.state.clone(),
            events: self.events.resubscribe(),
        }
    }
}

impl TimerHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn configure(&self, seconds: u64) {
        self.send(TimerCommand::Configure(seconds));
    }

    pub fn start(&self) {
        self.send(TimerCommand::Start);
    }

    pub fn pause(&self) {
        self.send(TimerCommand::Pause);
    }

    pub fn reset(&self) {
        self.send(TimerCommand::Reset);
    }

    pub fn set_seconds(&self, seconds: u64) {
        self.send(TimerCommand::SetSeconds(seconds));
    }

    pub fn adjust(&self, delta_seconds: i64) {
        self.send(TimerCommand::Adjust(delta_seconds));
    }

    /// Pick a quick duration: stops a running countdown and loads `seconds`
    pub fn select_preset(&self, seconds: u64) {
        self.send(TimerCommand::Pause);
        self.send(TimerCommand::SetSeconds(seconds));
    }

    pub fn toggle(&self) {
        self.send(TimerCommand::Toggle);
    }

    pub fn set_visibility(&self, visibility: Visibility) {
        self.send(TimerCommand::Visibility(visibility));
    }

    pub fn resync(&self) {
        self.send(TimerCommand::Resync);
    }

    /// Tear the instance down; no events follow
    pub fn shutdown(&self) {
        self.send(TimerCommand::Shutdown);
    }

    /// Whether the instance has been torn down
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Latest published state
    pub fn snapshot(&self) -> TimerState {
        self.state.borrow().clone()
    }

    /// State after every command sent so far has been applied
    ///
    /// Returns `None` once the instance has been torn down.
    pub async fn settled(&self) -> Option<TimerState> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands.send(TimerCommand::Snapshot(reply_tx)).ok()?;
        reply_rx.await.ok()
    }

    /// Receive tick and completion events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.events.resubscribe()
    }

    fn send(&self, command: TimerCommand) {
        if let Err(e) = self.commands.send(command) {
            warn!("Timer {} is no longer running, dropping {:?}", self.id, e.0);
        }
    }
}

/// Spawn a countdown instance configured for `seconds`
pub fn spawn_timer(
    id: u64,
    seconds: u64,
    options: TimerOptions,
    services: TimerServices,
) -> Result<TimerHandle, String> {
    if seconds == 0 {
        return Err("Timer duration must be at least one second".to_string());
    }

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (clock_tx, clock_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = broadcast::channel(EVENT_CAPACITY);
    let (state_tx, state_rx) = watch::channel(TimerState::new(seconds));

    let primary = if options.primary_clock {
        PrimaryClock::spawn(clock_tx)
    } else {
        info!("Timer {} running without a primary clock", id);
        PrimaryClock::unavailable()
    };

    let countdown = Countdown::new(id, seconds, options, services, primary, events_tx, state_tx);
    tokio::spawn(countdown_task(countdown, command_rx, clock_rx));

    info!("Timer {} configured for {}s", id, seconds);
    Ok(TimerHandle {
        id,
        commands: command_tx,
        state: state_rx,
        events: events_rx,
    })
}
