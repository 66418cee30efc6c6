//! Countdown controller task
//!
//! One controller runs per countdown instance. It owns the [`TimerState`],
//! forwards commands to the primary clock, watches for primary clock silence,
//! runs the fallback clock, and fires the completion alert on the single
//! transition into [`TimerPhase::Completed`].

use std::{pin::Pin, sync::Arc};

use tokio::{
    sync::{broadcast, mpsc, watch},
    task::JoinHandle,
    time::{Instant, Sleep},
};
use tracing::{debug, info, trace, warn};

use crate::{
    notify::WakeLock,
    state::{TimerPhase, TimerState},
    timer::{
        fallback::{Anchor, FallbackClock},
        TimerCommand, TimerEvent, TimerOptions, TimerServices, Visibility,
    },
};

use super::primary_clock::{ClockEvent, PrimaryClock};

pub(crate) struct Countdown {
    id: u64,
    state: TimerState,
    /// Bumped whenever the primary clock is reconfigured; older events are stale
    epoch: u64,
    /// Wall-clock reference of the current run, present only while running
    anchor: Option<Anchor>,
    primary: PrimaryClock,
    primary_alive: bool,
    fallback: FallbackClock,
    /// Deadline by which the primary clock must show progress
    grace: Option<Pin<Box<Sleep>>>,
    hidden: bool,
    wake_lock: WakeLock,
    tones: Option<JoinHandle<()>>,
    options: TimerOptions,
    services: TimerServices,
    events: broadcast::Sender<TimerEvent>,
    state_tx: watch::Sender<TimerState>,
}

impl Countdown {
    pub(crate) fn new(
        id: u64,
        seconds: u64,
        options: TimerOptions,
        services: TimerServices,
        primary: PrimaryClock,
        events: broadcast::Sender<TimerEvent>,
        state_tx: watch::Sender<TimerState>,
    ) -> Self {
        primary.configure(0, seconds);

        Self {
            id,
            state: TimerState::new(seconds),
            epoch: 0,
            anchor: None,
            primary,
            primary_alive: false,
            fallback: FallbackClock::new(),
            grace: None,
            hidden: false,
            wake_lock: WakeLock::new(Arc::clone(&services.wake_lock)),
            tones: None,
            options,
            services,
            events,
            state_tx,
        }
    }

    fn handle_command(&mut self, command: TimerCommand) {
        trace!("Timer {} received {:?}", self.id, command);
        match command {
            TimerCommand::Configure(seconds) => self.configure(seconds),
            TimerCommand::Start => self.start(),
            TimerCommand::Pause => self.pause(),
            TimerCommand::Reset => self.configure(self.state.initial_seconds),
            TimerCommand::SetSeconds(seconds) => self.set_seconds(seconds),
            TimerCommand::Adjust(delta) => self.adjust(delta),
            TimerCommand::Toggle => {
                if self.state.is_running() {
                    self.pause();
                } else {
                    self.start();
                }
            }
            TimerCommand::Visibility(visibility) => self.visibility_changed(visibility),
            TimerCommand::Resync => self.resync(),
            TimerCommand::Snapshot(reply) => {
                let _ = reply.send(self.state.clone());
            }
            // Handled by the task loop
            TimerCommand::Shutdown => {}
        }
    }

    fn configure(&mut self, seconds: u64) {
        if seconds == 0 {
            warn!("Timer {}: ignoring configure to zero seconds", self.id);
            return;
        }

        self.halt();
        self.epoch += 1;
        self.primary.reset(self.epoch, seconds);
        self.state = TimerState::new(seconds);
        info!("Timer {} configured for {}s", self.id, seconds);
        self.emit_tick();
    }

    fn start(&mut self) {
        if self.state.is_running() {
            debug!("Timer {} is already running", self.id);
            return;
        }
        let remaining = self.state.remaining_seconds;
        if remaining == 0 {
            debug!("Timer {} has nothing left to count down", self.id);
            return;
        }

        self.epoch += 1;
        self.state.phase = TimerPhase::Running;
        self.anchor = Some(Anchor::new(self.services.clock.now(), remaining));
        self.primary_alive = false;
        self.primary.configure(self.epoch, remaining);
        self.primary.start(self.epoch);
        self.arm_grace();
        self.wake_lock.acquire();
        info!("Timer {} started with {}s remaining", self.id, remaining);
    }

    fn pause(&mut self) {
        if !self.state.is_running() {
            return;
        }
        let remaining = self.remaining_now();
        if remaining == 0 {
            self.complete();
            return;
        }

        self.halt();
        self.state.phase = TimerPhase::Paused;
        self.set_remaining(remaining);
        info!("Timer {} paused at {}s", self.id, remaining);
    }

    fn set_seconds(&mut self, seconds: u64) {
        if self.state.is_running() && seconds == 0 {
            info!("Timer {} adjusted down to zero", self.id);
            self.complete();
            return;
        }

        self.epoch += 1;
        self.primary.configure(self.epoch, seconds);
        if self.state.is_running() {
            // Drift correction now measures from the adjustment
            self.anchor = Some(Anchor::new(self.services.clock.now(), seconds));
        }
        if self.state.is_completed() {
            self.state.phase = TimerPhase::Idle;
        }
        info!("Timer {} set to {}s", self.id, seconds);
        self.set_remaining(seconds);
    }

    fn adjust(&mut self, delta: i64) {
        let current = self.remaining_now();
        let target = if delta < 0 {
            current.saturating_sub(delta.unsigned_abs())
        } else {
            current.saturating_add(delta as u64)
        };
        self.set_seconds(target);
    }

    fn visibility_changed(&mut self, visibility: Visibility) {
        match visibility {
            Visibility::Hidden => {
                if !self.hidden {
                    debug!("Timer {} hidden", self.id);
                }
                self.hidden = true;
            }
            Visibility::Visible => {
                if std::mem::replace(&mut self.hidden, false) {
                    debug!("Timer {} visible again", self.id);
                    self.resync();
                }
            }
        }
    }

    /// Recompute remaining time from the wall-clock anchor
    fn resync(&mut self) {
        if !self.state.is_running() {
            return;
        }
        let Some(anchor) = self.anchor else {
            return;
        };

        let remaining = anchor.remaining_at(self.services.clock.now());
        info!("Timer {} resynced from wall clock: {}s remaining", self.id, remaining);
        if remaining == 0 {
            self.complete();
            return;
        }

        // Reconfiguring restarts the primary's second boundary, so only do it
        // when wall time actually moved past what the primary reported
        if !self.fallback.is_active() && remaining != self.state.remaining_seconds {
            self.epoch += 1;
            self.primary.configure(self.epoch, remaining);
        }
        self.set_remaining(remaining);
    }

    fn handle_clock_event(&mut self, event: ClockEvent) {
        if event.epoch() != self.epoch {
            trace!("Timer {}: dropping stale {:?}", self.id, event);
            return;
        }

        match event {
            ClockEvent::Configured { .. } => {}
            ClockEvent::Tick { remaining, .. } => {
                if !self.state.is_running() {
                    return;
                }
                if self.fallback.is_active() {
                    self.yield_to_primary();
                    return;
                }
                self.note_primary_progress();
                if remaining == 0 {
                    self.complete();
                } else {
                    self.set_remaining(remaining);
                }
            }
            ClockEvent::Completed { .. } => {
                if !self.state.is_running() {
                    return;
                }
                if self.fallback.is_active() {
                    self.yield_to_primary();
                    return;
                }
                self.note_primary_progress();
                self.complete();
            }
        }
    }

    fn note_primary_progress(&mut self) {
        if !self.primary_alive {
            debug!("Timer {}: primary clock is ticking", self.id);
            self.primary_alive = true;
        }
        self.arm_grace();
    }

    /// Hand control back to a primary clock that has shown signs of life
    ///
    /// The fallback's wall-clock value wins over whatever the primary clock
    /// reported, and the primary clock is resynchronised to it.
    fn yield_to_primary(&mut self) {
        self.fallback.stop();
        self.note_primary_progress();

        let remaining = self.remaining_from_anchor();
        info!(
            "Timer {}: primary clock is back, fallback clock yielding at {}s",
            self.id, remaining
        );
        if remaining == 0 {
            self.complete();
            return;
        }

        self.epoch += 1;
        self.primary.configure(self.epoch, remaining);
        self.primary.start(self.epoch);
        self.set_remaining(remaining);
    }

    fn on_grace_elapsed(&mut self) {
        self.grace = None;
        if !self.state.is_running() || self.fallback.is_active() {
            return;
        }

        warn!(
            "Timer {}: no primary clock progress within {:?}, switching to fallback clock",
            self.id, self.options.grace_window
        );
        self.fallback.activate();
        self.on_fallback_wake();
    }

    fn on_fallback_wake(&mut self) {
        if !self.state.is_running() || self.anchor.is_none() {
            self.fallback.stop();
            return;
        }

        let remaining = self.remaining_from_anchor();
        if remaining == 0 {
            self.complete();
        } else {
            self.set_remaining(remaining);
        }
    }

    /// The one transition into completion; later calls are no-ops
    fn complete(&mut self) {
        if !self.state.is_running() {
            debug!("Timer {}: completion already handled", self.id);
            return;
        }

        self.halt();
        self.state.phase = TimerPhase::Completed;
        self.set_remaining(0);
        info!("Timer {} complete", self.id);
        // No subscribers is fine
        let _ = self.events.send(TimerEvent::Complete);

        if let Some(previous) = self.tones.take() {
            previous.abort();
        }
        self.tones = self.services.notifier.notify(
            &self.options.notification_title,
            &self.options.notification_body,
        );
    }

    /// Stop both clocks and everything scheduled for the current run
    fn halt(&mut self) {
        self.epoch += 1;
        self.primary.pause(self.epoch);
        if self.fallback.stop() {
            debug!("Timer {}: fallback clock stopped", self.id);
        }
        self.grace = None;
        self.anchor = None;
        self.wake_lock.release();
    }

    fn teardown(&mut self) {
        self.primary.terminate();
        self.fallback.stop();
        self.grace = None;
        self.anchor = None;
        self.wake_lock.release();
        if let Some(tones) = self.tones.take() {
            if !tones.is_finished() {
                tones.abort();
                self.services.notifier.silence();
            }
        }
        info!("Timer {} torn down", self.id);
    }

    fn arm_grace(&mut self) {
        let deadline = Instant::now() + self.options.grace_window;
        match self.grace.as_mut() {
            Some(grace) => grace.as_mut().reset(deadline),
            None => self.grace = Some(Box::pin(tokio::time::sleep_until(deadline))),
        }
    }

    /// Remaining time as the authoritative clock sees it right now
    fn remaining_now(&self) -> u64 {
        if self.fallback.is_active() {
            self.remaining_from_anchor()
        } else {
            self.state.remaining_seconds
        }
    }

    fn remaining_from_anchor(&self) -> u64 {
        match self.anchor {
            Some(anchor) => anchor.remaining_at(self.services.clock.now()),
            None => self.state.remaining_seconds,
        }
    }

    fn set_remaining(&mut self, remaining: u64) {
        if self.state.remaining_seconds == remaining {
            return;
        }
        self.state.remaining_seconds = remaining;
        self.emit_tick();
    }

    fn emit_tick(&self) {
        let _ = self.events.send(TimerEvent::Tick {
            remaining_seconds: self.state.remaining_seconds,
        });
    }

    fn publish_state(&self) {
        self.state_tx.send_if_modified(|published| {
            if *published == self.state {
                return false;
            }
            *published = self.state.clone();
            true
        });
    }
}

async fn grace_elapsed(grace: &mut Option<Pin<Box<Sleep>>>) {
    match grace.as_mut() {
        Some(deadline) => deadline.as_mut().await,
        None => std::future::pending::<()>().await,
    }
}

/// Controller loop for one countdown instance
///
/// Exits on an explicit shutdown or once every handle is gone, and tears the
/// instance down on the way out either way.
pub(crate) async fn countdown_task(
    mut countdown: Countdown,
    mut commands: mpsc::UnboundedReceiver<TimerCommand>,
    mut clock_events: mpsc::UnboundedReceiver<ClockEvent>,
) {
    let mut clock_open = true;

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(TimerCommand::Shutdown) | None => break,
                Some(command) => countdown.handle_command(command),
            },
            event = clock_events.recv(), if clock_open => match event {
                Some(event) => countdown.handle_clock_event(event),
                None => {
                    debug!("Timer {}: primary clock stopped reporting", countdown.id);
                    clock_open = false;
                }
            },
            _ = grace_elapsed(&mut countdown.grace), if countdown.grace.is_some() => {
                countdown.on_grace_elapsed();
            }
            _ = countdown.fallback.wake(), if countdown.fallback.is_active() => {
                countdown.on_fallback_wake();
            }
        }
        countdown.publish_state();
    }

    countdown.teardown();
    countdown.publish_state();
}
