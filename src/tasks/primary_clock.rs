//! Primary countdown clock running on its own task
//!
//! The clock shares no memory with its owner. Commands go in and tick or
//! completion events come out over channels. Every command carries the
//! owner's run epoch and every event echoes the epoch of the latest command,
//! so the owner can discard events that were already in flight when it
//! reconfigured the clock.

use std::time::Duration;

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{interval_at, Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, trace};

const TICK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockCommand {
    Configure { epoch: u64, seconds: u64 },
    Start { epoch: u64 },
    Pause { epoch: u64 },
    Reset { epoch: u64, seconds: u64 },
    Terminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    /// Echo of a configure/reset; carries the new counter value
    Configured { epoch: u64, remaining: u64 },
    /// One second counted down
    Tick { epoch: u64, remaining: u64 },
    /// Counter reached zero while counting
    Completed { epoch: u64 },
}

impl ClockEvent {
    pub fn epoch(&self) -> u64 {
        match *self {
            ClockEvent::Configured { epoch, .. }
            | ClockEvent::Tick { epoch, .. }
            | ClockEvent::Completed { epoch } => epoch,
        }
    }
}

/// Handle to the primary clock task
///
/// Commands are fire-and-forget. A clock that failed to start, or whose task
/// has died, silently drops them; its owner notices by the missing ticks.
#[derive(Debug)]
pub struct PrimaryClock {
    commands: Option<mpsc::UnboundedSender<ClockCommand>>,
    task: Option<JoinHandle<()>>,
}

impl PrimaryClock {
    /// Spawn the clock task, reporting to `events`
    pub fn spawn(events: mpsc::UnboundedSender<ClockEvent>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(primary_clock_task(command_rx, events));

        Self {
            commands: Some(command_tx),
            task: Some(task),
        }
    }

    /// A clock whose execution context could not be created
    pub fn unavailable() -> Self {
        Self {
            commands: None,
            task: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.commands
            .as_ref()
            .map(|commands| !commands.is_closed())
            .unwrap_or(false)
    }

    /// Reset the counter to `seconds` and echo it; a counting clock keeps
    /// counting, restarting its one-second schedule from now
    pub fn configure(&self, epoch: u64, seconds: u64) {
        self.send(ClockCommand::Configure { epoch, seconds });
    }

    pub fn start(&self, epoch: u64) {
        self.send(ClockCommand::Start { epoch });
    }

    pub fn pause(&self, epoch: u64) {
        self.send(ClockCommand::Pause { epoch });
    }

    /// Pause, then configure
    pub fn reset(&self, epoch: u64, seconds: u64) {
        self.send(ClockCommand::Reset { epoch, seconds });
    }

    /// Stop the task; later commands are dropped
    pub fn terminate(&mut self) {
        self.send(ClockCommand::Terminate);
        self.commands = None;
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Primary clock terminated");
        }
    }

    fn send(&self, command: ClockCommand) {
        match &self.commands {
            Some(commands) => {
                if commands.send(command).is_err() {
                    trace!("Primary clock is gone, dropping {:?}", command);
                }
            }
            None => trace!("Primary clock unavailable, dropping {:?}", command),
        }
    }
}

impl Drop for PrimaryClock {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn new_ticker() -> Interval {
    let mut ticker = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker.as_mut() {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Counting loop behind [`PrimaryClock`]
async fn primary_clock_task(
    mut commands: mpsc::UnboundedReceiver<ClockCommand>,
    events: mpsc::UnboundedSender<ClockEvent>,
) {
    let mut remaining: u64 = 0;
    let mut epoch: u64 = 0;
    let mut ticker: Option<Interval> = None;

    loop {
        let event = tokio::select! {
            command = commands.recv() => match command {
                None | Some(ClockCommand::Terminate) => break,
                Some(ClockCommand::Configure { epoch: e, seconds }) => {
                    epoch = e;
                    remaining = seconds;
                    if ticker.is_some() {
                        ticker = (remaining > 0).then(new_ticker);
                    }
                    Some(ClockEvent::Configured { epoch, remaining })
                }
                Some(ClockCommand::Start { epoch: e }) => {
                    epoch = e;
                    if ticker.is_none() && remaining > 0 {
                        ticker = Some(new_ticker());
                    }
                    None
                }
                Some(ClockCommand::Pause { epoch: e }) => {
                    epoch = e;
                    ticker = None;
                    None
                }
                Some(ClockCommand::Reset { epoch: e, seconds }) => {
                    epoch = e;
                    ticker = None;
                    remaining = seconds;
                    Some(ClockEvent::Configured { epoch, remaining })
                }
            },
            _ = next_tick(&mut ticker), if ticker.is_some() => {
                remaining = remaining.saturating_sub(1);
                Some(ClockEvent::Tick { epoch, remaining })
            }
        };

        let Some(event) = event else {
            continue;
        };
        if events.send(event).is_err() {
            break;
        }
        if matches!(event, ClockEvent::Tick { remaining: 0, .. }) {
            ticker = None;
            if events.send(ClockEvent::Completed { epoch }).is_err() {
                break;
            }
        }
    }

    debug!("Primary clock task exiting");
}
