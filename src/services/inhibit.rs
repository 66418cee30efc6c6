//! Keeping the host awake while a countdown runs

use std::sync::Mutex;

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::notify::WakeLockPort;

/// Holds an idle/sleep inhibitor process while at least one timer needs it
///
/// Timers share a single inhibitor: the process starts with the first
/// acquisition and is killed once the last holder releases it.
#[derive(Debug)]
pub struct Inhibitor {
    program: String,
    args: Vec<String>,
    holders: Mutex<Holders>,
}

#[derive(Debug, Default)]
struct Holders {
    count: usize,
    child: Option<Child>,
}

impl Inhibitor {
    /// `systemd-inhibit` blocking idle and sleep until released
    pub fn systemd() -> Self {
        Self::with_command(
            "systemd-inhibit",
            &[
                "--what=idle:sleep",
                "--who=rest-timer",
                "--why=Rest timer running",
                "--mode=block",
                "sleep",
                "infinity",
            ],
        )
    }

    pub fn with_command(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
            holders: Mutex::new(Holders::default()),
        }
    }

    pub fn holders(&self) -> usize {
        self.holders.lock().map(|holders| holders.count).unwrap_or(0)
    }
}

impl WakeLockPort for Inhibitor {
    fn acquire(&self) -> Result<(), String> {
        let mut holders = self
            .holders
            .lock()
            .map_err(|e| format!("Failed to lock inhibitor: {}", e))?;

        // The inhibitor may have exited on its own, e.g. without logind
        if let Some(child) = holders.child.as_mut() {
            match child.try_wait() {
                Ok(None) => {}
                Ok(Some(status)) => {
                    warn!("Sleep inhibitor exited unexpectedly ({}), restarting", status);
                    holders.child = None;
                }
                Err(e) => {
                    warn!("Failed to check sleep inhibitor, restarting: {}", e);
                    holders.child = None;
                }
            }
        }

        if holders.child.is_none() {
            let child = Command::new(&self.program)
                .args(&self.args)
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| format!("Failed to start {}: {}", self.program, e))?;
            info!("Sleep inhibitor started ({})", self.program);
            holders.child = Some(child);
        }
        holders.count += 1;
        debug!("Sleep inhibitor holders: {}", holders.count);
        Ok(())
    }

    fn release(&self) -> Result<(), String> {
        let mut holders = self
            .holders
            .lock()
            .map_err(|e| format!("Failed to lock inhibitor: {}", e))?;

        holders.count = holders.count.saturating_sub(1);
        if holders.count > 0 {
            debug!("Sleep inhibitor holders: {}", holders.count);
            return Ok(());
        }

        if let Some(mut child) = holders.child.take() {
            if let Err(e) = child.start_kill() {
                warn!("Failed to stop sleep inhibitor: {}", e);
            }
            info!("Sleep inhibitor stopped");
        }
        Ok(())
    }
}
