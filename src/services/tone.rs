//! Audible completion tones

use std::{
    io::{IsTerminal, Write},
    process::Stdio,
    sync::Mutex,
};
use tokio::process::{Child, Command};
use tracing::debug;

use crate::notify::AudioPort;

use super::system::find_on_path;

/// Rings the terminal bell on stderr
#[derive(Debug, Default)]
pub struct TerminalBell;

impl AudioPort for TerminalBell {
    fn prime(&self) -> Result<(), String> {
        if std::io::stderr().is_terminal() {
            Ok(())
        } else {
            Err("stderr is not a terminal, the bell will not be heard".to_string())
        }
    }

    fn play_tone(&self) -> Result<(), String> {
        let mut stderr = std::io::stderr().lock();
        stderr
            .write_all(b"\x07")
            .and_then(|_| stderr.flush())
            .map_err(|e| format!("Failed to ring terminal bell: {}", e))
    }

    fn stop(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Plays each tone by running an external command, e.g. `paplay beep.oga`
#[derive(Debug)]
pub struct ToneCommand {
    program: String,
    args: Vec<String>,
    playing: Mutex<Option<Child>>,
}

impl ToneCommand {
    /// Parse a shell-style command line
    pub fn parse(raw: &str) -> Result<Self, String> {
        let parts = shell_words::split(raw.trim())
            .map_err(|e| format!("Invalid tone command '{}': {}", raw, e))?;
        let (program, args) = parts
            .split_first()
            .ok_or_else(|| "Tone command is empty".to_string())?;

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            playing: Mutex::new(None),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl AudioPort for ToneCommand {
    fn prime(&self) -> Result<(), String> {
        let path = find_on_path(&self.program)?;
        debug!("Tone command resolved to {}", path.display());
        Ok(())
    }

    fn play_tone(&self) -> Result<(), String> {
        self.stop()?;

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("Failed to run tone command {}: {}", self.program, e))?;

        let mut playing = self
            .playing
            .lock()
            .map_err(|e| format!("Failed to lock tone player: {}", e))?;
        *playing = Some(child);
        Ok(())
    }

    fn stop(&self) -> Result<(), String> {
        let mut playing = self
            .playing
            .lock()
            .map_err(|e| format!("Failed to lock tone player: {}", e))?;

        if let Some(mut child) = playing.take() {
            if let Ok(None) = child.try_wait() {
                child
                    .start_kill()
                    .map_err(|e| format!("Failed to stop tone command: {}", e))?;
            }
            tokio::spawn(async move {
                if let Err(e) = child.wait().await {
                    debug!("Failed to reap tone command: {}", e);
                }
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_like_a_shell() {
        let tone = ToneCommand::parse("paplay '/usr/share/sounds/my beep.oga'").unwrap();
        assert_eq!(tone.program(), "paplay");
        assert_eq!(tone.args, vec!["/usr/share/sounds/my beep.oga".to_string()]);
    }

    #[test]
    fn test_parse_rejects_empty_and_unbalanced() {
        assert!(ToneCommand::parse("   ").is_err());
        assert!(ToneCommand::parse("paplay 'unterminated").is_err());
    }

    #[tokio::test]
    async fn test_prime_fails_for_missing_program() {
        let tone = ToneCommand::parse("rest-timer-no-such-player beep.oga").unwrap();
        assert!(tone.prime().is_err());
        assert!(tone.play_tone().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_cuts_a_tone_short() {
        let tone = ToneCommand::parse("sleep 30").unwrap();
        tone.prime().unwrap();
        tone.play_tone().unwrap();
        assert!(tone.playing.lock().unwrap().is_some());

        tone.stop().unwrap();
        assert!(tone.playing.lock().unwrap().is_none());
        tone.stop().unwrap();
    }
}
