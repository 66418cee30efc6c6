//! Configuration and CLI argument handling

use std::time::Duration;
use clap::Parser;

use crate::{notify::NotifierSettings, timer::TimerOptions};

/// CLI argument parsing structure
#[derive(Debug, Parser)]
#[command(name = "rest-timer")]
#[command(about = "Background rest timer server with drift-corrected countdowns")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Default countdown duration in seconds
    #[arg(short, long, default_value = "90", value_parser = clap::value_parser!(u64).range(1..))]
    pub rest_seconds: u64,

    /// Seconds the primary clock may stay silent before the fallback takes over
    #[arg(long, default_value = "3", value_parser = clap::value_parser!(u64).range(2..=60))]
    pub grace_window: u64,

    /// Number of completion beeps (0 disables sound)
    #[arg(long, default_value = "3")]
    pub beeps: u32,

    /// Completion notification title
    #[arg(long, default_value = "Timer Complete")]
    pub title: String,

    /// Completion notification body
    #[arg(long, default_value = "Your workout timer has finished!")]
    pub body: String,

    /// Command run for each beep instead of the terminal bell
    #[arg(long)]
    pub tone_command: Option<String>,

    /// Run countdowns on the fallback clock only
    #[arg(long)]
    pub no_worker: bool,

    /// Do not inhibit sleep while a countdown runs
    #[arg(long)]
    pub no_wake_lock: bool,

    /// Never show desktop notifications
    #[arg(long)]
    pub no_notifications: bool,

    /// Seconds between checks for a resume from suspension
    #[arg(long, default_value = "15", value_parser = clap::value_parser!(u64).range(1..))]
    pub resume_check: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Defaults for every countdown instance
    pub fn timer_options(&self) -> TimerOptions {
        TimerOptions {
            grace_window: Duration::from_secs(self.grace_window),
            primary_clock: !self.no_worker,
            notification_title: self.title.clone(),
            notification_body: self.body.clone(),
        }
    }

    pub fn notifier_settings(&self) -> NotifierSettings {
        NotifierSettings {
            beeps: self.beeps,
            ..NotifierSettings::default()
        }
    }

    pub fn resume_check_period(&self) -> Duration {
        Duration::from_secs(self.resume_check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["rest-timer"]).unwrap();

        assert_eq!(config.address(), "0.0.0.0:20554");
        assert_eq!(config.rest_seconds, 90);
        assert_eq!(config.log_level(), "info");
        assert_eq!(config.notifier_settings().beeps, 3);
        assert_eq!(config.resume_check_period(), Duration::from_secs(15));

        let options = config.timer_options();
        assert_eq!(options.grace_window, Duration::from_secs(3));
        assert!(options.primary_clock);
        assert_eq!(options.notification_title, "Timer Complete");
        assert_eq!(options.notification_body, "Your workout timer has finished!");
    }

    #[test]
    fn test_overrides() {
        let config = Config::try_parse_from([
            "rest-timer",
            "--port",
            "8080",
            "--rest-seconds",
            "120",
            "--grace-window",
            "5",
            "--no-worker",
            "--tone-command",
            "paplay beep.oga",
            "-v",
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.rest_seconds, 120);
        assert_eq!(config.tone_command.as_deref(), Some("paplay beep.oga"));
        assert_eq!(config.log_level(), "debug");

        let options = config.timer_options();
        assert_eq!(options.grace_window, Duration::from_secs(5));
        assert!(!options.primary_clock);
    }

    #[test]
    fn test_rejects_unusable_values() {
        assert!(Config::try_parse_from(["rest-timer", "--rest-seconds", "0"]).is_err());
        assert!(Config::try_parse_from(["rest-timer", "--grace-window", "1"]).is_err());
        assert!(Config::try_parse_from(["rest-timer", "--resume-check", "0"]).is_err());
    }
}
