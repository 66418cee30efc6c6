//! API request and response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    notify::NotificationPermission,
    state::{TimerPhase, TimerState, QUICK_PRESETS},
};

/// Body of `POST /timers`; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTimerRequest {
    pub seconds: Option<u64>,
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(default)]
    pub auto_start: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecondsRequest {
    pub seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdjustRequest {
    pub delta: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisibilityRequest {
    pub visible: bool,
}

/// One quick-duration button
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetResponse {
    pub seconds: u64,
    pub label: String,
    /// Matches the timer's configured duration
    pub selected: bool,
}

/// Snapshot of one countdown instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerResponse {
    pub id: u64,
    pub remaining_seconds: u64,
    pub initial_seconds: u64,
    pub phase: TimerPhase,
    pub is_running: bool,
    pub is_completed: bool,
    pub display: String,
    pub progress_percent: f64,
    pub presets: Vec<PresetResponse>,
}

impl TimerResponse {
    pub fn new(id: u64, state: &TimerState) -> Self {
        let presets = QUICK_PRESETS
            .iter()
            .map(|&seconds| PresetResponse {
                seconds,
                label: format!("{}s", seconds),
                selected: state.is_preset_selected(seconds),
            })
            .collect();

        Self {
            id,
            remaining_seconds: state.remaining_seconds,
            initial_seconds: state.initial_seconds,
            phase: state.phase(),
            is_running: state.is_running(),
            is_completed: state.is_completed(),
            display: state.display(),
            progress_percent: state.progress_percent(),
            presets,
        }
    }
}

/// API response structure for command endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub timer: TimerResponse,
}

impl ApiResponse {
    pub fn new(status: String, message: String, timer: TimerResponse) -> Self {
        Self {
            status,
            message,
            timestamp: Utc::now(),
            timer,
        }
    }

    /// Status follows the timer's phase
    pub fn for_timer(message: String, timer: TimerResponse) -> Self {
        let status = if timer.is_running {
            "running"
        } else if timer.is_completed {
            "completed"
        } else {
            "stopped"
        };
        Self::new(status.to_string(), message, timer)
    }

    pub fn removed(message: String, timer: TimerResponse) -> Self {
        Self::new("removed".to_string(), message, timer)
    }
}

/// Every live timer plus server metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerListResponse {
    pub timers: Vec<TimerResponse>,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionResponse {
    pub permission: NotificationPermission,
    pub timestamp: DateTime<Utc>,
}

impl PermissionResponse {
    pub fn new(permission: NotificationPermission) -> Self {
        Self {
            permission,
            timestamp: Utc::now(),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
