//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::{stream, Stream};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::{
    state::{AppState, NewTimer},
    timer::{TimerEvent, TimerHandle, Visibility},
};
use super::responses::{
    AdjustRequest, ApiResponse, CreateTimerRequest, HealthResponse, PermissionResponse,
    SecondsRequest, TimerListResponse, TimerResponse, VisibilityRequest,
};

fn find_timer(state: &AppState, id: u64) -> Result<TimerHandle, StatusCode> {
    match state.get_timer(id) {
        Ok(Some(handle)) => Ok(handle),
        Ok(None) => {
            warn!("Timer {} not found", id);
            Err(StatusCode::NOT_FOUND)
        }
        Err(e) => {
            error!("Failed to look up timer {}: {}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Respond with the state the timer reached after the command was applied
async fn acknowledge(
    state: &AppState,
    handle: &TimerHandle,
    action: &str,
    message: String,
) -> Result<Json<ApiResponse>, StatusCode> {
    state.record_action(&format!("{} timer {}", action, handle.id()));

    match handle.settled().await {
        Some(snapshot) => Ok(Json(ApiResponse::for_timer(
            message,
            TimerResponse::new(handle.id(), &snapshot),
        ))),
        None => {
            warn!("Timer {} went away while handling {}", handle.id(), action);
            Err(StatusCode::NOT_FOUND)
        }
    }
}

/// Handle POST /timers - Create a countdown instance
pub async fn create_timer_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse>), StatusCode> {
    // An empty body creates a timer with the server defaults
    let request = if body.is_empty() {
        CreateTimerRequest::default()
    } else {
        match serde_json::from_slice::<CreateTimerRequest>(&body) {
            Ok(request) => request,
            Err(e) => {
                warn!("Rejecting malformed timer request: {}", e);
                return Err(StatusCode::BAD_REQUEST);
            }
        }
    };
    if request.seconds == Some(0) {
        warn!("Rejecting timer with zero seconds");
        return Err(StatusCode::BAD_REQUEST);
    }

    let handle = match state.create_timer(NewTimer {
        seconds: request.seconds,
        title: request.title,
        body: request.body,
    }) {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to create timer: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    if request.auto_start {
        handle.start();
    }
    info!("Timer {} created", handle.id());

    let Json(response) =
        acknowledge(&state, &handle, "create", format!("Timer {} created", handle.id())).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Handle GET /timers - List every countdown with server metadata
pub async fn list_timers_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TimerListResponse>, StatusCode> {
    let handles = match state.list_timers() {
        Ok(handles) => handles,
        Err(e) => {
            error!("Failed to list timers: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let (last_action, last_action_time) = state.get_last_action();
    Ok(Json(TimerListResponse {
        timers: handles
            .iter()
            .map(|handle| TimerResponse::new(handle.id(), &handle.snapshot()))
            .collect(),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    }))
}

/// Handle GET /timers/:id - Snapshot of one countdown
pub async fn get_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<TimerResponse>, StatusCode> {
    let handle = find_timer(&state, id)?;
    Ok(Json(TimerResponse::new(id, &handle.snapshot())))
}

/// Handle DELETE /timers/:id - Tear a countdown down
pub async fn delete_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<ApiResponse>, StatusCode> {
    match state.remove_timer(id) {
        Ok(Some(handle)) => {
            info!("Timer {} deleted", id);
            Ok(Json(ApiResponse::removed(
                format!("Timer {} deleted", id),
                TimerResponse::new(id, &handle.snapshot()),
            )))
        }
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!("Failed to delete timer {}: {}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle POST /timers/:id/start
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let handle = find_timer(&state, id)?;
    handle.start();
    acknowledge(&state, &handle, "start", "Timer started".to_string()).await
}

/// Handle POST /timers/:id/pause
pub async fn pause_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let handle = find_timer(&state, id)?;
    handle.pause();
    acknowledge(&state, &handle, "pause", "Timer paused".to_string()).await
}

/// Handle POST /timers/:id/reset
pub async fn reset_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let handle = find_timer(&state, id)?;
    handle.reset();
    acknowledge(&state, &handle, "reset", "Timer reset".to_string()).await
}

/// Handle POST /timers/:id/toggle
pub async fn toggle_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let handle = find_timer(&state, id)?;
    handle.toggle();
    acknowledge(&state, &handle, "toggle", "Timer toggled".to_string()).await
}

/// Handle PUT /timers/:id/seconds - Change remaining time in place
pub async fn set_seconds_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(request): Json<SecondsRequest>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let handle = find_timer(&state, id)?;
    handle.set_seconds(request.seconds);
    acknowledge(
        &state,
        &handle,
        "set seconds on",
        format!("Remaining time set to {}s", request.seconds),
    )
    .await
}

/// Handle POST /timers/:id/preset - Load a quick duration
pub async fn preset_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(request): Json<SecondsRequest>,
) -> Result<Json<ApiResponse>, StatusCode> {
    if request.seconds == 0 {
        return Err(StatusCode::BAD_REQUEST);
    }
    let handle = find_timer(&state, id)?;
    handle.select_preset(request.seconds);
    acknowledge(
        &state,
        &handle,
        "preset",
        format!("Preset {}s selected", request.seconds),
    )
    .await
}

/// Handle POST /timers/:id/adjust - Shift remaining time by a signed delta
pub async fn adjust_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(request): Json<AdjustRequest>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let handle = find_timer(&state, id)?;
    handle.adjust(request.delta);
    acknowledge(
        &state,
        &handle,
        "adjust",
        format!("Remaining time adjusted by {:+}s", request.delta),
    )
    .await
}

/// Handle POST /timers/:id/visibility - Client page visibility changed
pub async fn visibility_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(request): Json<VisibilityRequest>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let handle = find_timer(&state, id)?;
    let visibility = if request.visible {
        Visibility::Visible
    } else {
        Visibility::Hidden
    };
    debug!("Timer {} visibility: {:?}", id, visibility);
    handle.set_visibility(visibility);
    acknowledge(&state, &handle, "visibility", format!("Visibility set to {:?}", visibility))
        .await
}

/// Handle GET /timers/:id/events - Server-sent stream of ticks and completion
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, StatusCode> {
    let handle = find_timer(&state, id)?;
    let events = handle.subscribe();
    debug!("Event stream opened for timer {}", id);

    let stream = stream::unfold(events, move |mut events| async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let name = match event {
                        TimerEvent::Tick { .. } => "tick",
                        TimerEvent::Complete => "complete",
                    };
                    return Some((Event::default().event(name).json_data(event), events));
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Event stream for timer {} skipped {} events", id, skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Handle GET /notifications/permission
pub async fn permission_handler(State(state): State<Arc<AppState>>) -> Json<PermissionResponse> {
    Json(PermissionResponse::new(state.notification_permission()))
}

/// Handle POST /notifications/permission - Ask for permission on a user action
pub async fn request_permission_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PermissionResponse>, StatusCode> {
    let permission = tokio::task::spawn_blocking(move || state.request_notification_permission())
        .await
        .map_err(|e| {
            error!("Permission request failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(PermissionResponse::new(permission)))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
