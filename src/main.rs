//! Rest Timer - A background countdown server for workout rest periods
//!
//! This is the main entry point for the rest-timer application.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use rest_timer::{
    api::create_router,
    config::Config,
    notify::{AudioPort, CompletionNotifier, NotificationPort, Unsupported, WakeLockPort},
    services::{check_program_available, DesktopNotifications, Inhibitor, TerminalBell, ToneCommand},
    state::AppState,
    tasks::resume_watch_task,
    timer::{SystemClock, TimerServices},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("rest_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting rest-timer server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, rest={}s, grace={}s",
        config.host, config.port, config.rest_seconds, config.grace_window
    );

    let audio: Option<Arc<dyn AudioPort>> = if config.beeps == 0 {
        None
    } else {
        match &config.tone_command {
            Some(raw) => Some(Arc::new(ToneCommand::parse(raw).map_err(anyhow::Error::msg)?)),
            None => Some(Arc::new(TerminalBell)),
        }
    };

    let notifications: Arc<dyn NotificationPort> = if config.no_notifications {
        Arc::new(Unsupported)
    } else {
        Arc::new(DesktopNotifications::new("rest-timer"))
    };

    // Sleep inhibition needs systemd; without it countdowns still run
    let wake_lock: Arc<dyn WakeLockPort> = if config.no_wake_lock {
        Arc::new(Unsupported)
    } else {
        match check_program_available("systemd-inhibit").await {
            Ok(()) => Arc::new(Inhibitor::systemd()),
            Err(e) => {
                warn!("{}, timers will not keep the host awake", e);
                Arc::new(Unsupported)
            }
        }
    };

    let notifier = CompletionNotifier::new(
        Arc::new(Unsupported),
        audio,
        notifications,
        config.notifier_settings(),
    );
    let services = TimerServices {
        notifier: Arc::new(notifier),
        wake_lock,
        clock: Arc::new(SystemClock),
    };

    // Create application state
    let state = Arc::new(AppState::new(
        config.port,
        config.host.clone(),
        config.rest_seconds,
        config.timer_options(),
        services,
    ));

    // Start the resume watch background task
    tokio::spawn(resume_watch_task(Arc::clone(&state), config.resume_check_period()));

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST   /timers                   - Create a timer");
    info!("  GET    /timers                   - List timers");
    info!("  GET    /timers/:id               - Timer snapshot");
    info!("  DELETE /timers/:id               - Remove a timer");
    info!("  POST   /timers/:id/start|pause|reset|toggle");
    info!("  PUT    /timers/:id/seconds       - Set remaining time");
    info!("  POST   /timers/:id/preset        - Load a quick duration");
    info!("  POST   /timers/:id/adjust        - Shift remaining time");
    info!("  POST   /timers/:id/visibility    - Client visibility change");
    info!("  GET    /timers/:id/events        - Tick/complete event stream");
    info!("  GET    /notifications/permission - Notification permission");
    info!("  POST   /notifications/permission - Request notification permission");
    info!("  GET    /health                   - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    if let Err(e) = state.shutdown_all() {
        warn!("Failed to shut timers down cleanly: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}
