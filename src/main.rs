//! Chain Watch - countdown and alarm watcher for a remote chain timer
//!
//! This is the main entry point for the chain-watch application.

use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing::{info, warn};

use chain_watch::{
    api::create_router,
    config::Config,
    services::{check_systemd_inhibit_available, CommandAudioSink, SystemdInhibitor, TornApiClient},
    settings::Settings,
    state::{AppState, Collaborators},
    tasks::console_display_task,
    utils::{shutdown_signal, SystemClock},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("chain_watch={},tower_http=info", config.log_level()))
        .init();

    info!("Starting chain-watch v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}, settings={}",
          config.host, config.port, config.settings.display());

    let (settings, problems) = Settings::load(&config.settings);
    for problem in &problems {
        warn!("Settings: {}", problem);
    }
    if settings.access_token.is_empty() {
        warn!("No access token configured; polls will fail until one is set via PUT /settings");
    }

    // Sleep inhibition is optional; keep running without it
    if let Err(e) = check_systemd_inhibit_available().await {
        warn!("{}", e);
    }

    let collaborators = Collaborators {
        source: Arc::new(TornApiClient::new(
            config.api_base.clone(),
            Duration::from_secs(config.request_timeout),
        )?),
        audio: Box::new(CommandAudioSink::new(config.player.clone())),
        inhibitor: Arc::new(SystemdInhibitor::new()),
        clock: Arc::new(SystemClock),
    };

    let state = Arc::new(AppState::new(
        settings,
        Some(config.settings.clone()),
        collaborators,
        config.host.clone(),
        config.port,
    ));

    if config.console {
        let board = state.board();
        tokio::spawn(console_display_task(board.subscribe(), board.subscribe_flashes()));
    }

    if config.start {
        if let Err(e) = state.start_watching() {
            tracing::error!("Failed to start watching: {}", e);
        }
    }

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /start    - Start watching the chain");
    info!("  POST /stop     - Stop watching and silence alarms");
    info!("  GET  /status   - Countdown, zone and alarm state");
    info!("  GET  /settings - Current settings");
    info!("  PUT  /settings - Apply new settings");
    info!("  GET  /health   - Health check");

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

    if let Err(e) = state.stop_watching() {
        warn!("Failed to stop watching cleanly: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}
