//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use serde_json::Value;
use tracing::{error, info};

use crate::state::AppState;
use super::responses::{
    ApiResponse, HealthResponse, RejectedSetting, SettingsResponse, StatusResponse,
};

/// Handle POST /start - Begin watching the chain
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse>, StatusCode> {
    match state.start_watching() {
        Ok(true) => {
            info!("Start endpoint called - watch session started");
            Ok(Json(ApiResponse::changed("Watching started".to_string(), true)))
        }
        Ok(false) => Ok(Json(ApiResponse::unchanged("Already watching".to_string(), true))),
        Err(e) => {
            error!("Failed to start watching: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle POST /stop - Stop watching and silence alarms
pub async fn stop_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse>, StatusCode> {
    match state.stop_watching() {
        Ok(true) => {
            info!("Stop endpoint called - watch session stopped");
            Ok(Json(ApiResponse::changed("Watching stopped".to_string(), false)))
        }
        Ok(false) => Ok(Json(ApiResponse::unchanged("Not watching".to_string(), false))),
        Err(e) => {
            error!("Failed to stop watching: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle GET /status - Return the countdown and alarm state
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, StatusCode> {
    let timer_state = match state.get_timer_state() {
        Ok(t) => t,
        Err(e) => {
            error!("Failed to get timer state: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let alarm = match state.get_alarm_phase() {
        Ok(a) => a,
        Err(e) => {
            error!("Failed to get alarm state: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let board = state.board();
    let (last_action, last_action_time) = state.get_last_action();
    let timer = timer_state.unwrap_or_default();

    Ok(Json(StatusResponse {
        watching: state.is_watching(),
        display: board.latest(),
        chain_end_time: timer.chain_end_time,
        last_successful_poll: timer.last_success,
        poll_failing: timer.poll_failing,
        alarm,
        failure_flashes: board.flash_count(),
        last_failure: board.last_flash(),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    }))
}

/// Handle GET /settings - Current settings with the token redacted
pub async fn get_settings_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SettingsResponse>, StatusCode> {
    match state.get_settings() {
        Ok(settings) => Ok(Json(SettingsResponse {
            settings: settings.redacted(),
            rejected: Vec::new(),
        })),
        Err(e) => {
            error!("Failed to read settings: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle PUT /settings - Apply a partial flat settings document
pub async fn put_settings_handler(
    State(state): State<Arc<AppState>>,
    Json(doc): Json<Value>,
) -> Result<Json<SettingsResponse>, StatusCode> {
    match state.apply_settings(&doc) {
        Ok(update) => Ok(Json(SettingsResponse {
            settings: update.settings.redacted(),
            rejected: update.rejected
                .iter()
                .map(|e| RejectedSetting { error: e.to_string() })
                .collect(),
        })),
        Err(e) => {
            error!("Failed to apply settings: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
