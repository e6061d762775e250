//! API response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    services::{DisplayUpdate, FailureFlash},
    settings::Settings,
    state::AlarmPhase,
};

/// Response for start/stop requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub watching: bool,
}

impl ApiResponse {
    /// Create a new API response
    pub fn new(status: &str, message: String, watching: bool) -> Self {
        Self {
            status: status.to_string(),
            message,
            timestamp: Utc::now(),
            watching,
        }
    }

    /// The request changed the watch session
    pub fn changed(message: String, watching: bool) -> Self {
        Self::new("changed", message, watching)
    }

    /// The session was already in the requested state
    pub fn unchanged(message: String, watching: bool) -> Self {
        Self::new("unchanged", message, watching)
    }
}

/// Full watcher status
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub watching: bool,
    pub display: DisplayUpdate,
    pub chain_end_time: Option<i64>,
    pub last_successful_poll: Option<i64>,
    pub poll_failing: bool,
    pub alarm: AlarmPhase,
    pub failure_flashes: u64,
    pub last_failure: Option<FailureFlash>,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// A rejected settings key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedSetting {
    pub error: String,
}

/// Settings after an update; the access token is redacted
#[derive(Debug, Clone, Serialize)]
pub struct SettingsResponse {
    pub settings: Settings,
    pub rejected: Vec<RejectedSetting>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
