//! Error types shared by the poller and the settings layer

use thiserror::Error;

/// Reasons a single chain poll can fail.
///
/// Every variant collapses into the same transient `poll_failing` state;
/// none of them stops the poll loop.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PollError {
    /// Connection refused, DNS failure, timeout
    #[error("network error: {0}")]
    Network(String),

    /// The endpoint answered with a non-success status
    #[error("unexpected HTTP status {0}")]
    Protocol(u16),

    /// The body was not the chain payload we expect
    #[error("malformed chain payload: {0}")]
    Data(String),
}

/// Problems with operator settings.
///
/// These are reported back to whoever supplied the value; the watcher keeps
/// running on the last known good settings.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("unknown setting '{0}'")]
    UnknownKey(String),

    #[error("settings document must be a flat JSON object")]
    NotAnObject,

    #[error("failed to read settings: {0}")]
    Io(String),
}

impl ConfigError {
    pub fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
