//! Operator settings: thresholds, poll cadence, sounds and toggles
//!
//! Settings are stored as a flat JSON document. Loading and patching are
//! lenient and per key: a bad value is reported and the previous value is
//! kept, so a typo never takes the watcher down.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::{error::ConfigError, state::timer_state::Thresholds};

pub const DEFAULT_ALARM_SOUND: &str = "chainwatch_data/mixkit-classic-alarm-995.wav";
pub const DEFAULT_PRE_ALARM_SOUND: &str =
    "chainwatch_data/mixkit-retro-game-emergency-alarm-1000.wav";

/// Stands in for the access token whenever settings leave the process
pub const REDACTED_TOKEN: &str = "********";

/// What puts the poller into panic mode (fast polling)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanicTrigger {
    /// Only after a failed poll
    Failure,
    /// Only while the countdown is within the alarm threshold
    Proximity,
    /// Either of the above
    Both,
}

impl PanicTrigger {
    fn parse(key: &str, value: &Value) -> Result<Self, ConfigError> {
        match value.as_str() {
            Some("failure") => Ok(Self::Failure),
            Some("proximity") => Ok(Self::Proximity),
            Some("both") => Ok(Self::Both),
            _ => Err(ConfigError::invalid(
                key,
                "expected one of \"failure\", \"proximity\", \"both\"",
            )),
        }
    }
}

/// Operator configured values read by the poller, countdown and alarm
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    /// Seconds between polls in normal mode
    pub api_interval: u64,
    /// Seconds between polls in panic mode
    pub panic_interval: u64,
    pub alarm_threshold_seconds: u64,
    pub pre_alarm_threshold_seconds: u64,
    /// Playback volume, 0.0 to 1.0
    pub alarm_volume: f32,
    pub alarm_sound_choice: String,
    pub pre_alarm_sound_choice: String,
    pub access_token: String,
    pub prevent_sleep: bool,
    /// Window hint for front-ends; the core only stores it
    pub keep_on_top: bool,
    pub backup_timer_enabled: bool,
    pub panic_trigger: PanicTrigger,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_interval: 5,
            panic_interval: 2,
            alarm_threshold_seconds: 60,
            pre_alarm_threshold_seconds: 90,
            alarm_volume: 0.5,
            alarm_sound_choice: DEFAULT_ALARM_SOUND.to_string(),
            pre_alarm_sound_choice: DEFAULT_PRE_ALARM_SOUND.to_string(),
            access_token: String::new(),
            prevent_sleep: false,
            keep_on_top: false,
            backup_timer_enabled: false,
            panic_trigger: PanicTrigger::Both,
        }
    }
}

impl Settings {
    /// Load settings from a flat JSON file.
    ///
    /// A missing file yields the defaults. Keys that fail to parse are
    /// returned as errors alongside the settings that could be applied.
    pub fn load(path: &Path) -> (Self, Vec<ConfigError>) {
        let mut settings = Self::default();

        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No settings file at {}, using defaults", path.display());
                return (settings, Vec::new());
            }
            Err(e) => return (settings, vec![ConfigError::Io(e.to_string())]),
        };

        let errors = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(doc)) => settings.apply_patch(&doc),
            Ok(_) => {
                backup_unusable(path, &raw);
                vec![ConfigError::NotAnObject]
            }
            Err(e) => {
                backup_unusable(path, &raw);
                vec![ConfigError::Io(format!("{}: {}", path.display(), e))]
            }
        };

        debug!("Loaded settings from {}", path.display());
        (settings, errors)
    }

    /// Write the settings as a flat JSON document, creating parent dirs.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let body = serde_json::to_string_pretty(self)?;
        fs::write(path, body).with_context(|| format!("writing {}", path.display()))?;
        debug!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Merge a flat document into these settings key by key.
    ///
    /// Valid keys are applied; every rejected key leaves its current value in
    /// place and produces one error.
    pub fn apply_patch(&mut self, doc: &Map<String, Value>) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        for (key, value) in doc {
            let applied = match key.as_str() {
                "api_interval" => positive_seconds(key, value).map(|v| self.api_interval = v),
                "panic_interval" => positive_seconds(key, value).map(|v| self.panic_interval = v),
                "alarm_threshold_seconds" | "alarm_trigger_seconds" => {
                    seconds(key, value).map(|v| self.alarm_threshold_seconds = v)
                }
                "pre_alarm_threshold_seconds" | "pre_alarm_trigger_seconds" => {
                    seconds(key, value).map(|v| self.pre_alarm_threshold_seconds = v)
                }
                "alarm_volume" => volume(key, value).map(|v| self.alarm_volume = v),
                "alarm_sound_choice" => text(key, value).map(|v| self.alarm_sound_choice = v),
                "pre_alarm_sound_choice" => {
                    text(key, value).map(|v| self.pre_alarm_sound_choice = v)
                }
                // A redacted token echoed back by a client keeps the real one
                "access_token" | "api_key" if value.as_str() == Some(REDACTED_TOKEN) => Ok(()),
                "access_token" | "api_key" => text(key, value).map(|v| self.access_token = v),
                "prevent_sleep" => flag(key, value).map(|v| self.prevent_sleep = v),
                "keep_on_top" => flag(key, value).map(|v| self.keep_on_top = v),
                "backup_timer_enabled" => flag(key, value).map(|v| self.backup_timer_enabled = v),
                "panic_trigger" => PanicTrigger::parse(key, value).map(|v| self.panic_trigger = v),
                _ => Err(ConfigError::UnknownKey(key.clone())),
            };

            if let Err(e) = applied {
                warn!("Rejected setting: {}", e);
                errors.push(e);
            }
        }

        if self.alarm_threshold_seconds >= self.pre_alarm_threshold_seconds {
            warn!(
                "Alarm threshold ({}s) is not below the pre-alarm threshold ({}s); \
                 ALARM takes precedence",
                self.alarm_threshold_seconds, self.pre_alarm_threshold_seconds
            );
        }

        errors
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            alarm: self.alarm_threshold_seconds,
            pre_alarm: self.pre_alarm_threshold_seconds,
        }
    }

    /// Whether the poller should be in panic mode
    pub fn panic_mode(&self, poll_failing: bool, near_alarm: bool) -> bool {
        match self.panic_trigger {
            PanicTrigger::Failure => poll_failing,
            PanicTrigger::Proximity => near_alarm,
            PanicTrigger::Both => poll_failing || near_alarm,
        }
    }

    /// Pick the next poll interval.
    ///
    /// `panic_interval` is expected to be no larger than `api_interval`;
    /// that is left to the operator.
    pub fn poll_interval(&self, poll_failing: bool, near_alarm: bool) -> Duration {
        let secs = if self.panic_mode(poll_failing, near_alarm) {
            self.panic_interval
        } else {
            self.api_interval
        };
        Duration::from_secs(secs)
    }

    /// Copy suitable for showing to clients
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.access_token.is_empty() {
            copy.access_token = REDACTED_TOKEN.to_string();
        }
        copy
    }
}

/// Where an unusable settings file is kept before defaults replace it
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

fn backup_unusable(path: &Path, raw: &str) {
    let backup = backup_path(path);
    match fs::write(&backup, raw) {
        Ok(()) => warn!(
            "Settings file {} is unusable; kept a copy at {}",
            path.display(),
            backup.display()
        ),
        Err(e) => warn!("Failed to back up {}: {}", path.display(), e),
    }
}

fn seconds(key: &str, value: &Value) -> Result<u64, ConfigError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        ConfigError::invalid(key, format!("expected a whole number of seconds, got {}", value))
    })
}

fn positive_seconds(key: &str, value: &Value) -> Result<u64, ConfigError> {
    match seconds(key, value)? {
        0 => Err(ConfigError::invalid(key, "interval must be at least 1 second")),
        secs => Ok(secs),
    }
}

fn volume(key: &str, value: &Value) -> Result<f32, ConfigError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if (0.0..=1.0).contains(&v) => Ok(v as f32),
        Some(v) => Err(ConfigError::invalid(key, format!("{} is outside 0.0-1.0", v))),
        None => Err(ConfigError::invalid(key, format!("expected a number, got {}", value))),
    }
}

fn text(key: &str, value: &Value) -> Result<String, ConfigError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ConfigError::invalid(key, "expected a string"))
}

fn flag(key: &str, value: &Value) -> Result<bool, ConfigError> {
    value
        .as_bool()
        .ok_or_else(|| ConfigError::invalid(key, "expected true or false"))
}
