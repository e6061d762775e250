//! Main application state: settings, collaborators and the watch session

use std::{
    path::PathBuf,
    sync::{Arc, Mutex, RwLock},
    time::Instant,
};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{info, warn};

use super::{
    alarm::{AlarmController, AlarmPhase, AlarmSounds},
    TimerState,
};
use crate::{
    error::ConfigError,
    services::{AudioSink, ChainSource, SleepInhibitor, StatusBoard},
    settings::Settings,
    tasks::{CountdownEngine, Poller},
    utils::{Clock, StopSignal},
};

/// Everything outside the core that the watcher talks to
pub struct Collaborators {
    pub source: Arc<dyn ChainSource>,
    pub audio: Box<dyn AudioSink>,
    pub inhibitor: Arc<dyn SleepInhibitor>,
    pub clock: Arc<dyn Clock>,
}

/// One running start..stop cycle
struct WatchSession {
    timer: Arc<Mutex<TimerState>>,
    stop_tx: watch::Sender<bool>,
    // Detached on stop; the poller may still be finishing a request
    _tasks: [JoinHandle<()>; 2],
}

/// Result of applying a settings document
#[derive(Debug, Clone)]
pub struct SettingsUpdate {
    pub settings: Settings,
    pub rejected: Vec<ConfigError>,
}

/// Main application state shared by the HTTP handlers and `main`
pub struct AppState {
    settings: Arc<RwLock<Settings>>,
    settings_path: Option<PathBuf>,
    alarm: Arc<Mutex<AlarmController>>,
    board: Arc<StatusBoard>,
    source: Arc<dyn ChainSource>,
    inhibitor: Arc<dyn SleepInhibitor>,
    clock: Arc<dyn Clock>,
    session: Mutex<Option<WatchSession>>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    last_action: Mutex<Option<(String, DateTime<Utc>)>>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        settings_path: Option<PathBuf>,
        collaborators: Collaborators,
        host: String,
        port: u16,
    ) -> Self {
        Self {
            settings: Arc::new(RwLock::new(settings)),
            settings_path,
            alarm: Arc::new(Mutex::new(AlarmController::new(collaborators.audio))),
            board: Arc::new(StatusBoard::new()),
            source: collaborators.source,
            inhibitor: collaborators.inhibitor,
            clock: collaborators.clock,
            session: Mutex::new(None),
            start_time: Instant::now(),
            port,
            host,
            last_action: Mutex::new(None),
        }
    }

    pub fn board(&self) -> &Arc<StatusBoard> {
        &self.board
    }

    /// Start the poller and countdown. Returns `false` if already watching.
    pub fn start_watching(&self) -> Result<bool, String> {
        let mut session = self.session.lock()
            .map_err(|e| format!("Failed to lock watch session: {}", e))?;
        if session.is_some() {
            return Ok(false);
        }

        info!("Starting watch session");
        let timer = Arc::new(Mutex::new(TimerState::new()));
        let (stop_tx, stop) = StopSignal::channel();

        let poller = Poller::new(
            Arc::clone(&timer),
            Arc::clone(&self.settings),
            Arc::clone(&self.source),
            Arc::clone(&self.board),
            Arc::clone(&self.inhibitor),
            Arc::clone(&self.clock),
            stop.clone(),
        );
        let countdown = CountdownEngine::new(
            Arc::clone(&timer),
            Arc::clone(&self.settings),
            Arc::clone(&self.alarm),
            Arc::clone(&self.board),
            Arc::clone(&self.clock),
            stop,
        );

        *session = Some(WatchSession {
            timer,
            stop_tx,
            _tasks: [tokio::spawn(poller.run()), tokio::spawn(countdown.run())],
        });
        drop(session);

        self.record_action("start");
        Ok(true)
    }

    /// Stop watching. Playback is silenced before this returns.
    ///
    /// Returns `false` if nothing was running.
    pub fn stop_watching(&self) -> Result<bool, String> {
        let session = self.session.lock()
            .map_err(|e| format!("Failed to lock watch session: {}", e))?
            .take();
        let Some(session) = session else {
            return Ok(false);
        };

        info!("Stopping watch session");
        session.stop_tx.send_replace(true);

        // The countdown re-checks the stop flag under this lock
        self.alarm.lock()
            .map_err(|e| format!("Failed to lock alarm controller: {}", e))?
            .silence();

        self.inhibitor.set_inhibited(false);
        self.save_settings();
        self.record_action("stop");
        Ok(true)
    }

    pub fn is_watching(&self) -> bool {
        self.session.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Get current settings
    pub fn get_settings(&self) -> Result<Settings, String> {
        self.settings.read()
            .map(|s| s.clone())
            .map_err(|e| format!("Failed to read settings: {}", e))
    }

    /// Apply a flat settings document. Rejected keys keep their old values.
    pub fn apply_settings(&self, doc: &Value) -> Result<SettingsUpdate, String> {
        let Value::Object(map) = doc else {
            return Ok(SettingsUpdate {
                settings: self.get_settings()?,
                rejected: vec![ConfigError::NotAnObject],
            });
        };

        let (updated, rejected) = {
            let mut settings = self.settings.write()
                .map_err(|e| format!("Failed to write settings: {}", e))?;
            let mut candidate = settings.clone();
            let rejected = candidate.apply_patch(map);
            *settings = candidate.clone();
            (candidate, rejected)
        };

        info!("Applied settings ({} rejected)", rejected.len());

        // A new alarm sound takes over immediately if the alarm is looping
        if self.is_watching() {
            if let Ok(mut alarm) = self.alarm.lock() {
                alarm.refresh_sounds(&AlarmSounds::from(&updated));
            }
        }

        self.save_settings();
        self.record_action("settings");
        Ok(SettingsUpdate {
            settings: updated,
            rejected,
        })
    }

    /// Snapshot of the running session's timer state
    pub fn get_timer_state(&self) -> Result<Option<TimerState>, String> {
        let session = self.session.lock()
            .map_err(|e| format!("Failed to lock watch session: {}", e))?;
        let Some(session) = session.as_ref() else {
            return Ok(None);
        };
        let timer = session.timer.lock()
            .map_err(|e| format!("Failed to lock timer state: {}", e))?;
        Ok(Some(timer.clone()))
    }

    pub fn get_alarm_phase(&self) -> Result<AlarmPhase, String> {
        self.alarm.lock()
            .map(|a| a.phase().clone())
            .map_err(|e| format!("Failed to lock alarm controller: {}", e))
    }

    fn save_settings(&self) {
        let Some(path) = &self.settings_path else {
            return;
        };
        match self.get_settings() {
            Ok(settings) => {
                if let Err(e) = settings.save(path) {
                    warn!("Failed to save settings: {:#}", e);
                }
            }
            Err(e) => warn!("{}", e),
        }
    }

    fn record_action(&self, action: &str) {
        if let Ok(mut last) = self.last_action.lock() {
            *last = Some((action.to_string(), Utc::now()));
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        match self.last_action.lock().ok().and_then(|a| a.clone()) {
            Some((action, at)) => (Some(action), Some(at)),
            None => (None, None),
        }
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::{
        state::timer_state::Zone,
        testing::{AudioCommand, ManualClock, RecordingAudio, RecordingInhibitor, ScriptedSource},
    };

    const NOW: i64 = 1_700_000_000;

    struct Fixture {
        state: AppState,
        audio: RecordingAudio,
        inhibitor: Arc<RecordingInhibitor>,
        source: Arc<ScriptedSource>,
    }

    fn fixture(end: i64, settings: Settings) -> Fixture {
        let audio = RecordingAudio::new();
        let inhibitor = RecordingInhibitor::new();
        let source = ScriptedSource::new(vec![ScriptedSource::ok(end, None)]);
        let state = AppState::new(
            settings,
            None,
            Collaborators {
                source: source.clone(),
                audio: Box::new(audio.clone()),
                inhibitor: inhibitor.clone(),
                clock: ManualClock::at(NOW),
            },
            "127.0.0.1".to_string(),
            0,
        );
        Fixture {
            state,
            audio,
            inhibitor,
            source,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stop_while_alarm_plays_silences_once() {
        let f = fixture(NOW + 31, Settings::default());
        assert!(f.state.start_watching().unwrap());
        assert!(!f.state.start_watching().unwrap());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(matches!(f.state.get_alarm_phase().unwrap(), AlarmPhase::AlarmPlaying(_)));

        assert!(f.state.stop_watching().unwrap());
        assert_eq!(f.state.get_alarm_phase().unwrap(), AlarmPhase::Silent);
        assert_eq!(f.audio.stops(), 1);

        // Nothing restarts once stopped
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(f.audio.stops(), 1);
        assert_eq!(f.audio.plays(), 1);
        assert!(!f.state.stop_watching().unwrap());
        assert_eq!(f.inhibitor.levels().last(), Some(&false));
    }

    #[tokio::test(start_paused = true)]
    async fn session_state_is_fresh_each_start() {
        let f = fixture(NOW + 500, Settings::default());
        f.state.start_watching().unwrap();
        // Past the second tick, so the zone reflects the polled end time
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let timer = f.state.get_timer_state().unwrap().unwrap();
        assert_eq!(timer.chain_end_time, Some(NOW + 499));
        assert_eq!(timer.zone, Zone::Normal);

        f.state.stop_watching().unwrap();
        assert!(f.state.get_timer_state().unwrap().is_none());

        f.state.start_watching().unwrap();
        let timer = f.state.get_timer_state().unwrap().unwrap();
        assert_eq!(timer.chain_end_time, None);
        f.state.stop_watching().unwrap();
        assert!(f.source.calls() >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn new_alarm_sound_restarts_playing_alarm() {
        let f = fixture(NOW + 10, Settings::default());
        f.state.start_watching().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let update = f.state
            .apply_settings(&json!({"alarm_sound_choice": "klaxon.wav", "alarm_volume": "loud"}))
            .unwrap();
        assert_eq!(update.rejected.len(), 1);
        assert_eq!(update.settings.alarm_sound_choice, "klaxon.wav");
        assert_eq!(update.settings.alarm_volume, 0.5);

        assert_eq!(
            f.audio.commands().last(),
            Some(&AudioCommand::play("klaxon.wav", 0.5))
        );
        f.state.stop_watching().unwrap();
    }

    #[test]
    fn unreadable_settings_file_survives_the_next_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let raw = r#"{"access_token": "real-key", "api_interval": 5,}"#;
        std::fs::write(&path, raw).unwrap();

        let (settings, errors) = Settings::load(&path);
        assert_eq!(errors.len(), 1);
        let state = AppState::new(
            settings,
            Some(path.clone()),
            Collaborators {
                source: ScriptedSource::new(vec![]),
                audio: Box::new(RecordingAudio::new()),
                inhibitor: RecordingInhibitor::new(),
                clock: ManualClock::at(NOW),
            },
            "127.0.0.1".to_string(),
            0,
        );
        state.apply_settings(&json!({"alarm_volume": 0.8})).unwrap();

        let (saved, errors) = Settings::load(&path);
        assert!(errors.is_empty());
        assert_eq!(saved.alarm_volume, 0.8);
        let backup = std::fs::read_to_string(crate::settings::backup_path(&path)).unwrap();
        assert_eq!(backup, raw);
    }

    #[test]
    fn non_object_settings_are_rejected() {
        let f = fixture(NOW, Settings::default());
        let update = f.state.apply_settings(&json!([1, 2])).unwrap();
        assert_eq!(update.rejected, vec![ConfigError::NotAnObject]);
        assert_eq!(update.settings, Settings::default());
    }
}
