//! Alarm playback state machine
//!
//! ```text
//!            ALARM                      NORMAL / stop
//!  Silent ───────────► AlarmPlaying ─────────────────► Silent
//!    │                     ▲
//!    │ PRE_ALARM           │ ALARM
//!    ▼                     │
//!  PreAlarmPlaying ────────┘
//!    │
//!    └──── NORMAL / stop ──► Silent
//! ```
//!
//! The controller is the only code that touches the audio sink. It reacts
//! to zone transitions and never restarts a loop that is already playing.

use serde::Serialize;
use tracing::info;

use super::timer_state::Zone;
use crate::{
    services::audio::{AudioSink, PlayRequest},
    settings::Settings,
};

/// What the audio device is currently doing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "sound", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmPhase {
    Silent,
    PreAlarmPlaying(String),
    AlarmPlaying(String),
}

/// Sound choices and volume the controller plays with
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmSounds {
    pub alarm: String,
    pub pre_alarm: String,
    pub volume: f32,
}

impl From<&Settings> for AlarmSounds {
    fn from(settings: &Settings) -> Self {
        Self {
            alarm: settings.alarm_sound_choice.clone(),
            pre_alarm: settings.pre_alarm_sound_choice.clone(),
            volume: settings.alarm_volume,
        }
    }
}

pub struct AlarmController {
    sink: Box<dyn AudioSink>,
    phase: AlarmPhase,
}

impl AlarmController {
    pub fn new(sink: Box<dyn AudioSink>) -> Self {
        Self {
            sink,
            phase: AlarmPhase::Silent,
        }
    }

    pub fn phase(&self) -> &AlarmPhase {
        &self.phase
    }

    /// React to the countdown entering `zone`
    pub fn on_zone(&mut self, zone: Zone, sounds: &AlarmSounds) {
        match zone {
            Zone::Alarm => self.enter_alarm(sounds),
            Zone::PreAlarm => self.enter_pre_alarm(sounds),
            Zone::Normal => self.silence(),
        }
    }

    /// Restart the alarm loop if its sound choice changed while it plays.
    ///
    /// A playing pre-alarm keeps going; the new choice is used next time.
    pub fn refresh_sounds(&mut self, sounds: &AlarmSounds) {
        if matches!(self.phase, AlarmPhase::AlarmPlaying(_)) {
            self.enter_alarm(sounds);
        }
    }

    /// Stop all playback regardless of zone
    pub fn silence(&mut self) {
        if self.phase != AlarmPhase::Silent {
            info!("Stopping alarm playback");
            self.sink.stop();
            self.phase = AlarmPhase::Silent;
        }
    }

    fn enter_alarm(&mut self, sounds: &AlarmSounds) {
        if let AlarmPhase::AlarmPlaying(current) = &self.phase {
            if *current == sounds.alarm {
                return;
            }
        }

        // Single voice: whatever is playing goes first
        if self.phase != AlarmPhase::Silent {
            self.sink.stop();
        }
        info!("Starting alarm loop: {}", sounds.alarm);
        self.sink.play(PlayRequest {
            sound: sounds.alarm.clone(),
            volume: sounds.volume,
            looped: true,
        });
        self.phase = AlarmPhase::AlarmPlaying(sounds.alarm.clone());
    }

    fn enter_pre_alarm(&mut self, sounds: &AlarmSounds) {
        // Pre-alarm never interrupts anything, the alarm included
        if self.phase != AlarmPhase::Silent {
            return;
        }
        info!("Starting pre-alarm loop: {}", sounds.pre_alarm);
        self.sink.play(PlayRequest {
            sound: sounds.pre_alarm.clone(),
            volume: sounds.volume,
            looped: true,
        });
        self.phase = AlarmPhase::PreAlarmPlaying(sounds.pre_alarm.clone());
    }
}
