//! State management module
//! 
//! The shared timer state, the alarm playback state machine and the
//! application state that ties a watch session together.

pub mod alarm;
pub mod app_state;
pub mod timer_state;

// Re-export main types
pub use alarm::{AlarmController, AlarmPhase, AlarmSounds};
pub use app_state::{AppState, Collaborators, SettingsUpdate};
pub use timer_state::{classify_zone, format_clock, Thresholds, TimerState, Zone};
