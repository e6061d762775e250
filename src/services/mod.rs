//! External collaborator module
//! 
//! Adapters for everything outside the core: the remote chain endpoint,
//! audio playback, the display fan-out and system sleep inhibition.

pub mod audio;
pub mod chain_api;
pub mod display;
pub mod system;

// Re-export main items
pub use audio::{AudioSink, CommandAudioSink, PlayRequest};
pub use chain_api::{ChainSnapshot, ChainSource, TornApiClient};
pub use display::{DisplayUpdate, FailureFlash, StatusBoard};
pub use system::{check_systemd_inhibit_available, SleepInhibitor, SystemdInhibitor};
