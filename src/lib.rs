//! Chain Watch - countdown and alarm watcher for a remote chain timer
//! 
//! A poller keeps the chain's end time fresh, a one-second countdown turns
//! it into a display and an alarm zone, and an alarm controller drives
//! looped playback as the zone changes. An HTTP API exposes the state and
//! accepts start/stop and settings changes.

pub mod config;
pub mod error;
pub mod settings;
pub mod state;
pub mod api;
pub mod services;
pub mod tasks;
pub mod utils;

#[cfg(any(test, feature = "testing-support"))]
pub mod testing;

// Re-export commonly used types
pub use config::Config;
pub use settings::Settings;
pub use state::{AppState, Collaborators};
pub use api::create_router;
pub use utils::signals::shutdown_signal;
