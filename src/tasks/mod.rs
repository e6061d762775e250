//! Background tasks module
//! 
//! The two watch loops (chain poller and countdown) plus the optional
//! console renderer.

pub mod console;
pub mod countdown;
pub mod poller;

// Re-export main items
pub use console::console_display_task;
pub use countdown::{CountdownEngine, Tick, TICK};
pub use poller::{PollOutcome, Poller};
