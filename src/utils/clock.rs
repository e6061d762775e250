//! Wall-clock source

use chrono::Utc;

/// Supplies the current time as epoch seconds
pub trait Clock: Send + Sync {
    fn now_epoch(&self) -> i64;
}

/// Real time from the system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch(&self) -> i64 {
        Utc::now().timestamp()
    }
}
