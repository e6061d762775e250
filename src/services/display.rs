//! Display sink: publishes countdown updates and failure flashes to front-ends

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use crate::state::timer_state::Zone;

/// What a front-end renders once per second
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayUpdate {
    pub remaining_seconds: u64,
    /// `MM:SS`
    pub remaining_text: String,
    /// `MM:SS`, or `Disabled` when the backup timer is off
    pub backup_text: String,
    pub zone: Zone,
    pub poll_failing: bool,
}

impl Default for DisplayUpdate {
    fn default() -> Self {
        Self {
            remaining_seconds: 0,
            remaining_text: "00:00".to_string(),
            backup_text: "Disabled".to_string(),
            zone: Zone::Normal,
            poll_failing: false,
        }
    }
}

/// A transient "the poll just failed" signal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureFlash {
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Fan-out point between the core loops and whatever renders them
#[derive(Debug)]
pub struct StatusBoard {
    updates: watch::Sender<DisplayUpdate>,
    flashes: broadcast::Sender<FailureFlash>,
    flash_count: AtomicU64,
    last_flash: Mutex<Option<FailureFlash>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        let (updates, _) = watch::channel(DisplayUpdate::default());
        let (flashes, _) = broadcast::channel(32);
        Self {
            updates,
            flashes,
            flash_count: AtomicU64::new(0),
            last_flash: Mutex::new(None),
        }
    }

    /// Publish one tick's worth of display state
    pub fn render(&self, update: DisplayUpdate) {
        debug!(
            "T-: {} | Backup Timer: {} | {:?}",
            update.remaining_text, update.backup_text, update.zone
        );
        self.updates.send_replace(update);
    }

    /// Signal a failed poll
    pub fn flash_failure(&self, reason: &str) {
        let flash = FailureFlash {
            reason: reason.to_string(),
            at: Utc::now(),
        };
        self.flash_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_flash.lock() {
            *last = Some(flash.clone());
        }
        // No subscribers is fine; the counter still records the flash
        if self.flashes.send(flash).is_err() {
            debug!("No listeners for failure flash");
        }
    }

    pub fn latest(&self) -> DisplayUpdate {
        self.updates.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DisplayUpdate> {
        self.updates.subscribe()
    }

    pub fn subscribe_flashes(&self) -> broadcast::Receiver<FailureFlash> {
        self.flashes.subscribe()
    }

    pub fn flash_count(&self) -> u64 {
        self.flash_count.load(Ordering::Relaxed)
    }

    pub fn last_flash(&self) -> Option<FailureFlash> {
        match self.last_flash.lock() {
            Ok(last) => last.clone(),
            Err(e) => {
                warn!("Failed to lock last failure flash: {}", e);
                None
            }
        }
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}
