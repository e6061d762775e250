//! Chain poller background task

use std::{
    sync::{Arc, Mutex, RwLock},
    time::Duration,
};

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::{
    services::{ChainSource, SleepInhibitor, StatusBoard},
    settings::Settings,
    state::TimerState,
    utils::{Clock, StopSignal},
};

/// Result of one poll iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub succeeded: bool,
    /// Whether the next wait uses the panic interval
    pub panic: bool,
    pub next_interval: Duration,
}

/// Keeps `chain_end_time` fresh, backing off to the panic interval on
/// failure or when the deadline is close
pub struct Poller {
    timer: Arc<Mutex<TimerState>>,
    settings: Arc<RwLock<Settings>>,
    source: Arc<dyn ChainSource>,
    board: Arc<StatusBoard>,
    inhibitor: Arc<dyn SleepInhibitor>,
    clock: Arc<dyn Clock>,
    stop: StopSignal,
}

impl Poller {
    pub fn new(
        timer: Arc<Mutex<TimerState>>,
        settings: Arc<RwLock<Settings>>,
        source: Arc<dyn ChainSource>,
        board: Arc<StatusBoard>,
        inhibitor: Arc<dyn SleepInhibitor>,
        clock: Arc<dyn Clock>,
        stop: StopSignal,
    ) -> Self {
        Self {
            timer,
            settings,
            source,
            board,
            inhibitor,
            clock,
            stop,
        }
    }

    /// Run one request and fold its result into the timer state
    pub async fn poll_once(&self) -> PollOutcome {
        let settings = match self.settings.read() {
            Ok(settings) => settings.clone(),
            Err(e) => {
                error!("Failed to read settings: {}", e);
                Settings::default()
            }
        };

        if !self.stop.is_stopped() {
            self.inhibitor.set_inhibited(settings.prevent_sleep);
            // Stop may have released the inhibitor between the check and the set
            if self.stop.is_stopped() {
                self.inhibitor.set_inhibited(false);
            }
        }

        debug!("Attempting chain poll");
        let result = self.source.fetch(&settings.access_token).await;
        let now = self.clock.now_epoch();

        let (succeeded, remaining) = {
            let mut timer = match self.timer.lock() {
                Ok(timer) => timer,
                Err(e) => {
                    error!("Failed to lock timer state: {}", e);
                    return PollOutcome {
                        succeeded: false,
                        panic: true,
                        next_interval: settings.poll_interval(true, true),
                    };
                }
            };

            match &result {
                Ok(snapshot) => {
                    let seed = if settings.backup_timer_enabled {
                        snapshot.timeout
                    } else {
                        None
                    };
                    timer.record_success(snapshot.adjusted_end(), seed, now);
                }
                Err(_) => timer.record_failure(),
            }
            (result.is_ok(), timer.remaining_at(now))
        };

        match &result {
            Ok(snapshot) => {
                debug!("Chain poll succeeded: end={} ({}s left)", snapshot.end, remaining)
            }
            Err(e) if self.stop.is_stopped() => {
                debug!("Chain poll failed after stop, not flashing: {}", e);
            }
            Err(e) => {
                warn!("Chain poll failed: {}", e);
                self.board.flash_failure(&e.to_string());
            }
        }

        let near_alarm = remaining <= settings.alarm_threshold_seconds;
        PollOutcome {
            succeeded,
            panic: settings.panic_mode(!succeeded, near_alarm),
            next_interval: settings.poll_interval(!succeeded, near_alarm),
        }
    }

    /// Poll until stopped. The wait between polls is interruptible; a
    /// request already in flight is left to finish.
    pub async fn run(mut self) {
        info!("Starting chain poller task");

        while !self.stop.is_stopped() {
            let outcome = self.poll_once().await;
            if outcome.panic {
                debug!("Panic mode, next poll in {:?}", outcome.next_interval);
            }

            tokio::select! {
                _ = sleep(outcome.next_interval) => {}
                _ = self.stop.stopped() => break,
            }
        }

        info!("Chain poller task stopped");
    }
}
