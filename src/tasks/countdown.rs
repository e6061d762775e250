//! Countdown background task
//!
//! Ticks once per second regardless of the poll cadence: derives remaining
//! time from the shared end time, classifies the zone, publishes a display
//! update and hands zone edges to the alarm controller.

use std::{
    sync::{Arc, Mutex, RwLock},
    time::Duration,
};

use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::{
    services::{DisplayUpdate, StatusBoard},
    settings::Settings,
    state::{
        alarm::{AlarmController, AlarmSounds},
        timer_state::{classify_zone, format_clock, TimerState, Zone},
    },
    utils::{Clock, StopSignal},
};

pub const TICK: Duration = Duration::from_secs(1);

/// What one tick observed
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub remaining_seconds: u64,
    pub zone: Zone,
    /// Set only when the zone differs from the previous tick
    pub transition: Option<(Option<Zone>, Zone)>,
    pub display: DisplayUpdate,
}

pub struct CountdownEngine {
    timer: Arc<Mutex<TimerState>>,
    settings: Arc<RwLock<Settings>>,
    alarm: Arc<Mutex<AlarmController>>,
    board: Arc<StatusBoard>,
    clock: Arc<dyn Clock>,
    stop: StopSignal,
    last_zone: Option<Zone>,
}

impl CountdownEngine {
    pub fn new(
        timer: Arc<Mutex<TimerState>>,
        settings: Arc<RwLock<Settings>>,
        alarm: Arc<Mutex<AlarmController>>,
        board: Arc<StatusBoard>,
        clock: Arc<dyn Clock>,
        stop: StopSignal,
    ) -> Self {
        Self {
            timer,
            settings,
            alarm,
            board,
            clock,
            stop,
            last_zone: None,
        }
    }

    /// Advance the countdown by one tick
    pub fn tick(&mut self) -> Option<Tick> {
        let settings = match self.settings.read() {
            Ok(settings) => settings.clone(),
            Err(e) => {
                error!("Failed to read settings: {}", e);
                return None;
            }
        };
        let now = self.clock.now_epoch();

        // Remaining time and zone come from one locked snapshot
        let (remaining, zone, backup, poll_failing) = {
            let mut timer = match self.timer.lock() {
                Ok(timer) => timer,
                Err(e) => {
                    error!("Failed to lock timer state: {}", e);
                    return None;
                }
            };
            let backup = settings.backup_timer_enabled.then(|| timer.tick_backup());
            let remaining = timer.remaining_at(now);
            let zone = classify_zone(remaining, settings.thresholds());
            timer.zone = zone;
            (remaining, zone, backup, timer.poll_failing)
        };

        let update = DisplayUpdate {
            remaining_seconds: remaining,
            remaining_text: format_clock(remaining),
            backup_text: backup.map(format_clock).unwrap_or_else(|| "Disabled".to_string()),
            zone,
            poll_failing,
        };
        self.board.render(update.clone());

        let transition = (self.last_zone != Some(zone)).then_some((self.last_zone, zone));
        if let Some((from, to)) = transition {
            info!("Zone {:?} -> {:?} ({} left)", from, to, update.remaining_text);
            self.dispatch(to, &AlarmSounds::from(&settings));
        }
        self.last_zone = Some(zone);

        Some(Tick {
            remaining_seconds: remaining,
            zone,
            transition,
            display: update,
        })
    }

    fn dispatch(&self, zone: Zone, sounds: &AlarmSounds) {
        let mut alarm = match self.alarm.lock() {
            Ok(alarm) => alarm,
            Err(e) => {
                error!("Failed to lock alarm controller: {}", e);
                return;
            }
        };
        // Checked under the alarm lock so nothing plays after a stop returns
        if self.stop.is_stopped() {
            return;
        }
        alarm.on_zone(zone, sounds);
    }

    /// Tick every second until stopped
    pub async fn run(mut self) {
        info!("Starting countdown task");

        let mut ticker = interval(TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.stop.stopped() => break,
            }
            if self.stop.is_stopped() {
                break;
            }
            self.tick();
        }

        info!("Countdown task stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{AudioCommand, ManualClock, RecordingAudio};

    const NOW: i64 = 1_700_000_000;

    struct Harness {
        engine: CountdownEngine,
        timer: Arc<Mutex<TimerState>>,
        settings: Arc<RwLock<Settings>>,
        clock: Arc<ManualClock>,
        audio: RecordingAudio,
        board: Arc<StatusBoard>,
        stop_tx: tokio::sync::watch::Sender<bool>,
    }

    fn harness(end: Option<i64>) -> Harness {
        let timer = Arc::new(Mutex::new(TimerState {
            chain_end_time: end,
            ..TimerState::new()
        }));
        let settings = Arc::new(RwLock::new(Settings::default()));
        let audio = RecordingAudio::new();
        let alarm = Arc::new(Mutex::new(AlarmController::new(Box::new(audio.clone()))));
        let board = Arc::new(StatusBoard::new());
        let clock = ManualClock::at(NOW);
        let (stop_tx, stop) = StopSignal::channel();
        let engine = CountdownEngine::new(
            timer.clone(),
            settings.clone(),
            alarm,
            board.clone(),
            clock.clone(),
            stop,
        );
        Harness {
            engine,
            timer,
            settings,
            clock,
            audio,
            board,
            stop_tx,
        }
    }

    fn sounds() -> AlarmSounds {
        AlarmSounds::from(&Settings::default())
    }

    #[test]
    fn escalates_through_pre_alarm_to_alarm() {
        let mut h = harness(Some(NOW + 125));

        // A: two minutes out
        let tick = h.engine.tick().unwrap();
        assert_eq!(tick.zone, Zone::Normal);
        assert_eq!(tick.display.remaining_text, "02:05");
        assert_eq!(tick.transition, Some((None, Zone::Normal)));
        assert!(h.audio.commands().is_empty());

        // B: 36 seconds later the zone has changed exactly once
        let mut transitions = 0;
        let mut tick = tick;
        for _ in 0..36 {
            h.clock.advance(1);
            tick = h.engine.tick().unwrap();
            if tick.transition.is_some() {
                transitions += 1;
            }
        }
        assert_eq!(tick.remaining_seconds, 89);
        assert_eq!(tick.zone, Zone::PreAlarm);
        assert_eq!(transitions, 1);
        assert_eq!(
            h.audio.commands(),
            vec![AudioCommand::play(&sounds().pre_alarm, 0.5)]
        );

        // C: 30 more seconds, the alarm replaces the pre-alarm
        for _ in 0..30 {
            h.clock.advance(1);
            tick = h.engine.tick().unwrap();
        }
        assert_eq!(tick.remaining_seconds, 59);
        assert_eq!(tick.zone, Zone::Alarm);
        assert_eq!(
            h.audio.commands(),
            vec![
                AudioCommand::play(&sounds().pre_alarm, 0.5),
                AudioCommand::Stop,
                AudioCommand::play(&sounds().alarm, 0.5),
            ]
        );
    }

    #[test]
    fn transition_is_edge_triggered() {
        let mut h = harness(Some(NOW + 30));
        let first = h.engine.tick().unwrap();
        assert_eq!(first.transition, Some((None, Zone::Alarm)));
        for _ in 0..5 {
            h.clock.advance(1);
            assert_eq!(h.engine.tick().unwrap().transition, None);
        }
        assert_eq!(h.audio.plays(), 1);
    }

    #[test]
    fn unset_end_time_counts_as_zero() {
        let mut h = harness(None);
        let tick = h.engine.tick().unwrap();
        assert_eq!(tick.remaining_seconds, 0);
        assert_eq!(tick.display.remaining_text, "00:00");
        assert_eq!(tick.zone, Zone::Alarm);
    }

    #[test]
    fn remaining_never_goes_negative() {
        let mut h = harness(Some(NOW + 2));
        h.clock.advance(10);
        assert_eq!(h.engine.tick().unwrap().remaining_seconds, 0);
    }

    #[test]
    fn backup_timer_counts_down_when_enabled() {
        let mut h = harness(Some(NOW + 500));
        assert_eq!(h.engine.tick().unwrap().display.backup_text, "Disabled");

        h.settings.write().unwrap().backup_timer_enabled = true;
        h.timer.lock().unwrap().backup_deadline_seconds = 2;
        assert_eq!(h.engine.tick().unwrap().display.backup_text, "00:01");
        assert_eq!(h.engine.tick().unwrap().display.backup_text, "00:00");
        assert_eq!(h.engine.tick().unwrap().display.backup_text, "00:00");
    }

    #[test]
    fn threshold_changes_apply_on_next_tick() {
        let mut h = harness(Some(NOW + 100));
        assert_eq!(h.engine.tick().unwrap().zone, Zone::Normal);

        h.settings.write().unwrap().pre_alarm_threshold_seconds = 120;
        let tick = h.engine.tick().unwrap();
        assert_eq!(tick.zone, Zone::PreAlarm);
        assert_eq!(h.timer.lock().unwrap().zone, Zone::PreAlarm);
    }

    #[test]
    fn display_carries_poll_failing() {
        let mut h = harness(Some(NOW + 500));
        h.timer.lock().unwrap().record_failure();
        h.engine.tick();
        assert!(h.board.latest().poll_failing);
    }

    #[test]
    fn no_alarm_dispatch_after_stop() {
        let mut h = harness(Some(NOW + 30));
        h.stop_tx.send_replace(true);
        let tick = h.engine.tick().unwrap();
        assert_eq!(tick.zone, Zone::Alarm);
        assert!(h.audio.commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn run_ticks_every_second_until_stopped() {
        let h = harness(Some(NOW + 500));
        let mut rx = h.board.subscribe();
        let stop_tx = h.stop_tx;
        let task = tokio::spawn(h.engine.run());

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().remaining_text, "08:20");

        h.clock.advance(1);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().remaining_text, "08:19");

        stop_tx.send_replace(true);
        task.await.unwrap();
    }
}
