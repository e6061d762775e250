//! Timer state shared by the poller and the countdown, plus zone arithmetic

use serde::Serialize;

/// Alarm zone derived from the remaining time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Zone {
    #[default]
    Normal,
    PreAlarm,
    Alarm,
}

/// Zone boundaries in seconds, both inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub alarm: u64,
    pub pre_alarm: u64,
}

/// Classify remaining time into a zone.
///
/// ALARM is checked first, so when `alarm >= pre_alarm` the pre-alarm band is
/// empty and every value at or below the alarm threshold is ALARM.
pub fn classify_zone(remaining_seconds: u64, thresholds: Thresholds) -> Zone {
    if remaining_seconds <= thresholds.alarm {
        Zone::Alarm
    } else if remaining_seconds <= thresholds.pre_alarm {
        Zone::PreAlarm
    } else {
        Zone::Normal
    }
}

/// Format seconds as `MM:SS`; minutes are not wrapped into hours.
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Live state of one watch session
///
/// The poller owns `chain_end_time`, `poll_failing` and the backup seed; the
/// countdown owns the backup decrement and `zone`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TimerState {
    /// Epoch seconds the chain ends at; `None` until the first successful poll
    pub chain_end_time: Option<i64>,
    pub backup_deadline_seconds: u64,
    pub poll_failing: bool,
    pub zone: Zone,
    /// Epoch seconds of the last successful poll
    pub last_success: Option<i64>,
}

impl TimerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining seconds at `now`, clamped at zero.
    ///
    /// With no end time yet this is zero, which classifies as ALARM.
    pub fn remaining_at(&self, now: i64) -> u64 {
        self.chain_end_time
            .map(|end| end.saturating_sub(now).max(0) as u64)
            .unwrap_or(0)
    }

    /// Apply a successful poll
    pub fn record_success(&mut self, end_time: i64, backup_seed: Option<u64>, now: i64) {
        self.chain_end_time = Some(end_time);
        if let Some(seed) = backup_seed {
            self.backup_deadline_seconds = seed;
        }
        self.poll_failing = false;
        self.last_success = Some(now);
    }

    /// Apply a failed poll; the end time is left untouched
    pub fn record_failure(&mut self) {
        self.poll_failing = true;
    }

    /// Count the backup deadline down by one second, floored at zero
    pub fn tick_backup(&mut self) -> u64 {
        self.backup_deadline_seconds = self.backup_deadline_seconds.saturating_sub(1);
        self.backup_deadline_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Thresholds = Thresholds { alarm: 60, pre_alarm: 90 };

    #[test]
    fn boundaries_are_inclusive() {
        assert_eq!(classify_zone(60, T), Zone::Alarm);
        assert_eq!(classify_zone(61, T), Zone::PreAlarm);
        assert_eq!(classify_zone(90, T), Zone::PreAlarm);
        assert_eq!(classify_zone(91, T), Zone::Normal);
        assert_eq!(classify_zone(0, T), Zone::Alarm);
    }

    #[test]
    fn classification_is_pure() {
        for remaining in 0..200 {
            let first = classify_zone(remaining, T);
            assert_eq!(first, classify_zone(remaining, T));
        }
    }

    #[test]
    fn alarm_wins_when_thresholds_are_inverted() {
        let inverted = Thresholds { alarm: 90, pre_alarm: 60 };
        for remaining in 0..=90 {
            assert_eq!(classify_zone(remaining, inverted), Zone::Alarm);
        }
        assert_eq!(classify_zone(91, inverted), Zone::Normal);
    }

    #[test]
    fn alarm_only_leaves_through_a_value_above_threshold() {
        // Walk remaining time up and down; any step out of ALARM must be
        // to a value above the alarm threshold.
        let path = [120, 95, 80, 61, 60, 30, 59, 60, 200, 10];
        let mut previous = None;
        for remaining in path {
            let zone = classify_zone(remaining, T);
            if previous == Some(Zone::Alarm) && zone != Zone::Alarm {
                assert!(remaining > T.alarm);
            }
            previous = Some(zone);
        }
    }

    #[test]
    fn format_clock_pads() {
        assert_eq!(format_clock(125), "02:05");
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(59), "00:59");
        assert_eq!(format_clock(6000), "100:00");
    }

    #[test]
    fn remaining_is_clamped_and_defaults_to_zero() {
        let mut state = TimerState::new();
        assert_eq!(state.remaining_at(1_000), 0);

        state.record_success(1_125, None, 1_000);
        assert_eq!(state.remaining_at(1_000), 125);
        assert_eq!(state.remaining_at(2_000), 0);
    }

    #[test]
    fn failure_keeps_end_time() {
        let mut state = TimerState::new();
        state.record_success(500, Some(300), 100);
        state.record_failure();
        assert!(state.poll_failing);
        assert_eq!(state.chain_end_time, Some(500));
        assert_eq!(state.backup_deadline_seconds, 300);

        state.record_success(510, None, 110);
        assert!(!state.poll_failing);
        assert_eq!(state.backup_deadline_seconds, 300);
    }

    #[test]
    fn backup_floors_at_zero() {
        let mut state = TimerState::new();
        state.backup_deadline_seconds = 1;
        assert_eq!(state.tick_backup(), 0);
        assert_eq!(state.tick_backup(), 0);
    }
}
