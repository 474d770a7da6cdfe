use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use super::{
    classifier::ActivityState,
    config::SchedulerConfig,
    storage::entities::ReminderEvent,
};

/// Drives the single reminder timer.
///
/// The scheduler is always waiting on one deadline. Activity-state changes
/// rescale the remaining delay multiplicatively; firing mints a
/// [ReminderEvent] and re-arms with the interval that matches the state at
/// fire time. All time comes in from the caller, which keeps this a plain
/// state machine the tests can step manually.
pub struct ReminderScheduler {
    config: SchedulerConfig,
    state: ActivityState,
    deadline: Instant,
    next_id: u64,
}

impl ReminderScheduler {
    pub fn new(config: SchedulerConfig, now: Instant, first_id: u64) -> Self {
        let initial = scaled_interval(&config, ActivityState::Normal);
        Self {
            config,
            state: ActivityState::Normal,
            deadline: now + initial,
            next_id: first_id,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn state(&self) -> ActivityState {
        self.state
    }

    /// Full reminder interval for a state: base scaled by the per-state
    /// factor, never below the configured floor.
    pub fn interval_for(&self, state: ActivityState) -> Duration {
        scaled_interval(&self.config, state)
    }

    /// Applies a classifier transition. Repeating the current state is a
    /// no-op, so duplicate reports can never move an armed deadline. On a
    /// real change the remaining wait is rescaled by the ratio of the two
    /// state intervals and clamped at zero: an almost due reminder may fire
    /// immediately but never retroactively.
    pub fn apply_state(&mut self, state: ActivityState, now: Instant) {
        if state == self.state {
            return;
        }

        let old_interval = scaled_interval(&self.config, self.state);
        let new_interval = scaled_interval(&self.config, state);
        let remaining = self.deadline.saturating_duration_since(now);

        let ratio = new_interval.as_secs_f64() / old_interval.as_secs_f64();
        let rescaled = remaining.mul_f64(ratio);

        self.state = state;
        self.deadline = now + rescaled;
    }

    /// Fires the reminder that is due: returns its event and re-arms the
    /// timer for the current state.
    pub fn fire(&mut self, now: Instant, fired_at: DateTime<Utc>) -> ReminderEvent {
        let interval = scaled_interval(&self.config, self.state);
        self.deadline = now + interval;

        let id = self.next_id + 1;
        self.next_id = id;

        ReminderEvent {
            id,
            fired_at,
            interval_used: chrono::Duration::from_std(interval)
                .expect("reminder intervals fit into chrono range"),
            state_at_fire: self.state,
        }
    }
}

// A configured floor of zero would otherwise allow a zero-length interval,
// and with it a reminder loop that spins.
const HARD_FLOOR: Duration = Duration::from_secs(1);

fn scaled_interval(config: &SchedulerConfig, state: ActivityState) -> Duration {
    let factor = match state {
        ActivityState::Inactive => config.inactive_factor,
        ActivityState::LowActivity => config.low_activity_factor,
        ActivityState::Normal => config.normal_factor,
        ActivityState::Hyperactive => config.hyperactive_factor,
    };

    let base = Duration::from_secs(config.base_interval_mins as u64 * 60);
    let floor = Duration::from_secs(config.min_interval_mins as u64 * 60);
    let scaled = base.mul_f64(factor.max(0.));
    scaled.max(floor).max(HARD_FLOOR)
}
