use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{
    classifier::ActivityState,
    storage::entities::{
        ReminderEvent, ReminderOutcome, ReminderRecordEntity, ReminderResponse,
        SessionRecordEntity,
    },
};

/// Activity-state histogram: whole seconds spent in each state, accumulated
/// one classified window at a time.
#[derive(PartialEq, Eq, Debug, Default, Serialize, Deserialize, Clone, Copy)]
pub struct StateDurations {
    pub inactive_secs: i64,
    pub low_activity_secs: i64,
    pub normal_secs: i64,
    pub hyperactive_secs: i64,
}

impl StateDurations {
    pub fn add(&mut self, state: ActivityState, seconds: i64) {
        match state {
            ActivityState::Inactive => self.inactive_secs += seconds,
            ActivityState::LowActivity => self.low_activity_secs += seconds,
            ActivityState::Normal => self.normal_secs += seconds,
            ActivityState::Hyperactive => self.hyperactive_secs += seconds,
        }
    }

    pub fn for_state(&self, state: ActivityState) -> i64 {
        match state {
            ActivityState::Inactive => self.inactive_secs,
            ActivityState::LowActivity => self.low_activity_secs,
            ActivityState::Normal => self.normal_secs,
            ActivityState::Hyperactive => self.hyperactive_secs,
        }
    }

    pub fn total(&self) -> i64 {
        self.inactive_secs + self.low_activity_secs + self.normal_secs + self.hyperactive_secs
    }
}

/// Cumulative counters describing reminder outcomes and activity history for
/// one session day. A timed out reminder counts as skipped here; only the raw
/// history keeps them apart.
#[derive(PartialEq, Eq, Debug, Default, Serialize, Deserialize, Clone)]
pub struct SessionStats {
    pub total_reminders: u32,
    pub drank_count: u32,
    pub skipped_count: u32,
    pub activity: StateDurations,
}

impl SessionStats {
    pub fn record_outcome(&mut self, outcome: ReminderOutcome) {
        match outcome {
            ReminderOutcome::Drank => self.drank_count += 1,
            ReminderOutcome::Skipped | ReminderOutcome::TimedOut => self.skipped_count += 1,
        }
    }

    pub fn answered(&self) -> u32 {
        self.drank_count + self.skipped_count
    }

    /// Folds another day's counters into these, for multi-day overviews.
    pub fn merge(&mut self, other: &SessionStats) {
        self.total_reminders += other.total_reminders;
        self.drank_count += other.drank_count;
        self.skipped_count += other.skipped_count;
        self.activity.inactive_secs += other.activity.inactive_secs;
        self.activity.low_activity_secs += other.activity.low_activity_secs;
        self.activity.normal_secs += other.activity.normal_secs;
        self.activity.hyperactive_secs += other.activity.hyperactive_secs;
    }
}

/// Read-only view handed to anything that displays state.
#[derive(Debug, Clone)]
pub struct MonitorSnapshot {
    pub stats: SessionStats,
    pub activity: ActivityState,
}

struct MonitorState {
    stats: SessionStats,
    activity: ActivityState,
    pending: Option<ReminderEvent>,
    history: Vec<ReminderRecordEntity>,
}

/// All state shared between the monitor loop, the spawned response waits and
/// the dashboard readers, behind one mutex. Every critical section is a few
/// field updates; nothing holds the guard across an await.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<Mutex<MonitorState>>,
}

impl SharedState {
    pub fn new(resumed: Option<SessionRecordEntity>) -> Self {
        let (stats, history) = match resumed {
            Some(record) => (record.stats, record.history),
            None => (SessionStats::default(), Vec::new()),
        };
        Self {
            inner: Arc::new(Mutex::new(MonitorState {
                stats,
                activity: ActivityState::Normal,
                pending: None,
                history,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        // A poisoned mutex means a panic mid-update. That is core state
        // corruption, the one case the daemon is allowed to die on.
        self.inner.lock().expect("monitor state was poisoned")
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        let state = self.lock();
        MonitorSnapshot {
            stats: state.stats.clone(),
            activity: state.activity,
        }
    }

    pub fn set_activity(&self, activity: ActivityState) {
        self.lock().activity = activity;
    }

    /// Adds one classified window to the histogram.
    pub fn accumulate_window(&self, state: ActivityState, seconds: i64) {
        self.lock().stats.activity.add(state, seconds);
    }

    /// Registers a fired reminder: bumps the counter, appends the history
    /// record and occupies the pending slot.
    pub fn begin_reminder(&self, event: ReminderEvent) {
        let mut state = self.lock();
        state.stats.total_reminders += 1;
        state.history.push(ReminderRecordEntity {
            event: event.clone(),
            response: None,
        });
        state.pending = Some(event);
    }

    pub fn pending_reminder(&self) -> Option<ReminderEvent> {
        self.lock().pending.clone()
    }

    /// Resolves the pending reminder, if it is still the one referenced.
    /// Returns false when someone else already resolved it, which makes a
    /// late timeout or duplicate answer a no-op.
    pub fn resolve_reminder(
        &self,
        reminder_id: u64,
        responded_at: DateTime<Utc>,
        outcome: ReminderOutcome,
    ) -> bool {
        let mut state = self.lock();
        match &state.pending {
            Some(event) if event.id == reminder_id => {}
            _ => return false,
        }
        state.pending = None;
        state.stats.record_outcome(outcome);

        let response = ReminderResponse {
            reminder_id,
            responded_at,
            outcome,
        };
        if let Some(record) = state
            .history
            .iter_mut()
            .rev()
            .find(|record| record.event.id == reminder_id)
        {
            record.response = Some(response);
        }
        true
    }

    /// Clones everything the persistence store needs for one atomic write.
    pub fn to_record(&self, date: NaiveDate) -> SessionRecordEntity {
        let state = self.lock();
        SessionRecordEntity {
            date,
            stats: state.stats.clone(),
            history: state.history.clone(),
        }
    }

    /// Highest reminder id seen so far, so a restarted daemon continues the
    /// sequence instead of reusing ids.
    pub fn last_reminder_id(&self) -> u64 {
        self.lock()
            .history
            .iter()
            .map(|record| record.event.id)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    use crate::daemon::{
        classifier::ActivityState,
        storage::entities::{ReminderEvent, ReminderOutcome},
    };

    use super::SharedState;

    fn test_event(id: u64) -> ReminderEvent {
        ReminderEvent {
            id,
            fired_at: Utc.with_ymd_and_hms(2025, 3, 7, 10, 0, 0).unwrap(),
            interval_used: Duration::minutes(45),
            state_at_fire: ActivityState::Normal,
        }
    }

    #[test]
    fn test_drank_updates_only_drank_counter() {
        let shared = SharedState::new(None);
        shared.begin_reminder(test_event(1));
        let resolved = shared.resolve_reminder(1, Utc::now(), ReminderOutcome::Drank);
        assert!(resolved);

        let snapshot = shared.snapshot();
        assert_eq!(snapshot.stats.total_reminders, 1);
        assert_eq!(snapshot.stats.drank_count, 1);
        assert_eq!(snapshot.stats.skipped_count, 0);
    }

    #[test]
    fn test_timeout_counts_as_skip_but_history_differs() {
        let shared = SharedState::new(None);
        shared.begin_reminder(test_event(1));
        shared.resolve_reminder(1, Utc::now(), ReminderOutcome::TimedOut);

        let snapshot = shared.snapshot();
        assert_eq!(snapshot.stats.skipped_count, 1);

        let record = shared.to_record(NaiveDate::from_ymd_opt(2025, 3, 7).unwrap());
        assert_eq!(
            record.history[0].response.as_ref().unwrap().outcome,
            ReminderOutcome::TimedOut
        );
    }

    #[test]
    fn test_second_resolution_is_ignored() {
        let shared = SharedState::new(None);
        shared.begin_reminder(test_event(1));
        assert!(shared.resolve_reminder(1, Utc::now(), ReminderOutcome::Drank));
        assert!(!shared.resolve_reminder(1, Utc::now(), ReminderOutcome::TimedOut));

        let snapshot = shared.snapshot();
        assert_eq!(snapshot.stats.drank_count, 1);
        assert_eq!(snapshot.stats.skipped_count, 0);
    }

    #[test]
    fn test_resolution_of_wrong_id_is_ignored() {
        let shared = SharedState::new(None);
        shared.begin_reminder(test_event(2));
        assert!(!shared.resolve_reminder(1, Utc::now(), ReminderOutcome::Drank));
        assert!(shared.pending_reminder().is_some());
    }

    #[test]
    fn test_histogram_accumulates_per_state() {
        let shared = SharedState::new(None);
        shared.accumulate_window(ActivityState::Normal, 60);
        shared.accumulate_window(ActivityState::Normal, 60);
        shared.accumulate_window(ActivityState::Inactive, 60);

        let stats = shared.snapshot().stats;
        assert_eq!(stats.activity.normal_secs, 120);
        assert_eq!(stats.activity.inactive_secs, 60);
        assert_eq!(stats.activity.total(), 180);
    }

    #[test]
    fn test_merge_sums_every_counter() {
        use crate::daemon::stats::SessionStats;

        let mut left = SessionStats::default();
        left.total_reminders = 2;
        left.drank_count = 1;
        left.skipped_count = 1;
        left.activity.normal_secs = 100;

        let mut right = SessionStats::default();
        right.total_reminders = 3;
        right.drank_count = 3;
        right.activity.inactive_secs = 40;

        left.merge(&right);
        assert_eq!(left.total_reminders, 5);
        assert_eq!(left.drank_count, 4);
        assert_eq!(left.skipped_count, 1);
        assert_eq!(left.activity.total(), 140);
    }

    #[test]
    fn test_resumed_session_continues_id_sequence() {
        let shared = SharedState::new(None);
        shared.begin_reminder(test_event(7));
        shared.resolve_reminder(7, Utc::now(), ReminderOutcome::Skipped);

        let record = shared.to_record(NaiveDate::from_ymd_opt(2025, 3, 7).unwrap());
        let resumed = SharedState::new(Some(record));
        assert_eq!(resumed.last_reminder_id(), 7);
    }
}
