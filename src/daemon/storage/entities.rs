use chrono::DateTime;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::daemon::classifier::ActivityState;
use crate::daemon::stats::SessionStats;

/// A single hydration prompt instance with its scheduling context. Immutable
/// once fired.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct ReminderEvent {
    pub id: u64,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub fired_at: DateTime<Utc>,
    /// The reminder cadence in effect at the moment of firing.
    #[serde(with = "duration_ser")]
    pub interval_used: Duration,
    pub state_at_fire: ActivityState,
}

/// How a reminder was resolved. TimedOut folds into the skip counters but
/// stays distinguishable here, in the raw history.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone, Copy)]
pub enum ReminderOutcome {
    Drank,
    Skipped,
    TimedOut,
}

impl std::fmt::Display for ReminderOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReminderOutcome::Drank => write!(f, "drank"),
            ReminderOutcome::Skipped => write!(f, "skipped"),
            ReminderOutcome::TimedOut => write!(f, "timed out"),
        }
    }
}

/// The resolved outcome of one [ReminderEvent]. One per event, no more.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct ReminderResponse {
    pub reminder_id: u64,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub responded_at: DateTime<Utc>,
    pub outcome: ReminderOutcome,
}

/// One reminder with its resolution. The response is only absent for a
/// reminder that was still awaiting an answer when a checkpoint ran; the
/// shutdown path resolves every pending reminder before the final write.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct ReminderRecordEntity {
    pub event: ReminderEvent,
    #[serde(default)]
    pub response: Option<ReminderResponse>,
}

/// The struct used for storing a day of data on the disk: the aggregate
/// counters the dashboard reads plus the full reminder history.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct SessionRecordEntity {
    pub date: NaiveDate,
    pub stats: SessionStats,
    #[serde(default)]
    pub history: Vec<ReminderRecordEntity>,
}

impl SessionRecordEntity {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            stats: SessionStats::default(),
            history: Vec::new(),
        }
    }
}

mod duration_ser {
    use chrono::Duration;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(duration.num_seconds())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = i64::deserialize(deserializer)?;
        let duration = Duration::seconds(s);
        Ok(duration)
    }
}
