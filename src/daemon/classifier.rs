use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::input_api::EVENT_KIND_COUNT;

use super::config::ClassifierConfig;

/// Discrete classification of recent input intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActivityState {
    Inactive,
    LowActivity,
    Normal,
    Hyperactive,
}

impl std::fmt::Display for ActivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityState::Inactive => write!(f, "inactive"),
            ActivityState::LowActivity => write!(f, "low activity"),
            ActivityState::Normal => write!(f, "normal"),
            ActivityState::Hyperactive => write!(f, "hyperactive"),
        }
    }
}

/// Aggregated input counters over one fixed-length window. Windows are built
/// by the recorder, classified once, and discarded.
#[derive(Debug, Clone, Copy)]
pub struct ActivityWindow {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub event_count: u32,
    pub distinct_event_kinds: u8,
}

impl ActivityWindow {
    pub fn duration(&self) -> chrono::Duration {
        self.window_end - self.window_start
    }

    fn raw_rate_per_minute(&self) -> f64 {
        let seconds = self.duration().num_seconds();
        if seconds <= 0 {
            return 0.;
        }
        self.event_count as f64 * 60. / seconds as f64
    }

    /// Activity rate in events per minute. With weighting enabled a window
    /// fed by a single event kind only counts for two thirds of its raw
    /// rate, so key-repeat storms don't read as hyperactivity.
    pub fn rate_per_minute(&self, kind_weighting: bool) -> f64 {
        let raw = self.raw_rate_per_minute();
        if !kind_weighting || self.event_count == 0 {
            return raw;
        }
        let mix = self.distinct_event_kinds.min(EVENT_KIND_COUNT) as f64 / EVENT_KIND_COUNT as f64;
        raw * (0.5 + 0.5 * mix)
    }
}

/// Threshold band a single window lands in, before hysteresis is applied.
/// Boundary rates belong to the higher band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Band {
    SubLow,
    Low,
    Normal,
    High,
}

/// Turns the window stream into [ActivityState] transitions.
///
/// Transitions are edge triggered: `observe` yields a state only on the
/// window that actually changes it, and at most once per window. A band has
/// to persist for `hysteresis_windows` consecutive windows before it is
/// accepted, and the bottom band has its own longer requirement
/// (`inactive_windows`) before the user is declared inactive.
pub struct ActivityClassifier {
    config: ClassifierConfig,
    current: ActivityState,
    pending: Option<(ActivityState, u32)>,
    sub_low_streak: u32,
}

impl ActivityClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            current: ActivityState::Normal,
            pending: None,
            sub_low_streak: 0,
        }
    }

    pub fn current(&self) -> ActivityState {
        self.current
    }

    fn band_of(&self, rate: f64) -> Band {
        if rate > self.config.high_threshold {
            Band::High
        } else if rate >= self.config.normal_threshold {
            Band::Normal
        } else if rate >= self.config.low_threshold {
            Band::Low
        } else {
            Band::SubLow
        }
    }

    /// Consumes one completed window. Returns the new state when this window
    /// flipped it, `None` otherwise.
    pub fn observe(&mut self, window: &ActivityWindow) -> Option<ActivityState> {
        let rate = window.rate_per_minute(self.config.kind_weighting);
        let band = self.band_of(rate);

        if band == Band::SubLow {
            self.sub_low_streak += 1;
        } else {
            self.sub_low_streak = 0;
        }

        let candidate = match band {
            // Short lulls hold the current state until enough silent windows
            // accumulate.
            Band::SubLow if self.sub_low_streak < self.config.inactive_windows => {
                self.pending = None;
                return None;
            }
            Band::SubLow => ActivityState::Inactive,
            Band::Low => ActivityState::LowActivity,
            Band::Normal => ActivityState::Normal,
            Band::High => ActivityState::Hyperactive,
        };

        if candidate == self.current {
            self.pending = None;
            return None;
        }

        // The inactive streak is its own hysteresis, no second waiting period.
        if candidate == ActivityState::Inactive {
            self.pending = None;
            self.current = ActivityState::Inactive;
            return Some(self.current);
        }

        let seen = match self.pending {
            Some((state, seen)) if state == candidate => seen + 1,
            _ => 1,
        };

        if seen >= self.config.hysteresis_windows {
            self.pending = None;
            self.current = candidate;
            Some(candidate)
        } else {
            self.pending = Some((candidate, seen));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use crate::daemon::config::ClassifierConfig;

    use super::{ActivityClassifier, ActivityState, ActivityWindow};

    fn test_config() -> ClassifierConfig {
        ClassifierConfig {
            window_secs: 60,
            low_threshold: 5.,
            normal_threshold: 25.,
            high_threshold: 150.,
            inactive_windows: 3,
            hysteresis_windows: 2,
            kind_weighting: false,
        }
    }

    fn window(event_count: u32, distinct_event_kinds: u8) -> ActivityWindow {
        let start = Utc.with_ymd_and_hms(2025, 3, 7, 12, 0, 0).unwrap();
        ActivityWindow {
            window_start: start,
            window_end: start + Duration::seconds(60),
            event_count,
            distinct_event_kinds,
        }
    }

    #[test]
    fn test_boundaries_belong_to_higher_band() {
        let config = test_config();
        let mut classifier = ActivityClassifier::new(config.clone());

        // Exactly at the low threshold: LowActivity, not a sub-low window.
        classifier.observe(&window(5, 3));
        assert_eq!(classifier.observe(&window(5, 3)), Some(ActivityState::LowActivity));

        let mut classifier = ActivityClassifier::new(config.clone());
        // Exactly at the normal threshold stays Normal (the initial state).
        assert_eq!(classifier.observe(&window(25, 3)), None);
        assert_eq!(classifier.current(), ActivityState::Normal);

        let mut classifier = ActivityClassifier::new(config);
        // The high threshold itself is still Normal, one more event is not.
        assert_eq!(classifier.observe(&window(150, 3)), None);
        classifier.observe(&window(151, 3));
        assert_eq!(classifier.observe(&window(151, 3)), Some(ActivityState::Hyperactive));
    }

    #[test]
    fn test_hysteresis_needs_consecutive_windows() {
        let mut classifier = ActivityClassifier::new(test_config());

        assert_eq!(classifier.observe(&window(200, 3)), None);
        // A normal window in between resets the pending switch.
        assert_eq!(classifier.observe(&window(30, 3)), None);
        assert_eq!(classifier.observe(&window(200, 3)), None);
        assert_eq!(classifier.observe(&window(200, 3)), Some(ActivityState::Hyperactive));
        assert_eq!(classifier.current(), ActivityState::Hyperactive);
    }

    #[test]
    fn test_three_silent_windows_go_inactive() {
        let mut classifier = ActivityClassifier::new(test_config());

        assert_eq!(classifier.observe(&window(0, 0)), None);
        assert_eq!(classifier.observe(&window(0, 0)), None);
        assert_eq!(classifier.observe(&window(0, 0)), Some(ActivityState::Inactive));
    }

    #[test]
    fn test_sub_low_holds_current_state_before_streak() {
        let mut classifier = ActivityClassifier::new(test_config());

        classifier.observe(&window(200, 3));
        classifier.observe(&window(200, 3));
        assert_eq!(classifier.current(), ActivityState::Hyperactive);

        // Two silent windows are not enough to leave Hyperactive.
        classifier.observe(&window(0, 0));
        classifier.observe(&window(0, 0));
        assert_eq!(classifier.current(), ActivityState::Hyperactive);
        assert_eq!(classifier.observe(&window(0, 0)), Some(ActivityState::Inactive));
    }

    #[test]
    fn test_repeated_same_band_is_silent() {
        let mut classifier = ActivityClassifier::new(test_config());

        for _ in 0..10 {
            assert_eq!(classifier.observe(&window(30, 3)), None);
        }
        assert_eq!(classifier.current(), ActivityState::Normal);
    }

    #[test]
    fn test_kind_weighting_damps_single_kind_windows() {
        let full_mix = window(160, 3);
        let key_spam = window(160, 1);

        assert_eq!(full_mix.rate_per_minute(true), 160.);
        // 160 * (0.5 + 0.5 / 3) = 106.67, below the high threshold.
        assert!(key_spam.rate_per_minute(true) < 110.);

        let mut classifier = ActivityClassifier::new(ClassifierConfig {
            kind_weighting: true,
            ..test_config()
        });
        classifier.observe(&key_spam);
        assert_eq!(classifier.observe(&key_spam), None);
        assert_eq!(classifier.current(), ActivityState::Normal);
    }

    #[test]
    fn test_empty_duration_counts_as_zero_activity() {
        let start = Utc.with_ymd_and_hms(2025, 3, 7, 12, 0, 0).unwrap();
        let degenerate = ActivityWindow {
            window_start: start,
            window_end: start,
            event_count: 100,
            distinct_event_kinds: 3,
        };
        assert_eq!(degenerate.rate_per_minute(false), 0.);
    }
}
