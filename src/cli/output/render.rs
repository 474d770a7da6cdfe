use ansi_term::Colour;
use chrono::{Duration, Local};

use crate::{
    daemon::{
        classifier::ActivityState,
        stats::SessionStats,
        storage::entities::{ReminderOutcome, ReminderRecordEntity, SessionRecordEntity},
    },
    utils::percentage::{count_percentage, duration_percentage},
};

const ALL_STATES: [ActivityState; 4] = [
    ActivityState::Inactive,
    ActivityState::LowActivity,
    ActivityState::Normal,
    ActivityState::Hyperactive,
];

fn state_colour(state: ActivityState) -> Colour {
    match state {
        ActivityState::Inactive => Colour::Red,
        ActivityState::LowActivity => Colour::Yellow,
        ActivityState::Normal => Colour::Green,
        ActivityState::Hyperactive => Colour::Purple,
    }
}

fn outcome_colour(outcome: ReminderOutcome) -> Colour {
    match outcome {
        ReminderOutcome::Drank => Colour::Green,
        ReminderOutcome::Skipped => Colour::Yellow,
        ReminderOutcome::TimedOut => Colour::Red,
    }
}

/// Renders one session day the way the dashboard overview shows it:
/// reminder counters, response rate and the activity time split.
pub fn render_session(record: &SessionRecordEntity) -> String {
    render_aggregate(&format!("Session {}", record.date), &record.stats)
}

/// Same overview, but for counters merged over several days.
pub fn render_aggregate(label: &str, stats: &SessionStats) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{}\n",
        ansi_term::Style::new().bold().paint(label.to_string())
    ));
    out.push_str(&format!(
        "  reminders {} | drank {} | skipped {}\n",
        stats.total_reminders, stats.drank_count, stats.skipped_count
    ));
    out.push_str(&format!(
        "  response rate {}\n",
        count_percentage(stats.drank_count, stats.answered())
    ));

    let total = Duration::seconds(stats.activity.total());
    if total.is_zero() {
        out.push_str("  no activity data yet\n");
    } else {
        for state in ALL_STATES {
            let in_state = Duration::seconds(stats.activity.for_state(state));
            if in_state.is_zero() {
                continue;
            }
            out.push_str(&format!(
                "  {}\t{}\t{}\n",
                state_colour(state).paint(state.to_string()),
                format_duration(in_state),
                duration_percentage(in_state, total),
            ));
        }
    }

    out
}

/// One line per reminder, for the history listing.
pub fn render_history_line(record: &ReminderRecordEntity) -> String {
    let fired = record.event.fired_at.with_timezone(&Local);
    let outcome = match &record.response {
        Some(response) => outcome_colour(response.outcome)
            .paint(response.outcome.to_string())
            .to_string(),
        None => "unresolved".to_string(),
    };

    format!(
        "{}\t#{}\t{}\t{} cadence ({})",
        fired.format("%x %H:%M:%S"),
        record.event.id,
        outcome,
        format_duration(record.event.interval_used),
        state_colour(record.event.state_at_fire).paint(record.event.state_at_fire.to_string()),
    )
}

fn format_duration(v: Duration) -> String {
    if v.num_hours() > 0 {
        format!(
            "{}h{}m{}s",
            v.num_hours(),
            v.num_minutes() % 60,
            v.num_seconds() % 60
        )
    } else if v.num_minutes() > 0 {
        format!("{}m{}s", v.num_minutes() % 60, v.num_seconds() % 60)
    } else {
        format!("{}s", v.num_seconds() % 60)
    }
}
