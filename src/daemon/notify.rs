use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use super::storage::entities::ReminderEvent;

/// What gets shown to the user for one reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderPrompt {
    pub title: String,
    pub body: String,
}

impl ReminderPrompt {
    pub fn hydration(event: &ReminderEvent) -> Self {
        Self {
            title: "Time to drink water".into(),
            body: format!(
                "Reminder #{} ({} cadence). Did you drink?",
                event.id, event.state_at_fire
            ),
        }
    }
}

/// An explicit answer from the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderChoice {
    Drank,
    Skipped,
}

/// Contract for whatever actually shows the reminder. The core only needs
/// request/response semantics: present the prompt, come back with the user's
/// choice, or `None` when the collaborator cannot obtain one. Bounding the
/// wait is the caller's job.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn prompt(&self, request: ReminderPrompt) -> Result<Option<ReminderChoice>>;
}

/// Terminal-backed notifier. Useful when the daemon runs attached to a
/// console (`sipwatch serve`); a detached daemon has no stdin, which reads as
/// end of input and resolves to `None` so the timeout path takes over.
pub struct ConsoleNotifier;

fn parse_choice(line: &str) -> Option<ReminderChoice> {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "drank" => Some(ReminderChoice::Drank),
        "n" | "no" | "skip" => Some(ReminderChoice::Skipped),
        _ => None,
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn prompt(&self, request: ReminderPrompt) -> Result<Option<ReminderChoice>> {
        info!(title = %request.title, body = %request.body, "Reminder shown");
        println!("{}", request.title);
        println!("{} [y/n]", request.body);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await? {
                None => return Ok(None),
                Some(line) => {
                    if let Some(choice) = parse_choice(&line) {
                        return Ok(Some(choice));
                    }
                    println!("Answer with y(es)/drank or n(o)/skip");
                }
            }
        }
    }
}
