use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::utils::clock::Clock;

use super::{
    notify::{Notifier, ReminderChoice, ReminderPrompt},
    stats::SharedState,
    storage::entities::{ReminderEvent, ReminderOutcome},
};

/// Resolves a fired reminder to exactly one outcome.
///
/// One wait runs per reminder. It races the notifier against the bounded
/// response window and the daemon shutdown; whichever finishes first decides
/// the outcome, and the shared pending slot makes any later resolution a
/// no-op. A notifier error or give-up is the delivery-failure case and is
/// treated as a timeout.
pub struct ResponseWait<N> {
    shared: SharedState,
    notifier: Arc<N>,
    clock: Arc<dyn Clock>,
    response_window: Duration,
    shutdown: CancellationToken,
}

impl<N: Notifier> ResponseWait<N> {
    pub fn new(
        shared: SharedState,
        notifier: Arc<N>,
        clock: Arc<dyn Clock>,
        response_window: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            shared,
            notifier,
            clock,
            response_window,
            shutdown,
        }
    }

    pub async fn run(self, event: ReminderEvent) {
        let prompt = ReminderPrompt::hydration(&event);

        let outcome = tokio::select! {
            result = self.notifier.prompt(prompt) => match result {
                Ok(Some(ReminderChoice::Drank)) => ReminderOutcome::Drank,
                Ok(Some(ReminderChoice::Skipped)) => ReminderOutcome::Skipped,
                Ok(None) => ReminderOutcome::TimedOut,
                Err(e) => {
                    warn!("Reminder delivery failed, counting as timeout {e:?}");
                    ReminderOutcome::TimedOut
                }
            },
            _ = self.clock.sleep(self.response_window) => ReminderOutcome::TimedOut,
            _ = self.shutdown.cancelled() => ReminderOutcome::TimedOut,
        };

        if self.shared.resolve_reminder(event.id, self.clock.time(), outcome) {
            debug!("Reminder {} resolved as {outcome}", event.id);
        } else {
            debug!("Reminder {} was already resolved elsewhere", event.id);
        }
    }
}
