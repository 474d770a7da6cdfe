use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono::NaiveDate;
use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::utils::clock::Clock;

use super::{
    classifier::{ActivityClassifier, ActivityWindow},
    notify::Notifier,
    responder::ResponseWait,
    scheduler::ReminderScheduler,
    stats::SharedState,
    storage::{entities::ReminderOutcome, stats_storage::StatsStorage},
};

/// The scheduling heart of the daemon.
///
/// Runs the only loop that is allowed to change [ActivityState] and move the
/// reminder deadline, which keeps classification and timing free of races by
/// construction. Everything it reacts to arrives through one `select`:
/// completed activity windows, the reminder deadline, the checkpoint tick and
/// shutdown.
pub struct MonitorModule<N, S> {
    windows: Receiver<ActivityWindow>,
    classifier: ActivityClassifier,
    scheduler: ReminderScheduler,
    notifier: Arc<N>,
    shared: SharedState,
    storage: S,
    session_date: NaiveDate,
    response_window: Duration,
    checkpoint_period: Duration,
    shutdown: CancellationToken,
    time_provider: Arc<dyn Clock>,
}

impl<N: Notifier, S: StatsStorage> MonitorModule<N, S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        windows: Receiver<ActivityWindow>,
        classifier: ActivityClassifier,
        scheduler: ReminderScheduler,
        notifier: Arc<N>,
        shared: SharedState,
        storage: S,
        session_date: NaiveDate,
        response_window: Duration,
        checkpoint_period: Duration,
        shutdown: CancellationToken,
        time_provider: Arc<dyn Clock>,
    ) -> Self {
        Self {
            windows,
            classifier,
            scheduler,
            notifier,
            shared,
            storage,
            session_date,
            response_window,
            checkpoint_period,
            shutdown,
            time_provider,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let mut windows_open = true;
        let mut checkpoint_point = self.time_provider.instant() + self.checkpoint_period;

        loop {
            let reminder_deadline = self.scheduler.deadline();
            tokio::select! {
                maybe_window = self.windows.recv(), if windows_open => match maybe_window {
                    Some(window) => self.on_window(&window),
                    None => {
                        // Happens when hook registration failed or the
                        // collector died. Reminders stay on the fixed
                        // schedule, only the adaptive part is lost.
                        windows_open = false;
                        error!("Activity detection is unavailable, reminders continue on a fixed schedule");
                    }
                },
                _ = self.time_provider.sleep_until(reminder_deadline) => {
                    self.fire_reminder();
                }
                _ = self.time_provider.sleep_until(checkpoint_point) => {
                    checkpoint_point += self.checkpoint_period;
                    self.checkpoint().await;
                }
                _ = self.shutdown.cancelled() => break,
            }
        }

        self.finalize().await
    }

    fn on_window(&mut self, window: &ActivityWindow) {
        debug!("Classifying window {:?}", window);
        if let Some(state) = self.classifier.observe(window) {
            info!("Activity state changed to {state}");
            self.shared.set_activity(state);
            self.scheduler
                .apply_state(state, self.time_provider.instant());
        }

        self.shared.accumulate_window(
            self.classifier.current(),
            window.duration().num_seconds().max(0),
        );
    }

    fn fire_reminder(&mut self) {
        // The floor interval is far longer than the response window, so an
        // occupied slot here means a wait that somehow never resolved. It is
        // timed out rather than left dangling.
        if let Some(previous) = self.shared.pending_reminder() {
            warn!("Reminder {} was still unresolved at the next firing", previous.id);
            self.shared
                .resolve_reminder(previous.id, self.time_provider.time(), ReminderOutcome::TimedOut);
        }

        let event = self
            .scheduler
            .fire(self.time_provider.instant(), self.time_provider.time());
        info!(
            "Firing reminder {} at {} cadence",
            event.id, event.state_at_fire
        );
        self.shared.begin_reminder(event.clone());

        let wait = ResponseWait::new(
            self.shared.clone(),
            self.notifier.clone(),
            self.time_provider.clone(),
            self.response_window,
            self.shutdown.clone(),
        );
        tokio::spawn(wait.run(event));
    }

    async fn persist(&self) -> Result<()> {
        let record = self.shared.to_record(self.session_date);
        self.storage.store_session(&record).await
    }

    async fn checkpoint(&self) {
        // A failed write is retried once; after that the session lives on in
        // memory until the next checkpoint or shutdown.
        if let Err(first) = self.persist().await {
            warn!("Failed to checkpoint session, retrying once {first:?}");
            if let Err(second) = self.persist().await {
                error!("Checkpoint retry failed, continuing in memory {second:?}");
            }
        } else {
            debug!("Checkpointed session {}", self.session_date);
        }
    }

    async fn finalize(&mut self) -> Result<()> {
        if let Some(pending) = self.shared.pending_reminder() {
            self.shared
                .resolve_reminder(pending.id, self.time_provider.time(), ReminderOutcome::TimedOut);
        }
        self.checkpoint().await;
        Ok(())
    }
}
