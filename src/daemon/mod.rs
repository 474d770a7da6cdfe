use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use chrono::NaiveDate;
use classifier::{ActivityClassifier, ActivityWindow};
use config::DaemonConfig;
use monitor::MonitorModule;
use notify::{ConsoleNotifier, Notifier};
use recorder::InputCollectionModule;
use scheduler::ReminderScheduler;
use stats::SharedState;
use storage::stats_storage::{StatsStorage, StatsStorageImpl};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::{
    input_api::{GenericInputSource, InputSource},
    utils::clock::{Clock, DefaultClock},
};

pub mod args;
pub mod classifier;
pub mod config;
pub mod monitor;
pub mod notify;
pub mod recorder;
pub mod responder;
pub mod scheduler;
pub mod shutdown;
pub mod stats;
pub mod storage;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: PathBuf) -> Result<()> {
    std::env::set_current_dir("/")?;

    let config = DaemonConfig::load(&dir)?;
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);

    let storage = StatsStorageImpl::new(dir.join("sessions"))?;
    let session_date = clock.today();
    // The store is read once here; from now on it is only written.
    let resumed = match storage.load_session(session_date).await {
        Ok(v) => v,
        Err(e) => {
            warn!("Couldn't read the previous session, starting empty {e:?}");
            None
        }
    };
    let shared = SharedState::new(resumed);

    let (sender, receiver) = mpsc::channel::<ActivityWindow>(10);

    let shutdown_token = CancellationToken::new();

    // A missing hook backend only takes activity detection down, reminders
    // keep firing on the base cadence.
    let collector = match GenericInputSource::new() {
        Ok(source) => Some(create_collector(
            sender,
            Box::new(source),
            &config,
            &shutdown_token,
            clock.clone(),
        )),
        Err(e) => {
            drop(sender);
            error!("Input hooks are unavailable, activity detection is disabled {e:?}");
            None
        }
    };

    let monitor = create_monitor(
        receiver,
        &config,
        Arc::new(ConsoleNotifier),
        shared,
        storage,
        session_date,
        &shutdown_token,
        clock,
    );

    let (_, collection_result, monitor_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token),
        async {
            match collector {
                Some(collector) => collector.run().await,
                None => Ok(()),
            }
        },
        monitor.run(),
    );

    if let Err(collection_result) = collection_result {
        error!("Collection module got an error {:?}", collection_result);
    }

    if let Err(monitor_result) = monitor_result {
        error!("Monitor module got an error {:?}", monitor_result);
    }

    Ok(())
}

fn create_collector(
    sender: mpsc::Sender<ActivityWindow>,
    source: Box<dyn InputSource>,
    config: &DaemonConfig,
    shutdown_token: &CancellationToken,
    clock: Arc<dyn Clock>,
) -> InputCollectionModule {
    InputCollectionModule::new(
        sender,
        source,
        shutdown_token.clone(),
        chrono::Duration::seconds(config.classifier.window_secs as i64),
        DEFAULT_POLL_INTERVAL,
        clock,
    )
}

#[allow(clippy::too_many_arguments)]
fn create_monitor<N: Notifier, S: StatsStorage>(
    receiver: mpsc::Receiver<ActivityWindow>,
    config: &DaemonConfig,
    notifier: Arc<N>,
    shared: SharedState,
    storage: S,
    session_date: NaiveDate,
    shutdown_token: &CancellationToken,
    clock: Arc<dyn Clock>,
) -> MonitorModule<N, S> {
    let first_id = shared.last_reminder_id();
    MonitorModule::new(
        receiver,
        ActivityClassifier::new(config.classifier.clone()),
        ReminderScheduler::new(config.scheduler.clone(), clock.instant(), first_id),
        notifier,
        shared,
        storage,
        session_date,
        Duration::from_secs(config.responses.response_window_secs as u64),
        Duration::from_secs(config.responses.checkpoint_mins as u64 * 60),
        shutdown_token.clone(),
        clock,
    )
}

#[cfg(test)]
mod daemon_tests {
    use std::{sync::Arc, time::Duration};

    use anyhow::Result;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use crate::{
        daemon::{
            classifier::ActivityWindow,
            config::{ClassifierConfig, DaemonConfig, ResponseConfig, SchedulerConfig},
            create_collector, create_monitor,
            notify::{MockNotifier, ReminderChoice},
            stats::SharedState,
            storage::stats_storage::{StatsStorage, StatsStorageImpl},
        },
        input_api::{InputEvent, InputEventKind, MockInputSource},
        utils::{
            clock::{Clock, TestClock},
            logging::TEST_LOGGING,
        },
    };

    fn smoke_config() -> DaemonConfig {
        DaemonConfig {
            classifier: ClassifierConfig {
                window_secs: 2,
                ..ClassifierConfig::default()
            },
            scheduler: SchedulerConfig {
                base_interval_mins: 1,
                min_interval_mins: 1,
                ..SchedulerConfig::default()
            },
            responses: ResponseConfig {
                response_window_secs: 5,
                checkpoint_mins: 1,
            },
        }
    }

    /// Very simple smoke test to check if the application is working
    /// properly: input flows in, a reminder fires, the answer ends up in the
    /// session file.
    #[tokio::test(start_paused = true)]
    async fn smoke_test_daemon() -> Result<()> {
        *TEST_LOGGING;
        let config = smoke_config();
        let clock = TestClock::starting_at(Utc.with_ymd_and_hms(2025, 3, 7, 8, 0, 0).unwrap());

        let mut mock_input_source = MockInputSource::new();
        mock_input_source.expect_start().returning(|| Ok(()));
        mock_input_source.expect_drain_events().returning(|| {
            Ok(vec![
                InputEvent {
                    timestamp: Utc::now(),
                    kind: InputEventKind::Key,
                },
                InputEvent {
                    timestamp: Utc::now(),
                    kind: InputEventKind::MouseMove,
                },
            ])
        });
        mock_input_source.expect_stop().return_const(());

        let mut mock_notifier = MockNotifier::new();
        mock_notifier
            .expect_prompt()
            .returning(|_| Ok(Some(ReminderChoice::Drank)));

        let shutdown_token = CancellationToken::new();
        let (sender, receiver) = mpsc::channel::<ActivityWindow>(10);

        let collector = create_collector(
            sender,
            Box::new(mock_input_source),
            &config,
            &shutdown_token,
            Arc::new(clock.clone()),
        );

        let dir = tempdir()?;
        let storage = StatsStorageImpl::new(dir.path().to_path_buf())?;
        let shared = SharedState::new(None);

        let monitor = create_monitor(
            receiver,
            &config,
            Arc::new(mock_notifier),
            shared,
            storage,
            clock.today(),
            &shutdown_token,
            Arc::new(clock.clone()),
        );

        let (_, collection_result, monitor_result) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_secs(150)).await;
                shutdown_token.cancel()
            },
            collector.run(),
            monitor.run(),
        );

        collection_result?;
        monitor_result?;

        let storage = StatsStorageImpl::new(dir.path().to_path_buf())?;
        let record = storage.load_session(clock.today()).await?.unwrap();

        // Two reminders fit into 150 virtual seconds on the 1 minute cadence.
        assert!(record.stats.total_reminders >= 1);
        assert_eq!(record.stats.drank_count, record.stats.total_reminders);
        assert!(record.stats.activity.total() > 0);
        assert_eq!(record.history.len(), record.stats.total_reminders as usize);
        Ok(())
    }
}
