use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info_span, Instrument};

use crate::{
    input_api::{InputEvent, InputSource, KindSet},
    utils::clock::Clock,
};

use super::classifier::ActivityWindow;

/// Collects the raw input stream into fixed-length [ActivityWindow]s.
///
/// The hook callbacks only enqueue; this module drains the queue on a short
/// cadence, counts what it finds into the current window and ships the sealed
/// window downstream. A drain error just means the window stays emptier than
/// reality, which downstream reads as zero activity.
pub struct InputCollectionModule {
    next: mpsc::Sender<ActivityWindow>,
    source: Box<dyn InputSource>,
    shutdown: CancellationToken,
    window_length: chrono::Duration,
    poll_frequency: Duration,
    time_provider: Arc<dyn Clock>,
}

impl InputCollectionModule {
    pub fn new(
        next: mpsc::Sender<ActivityWindow>,
        source: Box<dyn InputSource>,
        shutdown: CancellationToken,
        window_length: chrono::Duration,
        poll_frequency: Duration,
        time_provider: Arc<dyn Clock>,
    ) -> Self {
        Self {
            next,
            source,
            shutdown,
            window_length,
            poll_frequency,
            time_provider,
        }
    }

    /// Executes the collector event loop.
    pub async fn run(mut self) -> Result<()> {
        self.source.start()?;

        let mut poll_point = self.time_provider.instant();
        let mut accumulator = WindowAccumulator::new(self.time_provider.time());
        loop {
            poll_point += self.poll_frequency;

            match self.source.drain_events() {
                Ok(events) => accumulator.absorb(&events),
                Err(e) => {
                    error!("Encountered an error during input collection {:?}", e)
                }
            }

            let now = self.time_provider.time();
            if now - accumulator.window_start() >= self.window_length {
                let window = accumulator.seal(now);
                let span = info_span!("Shipping completed window");
                debug!("Sending window {:?}", window);
                self.next
                    .send(window)
                    .instrument(span)
                    .await
                    .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;
                accumulator = WindowAccumulator::new(now);
            }

            tokio::select! {
                // Cancelation means we stop execution of the event loop. Which
                // means we also drop the sender channel, and the monitor keeps
                // going on its fixed schedule.
                _ = self.shutdown.cancelled() => {
                    self.source.stop();
                    return Ok(())
                }
                _ = self.time_provider.sleep_until(poll_point) => ()
            }
        }
    }
}

/// Counters for the window currently being filled.
struct WindowAccumulator {
    window_start: DateTime<Utc>,
    event_count: u32,
    kinds: KindSet,
}

impl WindowAccumulator {
    fn new(window_start: DateTime<Utc>) -> Self {
        Self {
            window_start,
            event_count: 0,
            kinds: KindSet::default(),
        }
    }

    fn window_start(&self) -> DateTime<Utc> {
        self.window_start
    }

    fn absorb(&mut self, events: &[InputEvent]) {
        for event in events {
            self.event_count += 1;
            self.kinds.insert(event.kind);
        }
    }

    fn seal(&self, window_end: DateTime<Utc>) -> ActivityWindow {
        ActivityWindow {
            window_start: self.window_start,
            window_end,
            event_count: self.event_count,
            distinct_event_kinds: self.kinds.count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use anyhow::{anyhow, Result};
    use chrono::{TimeZone, Utc};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use crate::{
        input_api::{InputEvent, InputEventKind, MockInputSource},
        utils::clock::TestClock,
    };

    use super::InputCollectionModule;

    fn event(kind: InputEventKind) -> InputEvent {
        InputEvent {
            timestamp: Utc::now(),
            kind,
        }
    }

    fn test_clock() -> TestClock {
        TestClock::starting_at(Utc.with_ymd_and_hms(2025, 3, 7, 12, 0, 0).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_windows_are_sealed_and_sent() -> Result<()> {
        let mut source = MockInputSource::new();
        source.expect_start().returning(|| Ok(()));
        source.expect_drain_events().returning(|| {
            Ok(vec![event(InputEventKind::Key), event(InputEventKind::MouseMove)])
        });
        source.expect_stop().return_const(());

        let shutdown = CancellationToken::new();
        let (sender, mut receiver) = mpsc::channel(4);
        let module = InputCollectionModule::new(
            sender,
            Box::new(source),
            shutdown.clone(),
            chrono::Duration::seconds(3),
            Duration::from_secs(1),
            Arc::new(test_clock()),
        );

        let handle = tokio::spawn(module.run());

        let window = receiver.recv().await.unwrap();
        assert!(window.event_count >= 2);
        assert_eq!(window.distinct_event_kinds, 2);
        assert!(window.duration() >= chrono::Duration::seconds(3));

        shutdown.cancel();
        handle.await??;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_hook_failure_stops_the_module() -> Result<()> {
        let mut source = MockInputSource::new();
        source
            .expect_start()
            .returning(|| Err(anyhow!("no accessibility permission")));

        let shutdown = CancellationToken::new();
        let (sender, mut receiver) = mpsc::channel(4);
        let module = InputCollectionModule::new(
            sender,
            Box::new(source),
            shutdown,
            chrono::Duration::seconds(3),
            Duration::from_secs(1),
            Arc::new(test_clock()),
        );

        assert!(module.run().await.is_err());
        // The channel closes with the module, which is the signal the
        // monitor uses to fall back to the fixed schedule.
        assert!(receiver.recv().await.is_none());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_error_produces_empty_window() -> Result<()> {
        let mut source = MockInputSource::new();
        source.expect_start().returning(|| Ok(()));
        source
            .expect_drain_events()
            .returning(|| Err(anyhow!("queue poisoned")));
        source.expect_stop().return_const(());

        let shutdown = CancellationToken::new();
        let (sender, mut receiver) = mpsc::channel(4);
        let module = InputCollectionModule::new(
            sender,
            Box::new(source),
            shutdown.clone(),
            chrono::Duration::seconds(2),
            Duration::from_secs(1),
            Arc::new(test_clock()),
        );

        let handle = tokio::spawn(module.run());

        let window = receiver.recv().await.unwrap();
        assert_eq!(window.event_count, 0);
        assert_eq!(window.distinct_event_kinds, 0);

        shutdown.cancel();
        handle.await??;
        Ok(())
    }
}
