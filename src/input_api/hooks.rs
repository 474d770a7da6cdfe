use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use anyhow::{anyhow, Result};
use chrono::Utc;
use rdev::EventType;
use tracing::{error, info};

use super::{EventQueue, InputEvent, InputEventKind, InputSource};

/// Events a user can realistically produce between two one-second drains is
/// far below this, so the bound only matters when draining stalls.
const QUEUE_CAPACITY: usize = 4096;

/// [InputSource] backed by process-wide rdev hooks.
///
/// rdev offers no way to tear a listener down, so the hook thread stays for
/// the process lifetime. `stop` disarms the callback instead, which leaves
/// the queue untouched from that point on.
pub struct HookedInputSource {
    queue: Arc<Mutex<EventQueue>>,
    armed: Arc<AtomicBool>,
    started: bool,
}

impl Default for HookedInputSource {
    fn default() -> Self {
        Self {
            queue: Arc::new(Mutex::new(EventQueue::new(QUEUE_CAPACITY))),
            armed: Arc::new(AtomicBool::new(false)),
            started: false,
        }
    }
}

fn map_event(event_type: &EventType) -> Option<InputEventKind> {
    match event_type {
        EventType::KeyPress(_) => Some(InputEventKind::Key),
        EventType::ButtonPress(_) => Some(InputEventKind::MouseClick),
        EventType::MouseMove { .. } | EventType::Wheel { .. } => Some(InputEventKind::MouseMove),
        EventType::KeyRelease(_) | EventType::ButtonRelease(_) => None,
    }
}

impl InputSource for HookedInputSource {
    fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }

        let queue = self.queue.clone();
        let armed = self.armed.clone();
        armed.store(true, Ordering::Release);

        // The callback runs on the hook thread and must never block on
        // anything slower than this mutex, which is only ever held for a
        // push or a drain.
        let (startup_tx, startup_rx) = std::sync::mpsc::channel::<Result<()>>();
        std::thread::spawn(move || {
            let callback_armed = armed.clone();
            let result = rdev::listen(move |event| {
                if !callback_armed.load(Ordering::Acquire) {
                    return;
                }
                if let Some(kind) = map_event(&event.event_type) {
                    if let Ok(mut queue) = queue.lock() {
                        queue.push(InputEvent {
                            timestamp: Utc::now(),
                            kind,
                        });
                    }
                }
            });
            if let Err(e) = result {
                error!("Input hook listener stopped: {e:?}");
                let _ = startup_tx.send(Err(anyhow!("failed to install input hooks: {e:?}")));
            }
        });

        // rdev reports registration failures through the listen result, so a
        // quickly failing thread is the only signal we get.
        std::thread::sleep(std::time::Duration::from_millis(200));
        if let Ok(Err(e)) = startup_rx.try_recv() {
            return Err(e);
        }

        info!("Input hooks installed");
        self.started = true;
        Ok(())
    }

    fn drain_events(&mut self) -> Result<Vec<InputEvent>> {
        let mut queue = self
            .queue
            .lock()
            .map_err(|_| anyhow!("input queue poisoned by a dead hook thread"))?;
        Ok(queue.drain())
    }

    fn stop(&mut self) {
        self.armed.store(false, Ordering::Release);
    }
}
