//! Contains logic for observing raw keyboard/mouse input in different
//! environments. [GenericInputSource] is the main artifact of this module that
//! abstracts over the available hook backends.

#[cfg(feature = "hooks")]
pub mod hooks;

use std::collections::VecDeque;

use anyhow::Result;
use chrono::{DateTime, Utc};

/// Kind of raw input that was observed. Scrolling counts as mouse movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEventKind {
    Key,
    MouseMove,
    MouseClick,
}

pub const EVENT_KIND_COUNT: u8 = 3;

impl InputEventKind {
    fn bit(self) -> u8 {
        match self {
            InputEventKind::Key => 1,
            InputEventKind::MouseMove => 1 << 1,
            InputEventKind::MouseClick => 1 << 2,
        }
    }
}

/// A single observed input event. These only live long enough to be counted
/// into the current activity window and are never persisted.
#[derive(Debug, Clone, Copy)]
pub struct InputEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: InputEventKind,
}

/// Intended to serve as a contract every input hook backend must implement.
///
/// `start` installs the process-wide hooks, `drain_events` hands over
/// everything observed since the previous drain, `stop` disarms the hooks so
/// a shutting down daemon stops accumulating events.
#[cfg_attr(test, mockall::automock)]
pub trait InputSource: Send {
    fn start(&mut self) -> Result<()>;

    fn drain_events(&mut self) -> Result<Vec<InputEvent>>;

    fn stop(&mut self);
}

/// Serves as a cross-compatible InputSource implementation.
pub struct GenericInputSource {
    inner: Box<dyn InputSource>,
}

impl GenericInputSource {
    pub fn new() -> Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "hooks")] {
                Ok(Self {
                    inner: Box::new(hooks::HookedInputSource::default()),
                })
            }
            else {
                // Keeps the project compilable for tests without a hook backend.
                anyhow::bail!("sipwatch was built without an input hook backend")
            }
        }
    }
}

impl InputSource for GenericInputSource {
    fn start(&mut self) -> Result<()> {
        self.inner.start()
    }

    fn drain_events(&mut self) -> Result<Vec<InputEvent>> {
        self.inner.drain_events()
    }

    fn stop(&mut self) {
        self.inner.stop()
    }
}

/// Bounded fifo the hook callbacks push into. The callback side must never
/// block, so overflow drops the oldest event instead of waiting for space.
#[derive(Debug)]
pub struct EventQueue {
    events: VecDeque<InputEvent>,
    capacity: usize,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue without capacity can't hold anything");
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, event: InputEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<InputEvent> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Tracks which event kinds appeared in a window without storing the events
/// themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct KindSet(u8);

impl KindSet {
    pub fn insert(&mut self, kind: InputEventKind) {
        self.0 |= kind.bit();
    }

    pub fn count(&self) -> u8 {
        self.0.count_ones() as u8
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{EventQueue, InputEvent, InputEventKind, KindSet};

    fn event(kind: InputEventKind) -> InputEvent {
        InputEvent {
            timestamp: Utc::now(),
            kind,
        }
    }

    #[test]
    fn test_queue_drops_oldest_on_overflow() {
        let mut queue = EventQueue::new(2);
        queue.push(event(InputEventKind::Key));
        queue.push(event(InputEventKind::MouseMove));
        queue.push(event(InputEventKind::MouseClick));

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].kind, InputEventKind::MouseMove);
        assert_eq!(drained[1].kind, InputEventKind::MouseClick);
    }

    #[test]
    fn test_queue_drain_empties() {
        let mut queue = EventQueue::new(4);
        queue.push(event(InputEventKind::Key));
        assert_eq!(queue.len(), 1);
        queue.drain();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_kind_set_deduplicates() {
        let mut kinds = KindSet::default();
        kinds.insert(InputEventKind::Key);
        kinds.insert(InputEventKind::Key);
        assert_eq!(kinds.count(), 1);
        kinds.insert(InputEventKind::MouseMove);
        kinds.insert(InputEventKind::MouseClick);
        assert_eq!(kinds.count(), 3);
    }
}
