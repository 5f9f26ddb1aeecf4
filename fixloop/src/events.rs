//! One-directional progress channel from the worker to an observer.
//!
//! Multi-producer, single-consumer, unbounded. Emission never blocks on the
//! observer; draining is poll-based and never blocks on the worker. Growth
//! is unbounded if the observer never drains.

use std::sync::mpsc::{self, Receiver, Sender};

use tracing::debug;

use crate::core::event::Event;

/// Producer handle for publishing events.
///
/// Cloneable so the engine and the submitting thread can both publish onto
/// the same channel.
#[derive(Clone)]
pub struct EventSink {
    tx: Sender<Event>,
}

impl EventSink {
    /// Publish an event. Never blocks; if the observer end is gone the event
    /// is dropped, because progress reporting must not take the worker down.
    pub fn emit(&self, event: Event) {
        if self.tx.send(event).is_err() {
            debug!("event channel closed, dropping event");
        }
    }
}

/// Consumer handle. Single consumer by construction: the receiver is not
/// cloneable.
pub struct EventStream {
    rx: Receiver<Event>,
}

impl EventStream {
    /// Take all currently available events without blocking, preserving
    /// emission order. Returns an empty vec when nothing is pending.
    pub fn drain(&self) -> Vec<Event> {
        self.rx.try_iter().collect()
    }
}

/// Create a connected sink/stream pair.
pub fn event_channel() -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::channel();
    (EventSink { tx }, EventStream { rx })
}
