//! Typed publish/subscribe bus for pipeline progress events.

use crate::segment::Segment;
use serde::Serialize;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;
use tracing::error;

/// Notification published by the pipeline for the host application.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A listening session began.
    SessionStarted {
        source_language: String,
        target_language: String,
    },
    /// The active session ended.
    SessionEnded,
    /// A finalized recognition result produced a new segment.
    SegmentCreated { segment: Segment },
    /// A segment advanced along its lifecycle.
    SegmentUpdated { segment: Segment },
    /// A segment's audio finished playing.
    SegmentCompleted { segment: Segment },
    /// A segment failed and was abandoned.
    SegmentError { segment: Segment, error: String },
    /// Capture-while-speaking was toggled.
    SimultaneousCaptureChanged { enabled: bool },
}

impl SessionEvent {
    /// The kind used for subscription routing.
    pub fn kind(&self) -> EventKind {
        match self {
            SessionEvent::SessionStarted { .. } => EventKind::SessionStarted,
            SessionEvent::SessionEnded => EventKind::SessionEnded,
            SessionEvent::SegmentCreated { .. } => EventKind::SegmentCreated,
            SessionEvent::SegmentUpdated { .. } => EventKind::SegmentUpdated,
            SessionEvent::SegmentCompleted { .. } => EventKind::SegmentCompleted,
            SessionEvent::SegmentError { .. } => EventKind::SegmentError,
            SessionEvent::SimultaneousCaptureChanged { .. } => EventKind::SimultaneousCaptureChanged,
        }
    }
}

/// Subscription key, one per [`SessionEvent`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SessionStarted,
    SessionEnded,
    SegmentCreated,
    SegmentUpdated,
    SegmentCompleted,
    SegmentError,
    SimultaneousCaptureChanged,
}

impl EventKind {
    /// Every subscribable kind.
    pub const ALL: [EventKind; 7] = [
        EventKind::SessionStarted,
        EventKind::SessionEnded,
        EventKind::SegmentCreated,
        EventKind::SegmentUpdated,
        EventKind::SegmentCompleted,
        EventKind::SegmentError,
        EventKind::SimultaneousCaptureChanged,
    ];
}

/// Identifier returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerId(u64);

type Handler = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

#[derive(Default)]
struct BusInner {
    next_id: u64,
    handlers: HashMap<EventKind, Vec<(HandlerId, Handler)>>,
    waiters: HashMap<EventKind, Vec<oneshot::Sender<SessionEvent>>>,
}

/// Typed publish/subscribe mechanism.
///
/// Delivery is synchronous and in registration order. Past events are not
/// replayed: late subscribers miss prior emissions.
#[derive(Default)]
pub struct EventBus {
    inner: Mutex<BusInner>,
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for one event kind.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = HandlerId(inner.next_id);
        inner.next_id += 1;
        inner
            .handlers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Removes one handler, or every handler for `kind` when `handler` is None.
    pub fn unsubscribe(&self, kind: EventKind, handler: Option<HandlerId>) {
        let mut inner = self.lock();
        match handler {
            Some(id) => {
                if let Some(list) = inner.handlers.get_mut(&kind) {
                    list.retain(|(handler_id, _)| *handler_id != id);
                }
            }
            None => {
                inner.handlers.remove(&kind);
            }
        }
    }

    /// Delivers an event to every handler registered for its kind.
    ///
    /// A panicking handler is caught and logged; delivery to the remaining
    /// handlers continues and the publisher never observes the panic.
    pub fn publish(&self, event: SessionEvent) {
        let kind = event.kind();
        let (handlers, waiters) = {
            let mut inner = self.lock();
            let handlers: Vec<Handler> = inner
                .handlers
                .get(&kind)
                .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
                .unwrap_or_default();
            let waiters = inner.waiters.remove(&kind).unwrap_or_default();
            (handlers, waiters)
        };

        // Handlers run outside the lock so they may subscribe or publish.
        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| (*handler)(&event))).is_err() {
                error!(?kind, "event handler panicked; continuing delivery");
            }
        }

        for waiter in waiters {
            let _ = waiter.send(event.clone());
        }
    }

    /// Resolves with the next event of `kind`.
    pub async fn next(&self, kind: EventKind) -> SessionEvent {
        let receiver = {
            let (tx, rx) = oneshot::channel();
            let mut inner = self.lock();
            inner.waiters.entry(kind).or_default().push(tx);
            rx
        };
        match receiver.await {
            Ok(event) => event,
            // The sender lives in the bus borrowed by this future; it cannot
            // drop while we are pending, so an error never resolves.
            Err(_) => std::future::pending().await,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
