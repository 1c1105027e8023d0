//! Lifecycle and progress events, and the bus that delivers them.
//!
//! Delivery is synchronous, on the publishing thread, in subscription order. A listener that
//! returns an error or panics is logged and skipped; the remaining listeners still see the event.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::warn;

/// Something a calculator or writer wants subscribers to know about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// The writer dequeued a file and is about to hash it.
    NewFile { path: String, total_bytes: u64 },
    /// Cumulative bytes read from the current stream.
    ProgressUpdate { bytes_read: u64 },
    /// A file failed and will not appear in the report.
    Error { message: String },
    Paused { message: String },
    Resumed { message: String },
    /// The writer stopped and closed its sink.
    Complete { message: String },
}

impl Event {
    pub const PAUSED: &'static str = "Paused";
    pub const RESUMED: &'static str = "Resuming";
    pub const COMPLETE: &'static str = "Completed";

    pub fn paused() -> Self {
        Event::Paused {
            message: Self::PAUSED.to_string(),
        }
    }

    pub fn resumed() -> Self {
        Event::Resumed {
            message: Self::RESUMED.to_string(),
        }
    }

    pub fn complete() -> Self {
        Event::Complete {
            message: Self::COMPLETE.to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Event::Error {
            message: message.into(),
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::NewFile { .. } => "new-file",
            Event::ProgressUpdate { .. } => "progress",
            Event::Error { .. } => "error",
            Event::Paused { .. } => "paused",
            Event::Resumed { .. } => "resumed",
            Event::Complete { .. } => "complete",
        }
    }
}

/// Receives events from an [`EventBus`].
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &Event) -> anyhow::Result<()>;
}

impl<F> EventListener for F
where
    F: Fn(&Event) -> anyhow::Result<()> + Send + Sync,
{
    fn on_event(&self, event: &Event) -> anyhow::Result<()> {
        self(event)
    }
}

/// Handle returned by [`EventBus::subscribe`]; pass it to [`EventBus::unsubscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscribers = Vec<(SubscriptionId, Arc<dyn EventListener>)>;

/// Publish/subscribe channel for [`Event`]s.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    listeners: Mutex<Subscribers>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe_shared(Arc::new(listener))
    }

    /// Subscribe a listener the caller keeps a handle to (e.g. to read its state afterwards).
    pub fn subscribe_shared(&self, listener: Arc<dyn EventListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, listener));
        id
    }

    /// Returns false when `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }

    pub fn publish(&self, event: Event) {
        // Deliver from a copy so listeners may (un)subscribe while handling the event.
        let listeners: Vec<Arc<dyn EventListener>> =
            self.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener.on_event(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("listener failed on {} event: {:#}", event.kind(), e),
                Err(_) => warn!("listener panicked on {} event", event.kind()),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Subscribers> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.len())
            .finish()
    }
}
