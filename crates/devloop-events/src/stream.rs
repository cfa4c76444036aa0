//! Ordered event stream with asynchronous fan-out
//!
//! Every accepted event gets the next id, lands in the history and is queued
//! for delivery. A single delivery task hands events to subscribers strictly
//! in id order; subscribers run one after another in subscription order.
//! Because adding only enqueues, subscribers may add events from inside
//! [`EventSubscriber::on_event`].

use crate::error::EventError;
use crate::event::{Event, EventId, EventPayload, EventSource};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Receives every event added to a stream
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Called once per event, in id order
    async fn on_event(&self, event: Arc<Event>);
}

/// Handle returned by [`EventStream::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

enum Envelope {
    Deliver(Arc<Event>),
    Flush(oneshot::Sender<()>),
}

struct Ledger {
    history: Vec<Arc<Event>>,
    sender: Option<mpsc::UnboundedSender<Envelope>>,
}

type SubscriberList = Vec<(SubscriberId, Arc<dyn EventSubscriber>)>;

struct Shared {
    ledger: Mutex<Ledger>,
    subscribers: RwLock<SubscriberList>,
    next_subscriber: AtomicU64,
}

/// Cloneable handle to one event stream
#[derive(Clone)]
pub struct EventStream {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("len", &self.len())
            .field("subscribers", &self.shared.subscribers.read().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl EventStream {
    /// Create a stream and spawn its delivery task
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            ledger: Mutex::new(Ledger {
                history: Vec::new(),
                sender: Some(tx),
            }),
            subscribers: RwLock::new(Vec::new()),
            next_subscriber: AtomicU64::new(0),
        });
        tokio::spawn(deliver(Arc::clone(&shared), rx));
        Self { shared }
    }

    /// Register a subscriber for all events added from now on
    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) -> SubscriberId {
        let id = SubscriberId(self.shared.next_subscriber.fetch_add(1, Ordering::Relaxed));
        self.shared.subscribers.write().push((id, subscriber));
        tracing::debug!(subscriber = id.0, "subscribed to event stream");
        id
    }

    /// Remove a subscriber; returns whether it was registered
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.shared.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        before != subscribers.len()
    }

    /// Append an event
    ///
    /// # Errors
    /// `EventError::StreamClosed` once [`close`](Self::close) was called.
    pub fn add_event(
        &self,
        payload: impl Into<EventPayload>,
        source: EventSource,
    ) -> Result<EventId, EventError> {
        self.add_event_with_cause(payload, source, None)
    }

    /// Append an event that responds to an earlier one
    ///
    /// # Errors
    /// `EventError::StreamClosed` once [`close`](Self::close) was called.
    pub fn add_event_with_cause(
        &self,
        payload: impl Into<EventPayload>,
        source: EventSource,
        cause: Option<EventId>,
    ) -> Result<EventId, EventError> {
        let mut ledger = self.shared.ledger.lock();
        let sender = ledger.sender.clone().ok_or(EventError::StreamClosed)?;

        let id = EventId(ledger.history.len() as u64);
        let event = Arc::new(Event {
            id,
            timestamp: Utc::now(),
            source,
            cause,
            payload: payload.into(),
        });
        tracing::debug!(event_id = id.0, %source, message = %event.message(), "event added");

        ledger.history.push(Arc::clone(&event));
        sender
            .send(Envelope::Deliver(event))
            .map_err(|_| EventError::StreamClosed)?;
        Ok(id)
    }

    /// Snapshot of all events so far
    #[must_use]
    pub fn history(&self) -> Vec<Arc<Event>> {
        self.shared.ledger.lock().history.clone()
    }

    /// Event by id
    #[must_use]
    pub fn get(&self, id: EventId) -> Option<Arc<Event>> {
        let index = usize::try_from(id.0).ok()?;
        self.shared.ledger.lock().history.get(index).cloned()
    }

    /// Number of events so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.ledger.lock().history.len()
    }

    /// Whether no event was added yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the stream stopped accepting events
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.ledger.lock().sender.is_none()
    }

    /// Wait until every event added before this call has been delivered
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        let queued = {
            let ledger = self.shared.ledger.lock();
            ledger
                .sender
                .as_ref()
                .is_some_and(|sender| sender.send(Envelope::Flush(tx)).is_ok())
        };
        if queued {
            let _ = rx.await;
        }
    }

    /// Stop accepting events; already queued events are still delivered
    pub fn close(&self) {
        if self.shared.ledger.lock().sender.take().is_some() {
            tracing::debug!("event stream closed");
        }
    }
}

impl Default for EventStream {
    fn default() -> Self {
        Self::new()
    }
}

/// Delivery loop (runs in its own tokio task)
async fn deliver(shared: Arc<Shared>, mut rx: mpsc::UnboundedReceiver<Envelope>) {
    while let Some(envelope) = rx.recv().await {
        match envelope {
            Envelope::Deliver(event) => {
                let subscribers: Vec<Arc<dyn EventSubscriber>> = shared
                    .subscribers
                    .read()
                    .iter()
                    .map(|(_, subscriber)| Arc::clone(subscriber))
                    .collect();
                for subscriber in subscribers {
                    subscriber.on_event(Arc::clone(&event)).await;
                }
                tracing::trace!(event_id = event.id.0, "event delivered");
            }
            Envelope::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}
