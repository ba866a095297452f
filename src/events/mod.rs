//! In-process event bus.
//!
//! Channels are keyed by event type. Publishing to a type nobody subscribed to
//! is a no-op; slow subscribers lose the oldest events once their buffer fills.

use dashmap::DashMap;
use serde::Serialize;
use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

const CHANNEL_CAPACITY: usize = 100;

type Payload = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
pub struct EventBus {
    channels: Arc<DashMap<TypeId, broadcast::Sender<Payload>>>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    /// Per-type buffer size for new channels.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Publish an event. Returns the number of subscribers it reached.
    pub fn publish<E: Clone + Send + Sync + 'static>(&self, event: E) -> usize {
        let Some(sender) = self.channels.get(&TypeId::of::<E>()) else {
            return 0;
        };
        sender.send(Arc::new(event)).unwrap_or(0)
    }

    pub fn subscribe<E: Clone + Send + Sync + 'static>(&self) -> EventReceiver<E> {
        let sender = self
            .channels
            .entry(TypeId::of::<E>())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        EventReceiver {
            inner: sender.subscribe(),
            _event: PhantomData,
        }
    }

    pub fn subscriber_count<E: 'static>(&self) -> usize {
        self.channels
            .get(&TypeId::of::<E>())
            .map_or(0, |sender| sender.receiver_count())
    }
}

/// Typed receiving end of a subscription.
pub struct EventReceiver<E> {
    inner: broadcast::Receiver<Payload>,
    _event: PhantomData<fn() -> E>,
}

impl<E: Clone + Send + Sync + 'static> EventReceiver<E> {
    /// Wait for the next event. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<E> {
        loop {
            match self.inner.recv().await {
                Ok(payload) => {
                    if let Some(event) = payload.downcast_ref::<E>() {
                        return Some(event.clone());
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event subscriber lagged behind");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next event if one is already buffered.
    pub fn try_recv(&mut self) -> Option<E> {
        loop {
            match self.inner.try_recv() {
                Ok(payload) => {
                    if let Some(event) = payload.downcast_ref::<E>() {
                        return Some(event.clone());
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event subscriber lagged behind");
                }
                Err(_) => return None,
            }
        }
    }
}

/// Published by the dispatcher for every request it handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DispatchEvent {
    Matched {
        method: String,
        path: String,
        pattern: String,
    },
    NotFound {
        method: String,
        path: String,
    },
    Completed {
        method: String,
        path: String,
        status: u16,
    },
    Failed {
        method: String,
        path: String,
        kind: &'static str,
        message: String,
    },
}
