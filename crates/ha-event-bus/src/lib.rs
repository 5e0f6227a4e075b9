//! Pub/sub event bus connecting Home Assistant components
//!
//! This crate provides the EventBus, the central message broker that
//! components subscribe to and fire events on. Integrations such as the
//! Datadog forwarder consume state_changed and logbook_entry events
//! through typed subscriptions.

use dashmap::DashMap;
use ha_core::{Context, Event, EventData, EventType};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Capacity of each per-type broadcast channel
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// An event as it travels on the bus, payload still undecoded
pub type RawEvent = Event<serde_json::Value>;

/// Central broker components fire events on and subscribe to
///
/// One broadcast channel per event type, created lazily on first
/// subscription. Firing a type nobody subscribed to is a no-op.
pub struct EventBus {
    /// Broadcast senders keyed by event type
    listeners: DashMap<EventType, broadcast::Sender<RawEvent>>,
    /// Capacity for newly created channels
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            listeners: DashMap::new(),
            capacity,
        }
    }

    /// Subscribe to every event of the given type fired from now on
    pub fn subscribe(&self, event_type: impl Into<EventType>) -> broadcast::Receiver<RawEvent> {
        let event_type = event_type.into();
        trace!(event_type = %event_type, "Adding subscription");

        self.listeners
            .entry(event_type)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Subscribe to `T`'s event type, receiving decoded payloads
    pub fn subscribe_typed<T: EventData + serde::de::DeserializeOwned>(
        &self,
    ) -> TypedEventReceiver<T> {
        TypedEventReceiver::new(self.subscribe(T::event_type()))
    }

    /// Fire an event to all subscribers of its event type
    pub fn fire(&self, event: RawEvent) {
        debug!(event_type = %event.event_type, "Dispatching event");

        if let Some(sender) = self.listeners.get(&event.event_type) {
            // A send error only means there are no live receivers right now
            let _ = sender.send(event);
        }
    }

    /// Serialize a typed payload and fire it under `T`'s event type
    pub fn fire_typed<T: EventData + serde::Serialize>(&self, data: T, context: Context) {
        let payload = serde_json::to_value(&data).unwrap_or_default();
        self.fire(Event::new(T::event_type(), payload, context));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A receiver decoding raw bus events into `T`
pub struct TypedEventReceiver<T> {
    rx: broadcast::Receiver<RawEvent>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: EventData + serde::de::DeserializeOwned> TypedEventReceiver<T> {
    fn new(rx: broadcast::Receiver<RawEvent>) -> Self {
        Self {
            rx,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Receive the next typed event
    ///
    /// Raw events whose payload does not decode as `T` are skipped.
    pub async fn recv(&mut self) -> Result<Event<T>, broadcast::error::RecvError> {
        loop {
            let Event {
                event_type,
                data,
                origin,
                time_fired,
                context,
            } = self.rx.recv().await?;

            match serde_json::from_value::<T>(data) {
                Ok(data) => {
                    return Ok(Event {
                        event_type,
                        data,
                        origin,
                        time_fired,
                        context,
                    })
                }
                // Foreign payload under this event type, wait for the next one
                Err(_) => continue,
            }
        }
    }
}

/// Thread-safe wrapper for EventBus
pub type SharedEventBus = Arc<EventBus>;
