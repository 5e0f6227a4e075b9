//! Core event model shared by the bus and its consumers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Context;

/// Payload types that can ride on the event bus
///
/// Implementors tie a data shape to the event type string it is fired
/// under, which is what typed subscriptions key on.
pub trait EventData: Clone + Send + Sync + 'static {
    /// The event type string this payload is fired under
    fn event_type() -> &'static str;
}

/// Identifier naming a kind of event, such as "state_changed"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventType(String);

impl EventType {
    /// Wrap a raw event type string
    pub fn new(event_type: impl Into<String>) -> Self {
        Self(event_type.into())
    }

    /// View the identifier as a plain string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single occurrence on the event bus
///
/// Generic over its payload so the same envelope serves both raw JSON
/// traffic and decoded typed events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T = serde_json::Value> {
    /// What kind of event this is
    pub event_type: EventType,

    /// The payload
    pub data: T,

    /// Where the event came from
    pub origin: EventOrigin,

    /// When the event was fired
    pub time_fired: DateTime<Utc>,

    /// Context tracking origin and causality of the change
    pub context: Context,
}

impl<T> Event<T> {
    /// Build a locally originated event stamped with the current time
    pub fn new(event_type: impl Into<EventType>, data: T, context: Context) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            origin: EventOrigin::default(),
            time_fired: Utc::now(),
            context,
        }
    }
}

/// Where an event originated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOrigin {
    /// Fired by this instance
    #[default]
    Local,
    /// Relayed from a remote instance
    Remote,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{LogbookEntryData, LOGBOOK_ENTRY};

    #[test]
    fn test_new_event_is_local_and_keeps_its_type() {
        let data = LogbookEntryData {
            name: "Front Door".to_string(),
            message: "was opened".to_string(),
            entity_id: None,
            domain: None,
        };
        let event = Event::new(LogbookEntryData::event_type(), data, Context::new());
        assert_eq!(event.event_type.as_str(), LOGBOOK_ENTRY);
        assert_eq!(event.origin, EventOrigin::Local);
    }

    #[test]
    fn test_event_serializes_with_json_data() {
        let event = Event::new(
            "custom_event",
            serde_json::json!({"answer": 42}),
            Context::new(),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "custom_event");
        assert_eq!(json["data"]["answer"], 42);
        assert_eq!(json["origin"], "local");
    }
}
