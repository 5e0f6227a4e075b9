//! Core types for the Home Assistant Datadog forwarder
//!
//! This crate provides the fundamental types shared by the event bus, the
//! state store and the integration itself: EntityId, State, Event, Context.

mod context;
mod entity_id;
mod event;
mod state;

pub use context::Context;
pub use entity_id::{EntityId, EntityIdError};
pub use event::{Event, EventData, EventOrigin, EventType};
pub use state::State;

/// State value reported while an entity's real state is not yet known
pub const STATE_UNKNOWN: &str = "unknown";

/// Standard event types consumed by the forwarder
pub mod events {
    use super::*;

    /// Event type for state changes
    pub const STATE_CHANGED: &str = "state_changed";

    /// Event type for human-readable logbook entries
    pub const LOGBOOK_ENTRY: &str = "logbook_entry";

    /// Data for STATE_CHANGED events
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct StateChangedData {
        pub entity_id: EntityId,
        pub old_state: Option<State>,
        pub new_state: Option<State>,
    }

    impl EventData for StateChangedData {
        fn event_type() -> &'static str {
            STATE_CHANGED
        }
    }

    /// Data for LOGBOOK_ENTRY events
    ///
    /// `name` and `message` are always present; the entity reference is not,
    /// e.g. for entries written about the host itself.
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct LogbookEntryData {
        pub name: String,
        pub message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub entity_id: Option<EntityId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub domain: Option<String>,
    }

    impl EventData for LogbookEntryData {
        fn event_type() -> &'static str {
            LOGBOOK_ENTRY
        }
    }
}
