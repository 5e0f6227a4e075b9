//! Listener tasks translating bus events into DogStatsD datagrams

use std::sync::{Arc, Mutex};

use ha_core::events::{LogbookEntryData, StateChangedData};
use ha_core::State;
use ha_dogstatsd::{DogstatsdClient, TagGroup};
use ha_event_bus::EventBus;
use ha_state_store::{SharedStateStore, StateStore};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Title carried by every forwarded logbook event
const EVENT_TITLE: &str = "Home Assistant";

/// Spawn the task forwarding state changes as gauges
///
/// The subscription is taken before the task is spawned so no event fired
/// after this call is missed.
pub(crate) fn spawn_state_listener(
    bus: &EventBus,
    client: Arc<Mutex<DogstatsdClient>>,
    sample_rate: f32,
) -> JoinHandle<()> {
    let mut rx = bus.subscribe_typed::<StateChangedData>();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => handle_state_changed(&client, &event.data, sample_rate),
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "State change listener lagged, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("State change listener stopped");
    })
}

/// Spawn the task forwarding logbook entries as Datadog events
pub(crate) fn spawn_logbook_listener(
    bus: &EventBus,
    states: SharedStateStore,
    client: Arc<Mutex<DogstatsdClient>>,
) -> JoinHandle<()> {
    let mut rx = bus.subscribe_typed::<LogbookEntryData>();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => handle_logbook_entry(&client, &states, &event.data),
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Logbook listener lagged, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("Logbook listener stopped");
    })
}

/// Gauge one state change.
///
/// Removed entities (no new state) and entities whose state is not yet
/// known produce nothing. Boolean attributes gauge as 0/1, numeric
/// attributes as their value, everything else is ignored. The state value
/// itself gauges under the bare domain name when it parses as a number;
/// a non-numeric value skips that gauge without logging. Every gauge
/// carries the entity tag, plus entity_type when the state exposes a
/// device class.
fn handle_state_changed(
    client: &Mutex<DogstatsdClient>,
    data: &StateChangedData,
    sample_rate: f32,
) {
    let Some(state) = data.new_state.as_ref() else {
        return;
    };
    if state.is_unknown() {
        return;
    }

    let domain = state.entity_id.domain();
    let mut tags = TagGroup::default();
    tags.add_tag("entity", state.entity_id.to_string());
    if let Some(device_class) = device_class_from_state(Some(state)) {
        tags.add_tag("entity_type", device_class);
    }

    let mut client = client.lock().unwrap();
    for (key, value) in &state.attributes {
        let name = format!("{}.{}", domain, key.replace(' ', "_"));
        match value {
            Value::Bool(b) => client
                .gauge_with_tags(&name, *b as i64, &tags)
                .with_sample_rate(sample_rate)
                .send(),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    client
                        .gauge_with_tags(&name, i, &tags)
                        .with_sample_rate(sample_rate)
                        .send();
                } else if let Some(f) = n.as_f64() {
                    client
                        .gauge_float_with_tags(&name, f, &tags)
                        .with_sample_rate(sample_rate)
                        .send();
                }
            }
            _ => {}
        }
    }

    if let Some(value) = state.numeric_value() {
        client
            .gauge_float_with_tags(domain, value, &tags)
            .with_sample_rate(sample_rate)
            .send();
    }
}

/// Forward one logbook entry as a Datadog event.
///
/// Entity and domain tags are added only when the entry carries them; the
/// entity_type tag is added when the entity's current state exposes a
/// device class.
fn handle_logbook_entry(
    client: &Mutex<DogstatsdClient>,
    states: &StateStore,
    data: &LogbookEntryData,
) {
    let mut tags = TagGroup::default();
    if let Some(entity_id) = &data.entity_id {
        tags.add_tag("entity", entity_id.to_string());
    }
    if let Some(domain) = &data.domain {
        tags.add_tag("domain", domain);
    }

    let state = data
        .entity_id
        .as_ref()
        .and_then(|id| states.get(&id.to_string()));
    if let Some(device_class) = device_class_from_state(state.as_ref()) {
        tags.add_tag("entity_type", device_class);
    }

    let text = format!("%%% \n **{}** {} \n %%%", data.name, data.message);

    let mut client = client.lock().unwrap();
    client.event_with_tags(EVENT_TITLE, &text, &tags).send();
}

/// Read the device class out of a state, if any
pub fn device_class_from_state(state: Option<&State>) -> Option<String> {
    state.and_then(|s| s.attribute::<String>("device_class"))
}
