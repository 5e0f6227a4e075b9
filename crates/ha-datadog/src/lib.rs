//! Datadog integration for Home Assistant
//!
//! Forwards Home Assistant activity to a Datadog agent over DogStatsD:
//! state changes become gauges (numeric attributes and the state value
//! itself), logbook entries become Datadog events. One config entry owns
//! one UDP client; listener tasks are spawned at setup and torn down at
//! unload.

mod config;
pub use config::{
    DatadogConfig, DatadogError, DatadogResult, CONF_HOST, CONF_PORT, CONF_PREFIX, CONF_RATE,
    DEFAULT_HOST, DEFAULT_PORT, DEFAULT_PREFIX, DEFAULT_RATE,
};

mod listeners;
pub use listeners::device_class_from_state;

use std::sync::{Arc, Mutex};

use ha_config_entries::{ConfigEntries, ConfigEntry};
use ha_dogstatsd::DogstatsdClient;
use ha_event_bus::{EventBus, SharedEventBus};
use ha_state_store::SharedStateStore;
use tracing::{debug, info};

/// Integration domain
pub const DOMAIN: &str = "datadog";

/// Per-entry runtime state, owned from setup to unload
struct DatadogRuntime {
    client: Arc<Mutex<DogstatsdClient>>,
}

/// Install the integration's setup and unload handlers on the manager
pub fn register(entries: &ConfigEntries, bus: SharedEventBus, states: SharedStateStore) {
    entries.register_setup_handler(
        DOMAIN,
        Arc::new(move |entry| setup_entry(&bus, &states, entry).map_err(|e| e.to_string())),
    );
    entries.register_unload_handler(
        DOMAIN,
        Arc::new(|entry| unload_entry(entry).map_err(|e| e.to_string())),
    );
}

/// Set up one config entry: build the client and spawn the listeners.
///
/// Only configuration parsing, endpoint resolution and socket binding can
/// fail; everything after that succeeds unconditionally. Must be called
/// from within a tokio runtime.
pub fn setup_entry(
    bus: &EventBus,
    states: &SharedStateStore,
    entry: &ConfigEntry,
) -> DatadogResult<()> {
    let config = DatadogConfig::from_entry(entry)?;
    let addr = config.resolve()?;
    let client = Arc::new(Mutex::new(DogstatsdClient::udp(addr, config.prefix.clone())?));

    info!(
        entry_id = %entry.entry_id,
        endpoint = %addr,
        prefix = %config.prefix,
        "Starting Datadog forwarder"
    );

    let state_task = listeners::spawn_state_listener(bus, client.clone(), config.sample_rate);
    let logbook_task = listeners::spawn_logbook_listener(bus, states.clone(), client.clone());
    entry.on_unload(move || state_task.abort());
    entry.on_unload(move || logbook_task.abort());

    entry.set_runtime_data(DatadogRuntime { client });
    Ok(())
}

/// Unload one config entry: flush buffered datagrams and release the
/// socket. The listener tasks are aborted by the unload hooks the manager
/// runs after this handler.
pub fn unload_entry(entry: &ConfigEntry) -> DatadogResult<()> {
    let Some(runtime) = entry.take_runtime_data::<DatadogRuntime>() else {
        debug!(entry_id = %entry.entry_id, "No runtime data, nothing to unload");
        return Ok(());
    };

    let mut client = runtime.client.lock().unwrap();
    client.flush();
    client.close_socket();
    info!(entry_id = %entry.entry_id, "Stopped Datadog forwarder");
    Ok(())
}
