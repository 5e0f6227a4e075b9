//! Shared test fixture: the host pieces an integration runs against.

use std::collections::HashMap;
use std::net::UdpSocket;
use std::sync::Arc;
use std::time::Duration;

use ha_config_entries::ConfigEntries;
use ha_core::{Context, EntityId, State};
use ha_event_bus::EventBus;
use ha_state_store::StateStore;

/// A test instance of Home Assistant wiring bus, states and config entries
pub struct TestHomeAssistant {
    /// Event bus for pub/sub communication
    pub bus: Arc<EventBus>,
    /// State store for entity states
    pub states: Arc<StateStore>,
    /// Config entry manager
    pub entries: Arc<ConfigEntries>,
}

impl TestHomeAssistant {
    /// Create a new test Home Assistant instance
    pub fn new() -> Self {
        let bus = Arc::new(EventBus::new());
        let states = Arc::new(StateStore::new(bus.clone()));
        let entries = Arc::new(ConfigEntries::new());

        Self {
            bus,
            states,
            entries,
        }
    }

    /// Set the state of an entity
    pub fn set_state(
        &self,
        entity_id: &str,
        state: &str,
        attributes: HashMap<String, serde_json::Value>,
    ) -> State {
        let entity_id: EntityId = entity_id.parse().expect("invalid entity_id");
        self.states.set(entity_id, state, attributes, Context::new())
    }

    /// Remove an entity's state
    pub fn remove_state(&self, entity_id: &str) {
        let entity_id: EntityId = entity_id.parse().expect("invalid entity_id");
        self.states.remove(&entity_id, Context::new());
    }
}

impl Default for TestHomeAssistant {
    fn default() -> Self {
        Self::new()
    }
}

/// A local UDP socket standing in for the Datadog agent
pub struct FakeAgent {
    socket: UdpSocket,
}

impl FakeAgent {
    /// Bind on an ephemeral loopback port
    pub fn bind() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").expect("bind agent socket");
        socket
            .set_read_timeout(Some(Duration::from_millis(250)))
            .expect("set agent read timeout");
        Self { socket }
    }

    /// The port the agent listens on
    pub fn port(&self) -> u16 {
        self.socket.local_addr().expect("agent local addr").port()
    }

    /// Collect the datagrams of every payload received until the socket
    /// goes quiet. Batched payloads are split back into datagrams.
    pub fn drain(&self) -> Vec<String> {
        let mut datagrams = Vec::new();
        let mut buf = [0u8; 4096];
        while let Ok((n, _)) = self.socket.recv_from(&mut buf) {
            let payload = std::str::from_utf8(&buf[..n]).expect("utf8 payload");
            datagrams.extend(payload.lines().map(str::to_string));
        }
        datagrams
    }
}
