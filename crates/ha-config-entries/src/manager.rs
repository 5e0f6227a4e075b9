//! Config Entries Manager
//!
//! Manages the lifecycle of configuration entries.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::entry::{ConfigEntry, ConfigEntryState, ConfigEntryUpdate};
use crate::state_machine::InvalidTransition;

/// Config entries errors
#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Cannot unload entry in state {0:?}")]
    CannotUnload(ConfigEntryState),

    #[error("Setup failed: {0}")]
    SetupFailed(String),

    #[error("Unload failed: {0}")]
    UnloadFailed(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

/// Setup handler function type
pub type SetupHandler = Arc<dyn Fn(&ConfigEntry) -> Result<(), String> + Send + Sync + 'static>;

/// Unload handler function type
pub type UnloadHandler = Arc<dyn Fn(&ConfigEntry) -> Result<(), String> + Send + Sync + 'static>;

/// Config Entries Manager
///
/// Manages the lifecycle of configuration entries including:
/// - Entry creation, update and removal
/// - Validated lifecycle state transitions
/// - Dispatch to per-domain setup and unload handlers
pub struct ConfigEntries {
    /// Primary index: entry_id -> ConfigEntry
    entries: DashMap<String, ConfigEntry>,

    /// Index: domain -> set of entry_ids
    by_domain: DashMap<String, HashSet<String>>,

    /// Setup lock to prevent concurrent setup/unload
    setup_lock: Mutex<()>,

    /// Setup handlers by domain
    setup_handlers: DashMap<String, SetupHandler>,

    /// Unload handlers by domain
    unload_handlers: DashMap<String, UnloadHandler>,
}

impl ConfigEntries {
    /// Create a new config entries manager
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            by_domain: DashMap::new(),
            setup_lock: Mutex::new(()),
            setup_handlers: DashMap::new(),
            unload_handlers: DashMap::new(),
        }
    }

    /// Get an entry by ID
    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    /// Get all entries for a domain
    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        self.by_domain
            .get(domain)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Add a new config entry
    pub fn add(&self, entry: ConfigEntry) -> ConfigEntry {
        self.by_domain
            .entry(entry.domain.clone())
            .or_default()
            .insert(entry.entry_id.clone());
        self.entries.insert(entry.entry_id.clone(), entry.clone());

        info!(
            "Added config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry.entry_id
        );

        entry
    }

    /// Update an existing entry
    pub fn update(
        &self,
        entry_id: &str,
        update: ConfigEntryUpdate,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if let Some(title) = update.title {
            entry.title = title;
        }
        if let Some(data) = update.data {
            entry.data = data;
        }
        if let Some(options) = update.options {
            entry.options = options;
        }
        entry.modified_at = Utc::now();

        debug!("Updated config entry: {}", entry_id);
        Ok(entry.clone())
    }

    /// Remove an entry
    pub fn remove(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        let (_, entry) = self
            .entries
            .remove(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if let Some(mut ids) = self.by_domain.get_mut(&entry.domain) {
            ids.remove(entry_id);
        }

        info!(
            "Removed config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry_id
        );

        Ok(entry)
    }

    /// Transition an entry to a new state, returning the updated entry
    fn set_state(
        &self,
        entry_id: &str,
        state: ConfigEntryState,
        reason: Option<String>,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        entry.try_set_state(state, reason)?;
        debug!("Entry {} state changed to {:?}", entry_id, state);
        Ok(entry.clone())
    }

    /// Register a setup handler for a domain
    pub fn register_setup_handler(&self, domain: &str, handler: SetupHandler) {
        self.setup_handlers.insert(domain.to_string(), handler);
        debug!("Registered setup handler for domain: {}", domain);
    }

    /// Register an unload handler for a domain
    pub fn register_unload_handler(&self, domain: &str, handler: UnloadHandler) {
        self.unload_handlers.insert(domain.to_string(), handler);
        debug!("Registered unload handler for domain: {}", domain);
    }

    /// Setup an entry (call integration's setup)
    pub async fn setup(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        let _lock = self.setup_lock.lock().await;

        let entry = self.set_state(entry_id, ConfigEntryState::SetupInProgress, None)?;

        let handler = self.setup_handlers.get(&entry.domain).map(|h| h.clone());
        if let Some(handler) = handler {
            match handler(&entry) {
                Ok(()) => {
                    self.set_state(entry_id, ConfigEntryState::Loaded, None)?;
                    info!("Setup completed for entry: {} ({})", entry.title, entry_id);
                }
                Err(reason) => {
                    warn!("Setup failed for entry {}: {}", entry_id, reason);
                    self.set_state(entry_id, ConfigEntryState::SetupError, Some(reason.clone()))?;
                    return Err(ConfigEntriesError::SetupFailed(reason));
                }
            }
        } else {
            // No handler, mark as loaded
            self.set_state(entry_id, ConfigEntryState::Loaded, None)?;
            debug!(
                "No setup handler for domain {}, marking as loaded",
                entry.domain
            );
        }

        Ok(())
    }

    /// Unload an entry.
    ///
    /// Calls the domain's unload handler, then runs the unload hooks the
    /// integration registered during setup. A handler failure leaves the
    /// entry in FailedUnload.
    pub async fn unload(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        let _lock = self.setup_lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if entry.state == ConfigEntryState::NotLoaded {
            debug!("Entry {} is not loaded, nothing to unload", entry_id);
            return Ok(());
        }
        if !entry.state.is_recoverable() {
            return Err(ConfigEntriesError::CannotUnload(entry.state));
        }

        let entry = self.set_state(entry_id, ConfigEntryState::UnloadInProgress, None)?;

        let handler = self.unload_handlers.get(&entry.domain).map(|h| h.clone());
        if let Some(handler) = handler {
            if let Err(reason) = handler(&entry) {
                warn!("Unload failed for entry {}: {}", entry_id, reason);
                self.set_state(
                    entry_id,
                    ConfigEntryState::FailedUnload,
                    Some(reason.clone()),
                )?;
                return Err(ConfigEntriesError::UnloadFailed(reason));
            }
        }

        for hook in entry.take_unload_hooks() {
            hook();
        }

        self.set_state(entry_id, ConfigEntryState::NotLoaded, None)?;
        info!("Unloaded entry: {} ({})", entry.title, entry_id);
        Ok(())
    }

    /// Reload an entry (unload + setup)
    pub async fn reload(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        self.unload(entry_id).await?;
        self.setup(entry_id).await
    }

    /// Get count of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ConfigEntries {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ConfigEntrySource;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_add_and_get_entry() {
        let manager = ConfigEntries::new();

        let entry = ConfigEntry::new("datadog", "Datadog").with_source(ConfigEntrySource::Import);
        let added = manager.add(entry);

        assert_eq!(added.domain, "datadog");
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.get(&added.entry_id).unwrap().title, "Datadog");
    }

    #[tokio::test]
    async fn test_get_by_domain() {
        let manager = ConfigEntries::new();

        manager.add(ConfigEntry::new("datadog", "Datadog 1"));
        manager.add(ConfigEntry::new("datadog", "Datadog 2"));
        manager.add(ConfigEntry::new("mqtt", "MQTT"));

        assert_eq!(manager.get_by_domain("datadog").len(), 2);
        assert_eq!(manager.get_by_domain("mqtt").len(), 1);
        assert!(manager.get_by_domain("hue").is_empty());
    }

    #[tokio::test]
    async fn test_update_entry() {
        let manager = ConfigEntries::new();

        let entry = manager.add(ConfigEntry::new("datadog", "Old Name"));

        let updated = manager
            .update(&entry.entry_id, ConfigEntryUpdate::new().title("New Name"))
            .unwrap();

        assert_eq!(updated.title, "New Name");
    }

    #[tokio::test]
    async fn test_remove_entry() {
        let manager = ConfigEntries::new();

        let entry = manager.add(ConfigEntry::new("datadog", "Test"));
        assert_eq!(manager.len(), 1);

        manager.remove(&entry.entry_id).unwrap();
        assert!(manager.is_empty());
        assert!(matches!(
            manager.remove(&entry.entry_id),
            Err(ConfigEntriesError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_setup_and_unload_without_handlers() {
        let manager = ConfigEntries::new();

        let entry = manager.add(ConfigEntry::new("datadog", "Test"));
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::NotLoaded
        );

        manager.setup(&entry.entry_id).await.unwrap();
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::Loaded
        );

        manager.unload(&entry.entry_id).await.unwrap();
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::NotLoaded
        );
    }

    #[tokio::test]
    async fn test_setup_handler() {
        let manager = ConfigEntries::new();

        // Register a handler that always succeeds
        manager.register_setup_handler("datadog", Arc::new(|_entry| Ok(())));

        let entry = manager.add(ConfigEntry::new("datadog", "Test"));
        manager.setup(&entry.entry_id).await.unwrap();

        assert!(manager.get(&entry.entry_id).unwrap().is_loaded());
    }

    #[tokio::test]
    async fn test_setup_handler_failure() {
        let manager = ConfigEntries::new();

        // Register a handler that always fails
        manager.register_setup_handler(
            "datadog",
            Arc::new(|_entry| Err("Connection failed".to_string())),
        );

        let entry = manager.add(ConfigEntry::new("datadog", "Test"));
        let result = manager.setup(&entry.entry_id).await;

        assert!(matches!(result, Err(ConfigEntriesError::SetupFailed(_))));
        let entry = manager.get(&entry.entry_id).unwrap();
        assert_eq!(entry.state, ConfigEntryState::SetupError);
        assert_eq!(entry.reason.as_deref(), Some("Connection failed"));
    }

    #[tokio::test]
    async fn test_setup_twice_rejected() {
        let manager = ConfigEntries::new();

        let entry = manager.add(ConfigEntry::new("datadog", "Test"));
        manager.setup(&entry.entry_id).await.unwrap();

        // Loaded entries must be unloaded before setting up again
        assert!(matches!(
            manager.setup(&entry.entry_id).await,
            Err(ConfigEntriesError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn test_unload_runs_handler_then_hooks() {
        let manager = ConfigEntries::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let handler_order = order.clone();
        manager.register_unload_handler(
            "datadog",
            Arc::new(move |_entry| {
                handler_order.lock().unwrap().push("handler");
                Ok(())
            }),
        );

        let hook_order = order.clone();
        manager.register_setup_handler(
            "datadog",
            Arc::new(move |entry| {
                let hook_order = hook_order.clone();
                entry.on_unload(move || {
                    hook_order.lock().unwrap().push("hook");
                });
                Ok(())
            }),
        );

        let entry = manager.add(ConfigEntry::new("datadog", "Test"));
        manager.setup(&entry.entry_id).await.unwrap();
        manager.unload(&entry.entry_id).await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["handler", "hook"]);
    }

    #[tokio::test]
    async fn test_unload_handler_failure_is_terminal() {
        let manager = ConfigEntries::new();

        manager
            .register_unload_handler("datadog", Arc::new(|_entry| Err("flush failed".to_string())));

        let entry = manager.add(ConfigEntry::new("datadog", "Test"));
        manager.setup(&entry.entry_id).await.unwrap();

        let result = manager.unload(&entry.entry_id).await;
        assert!(matches!(result, Err(ConfigEntriesError::UnloadFailed(_))));
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::FailedUnload
        );

        // FailedUnload is terminal
        assert!(matches!(
            manager.unload(&entry.entry_id).await,
            Err(ConfigEntriesError::CannotUnload(ConfigEntryState::FailedUnload))
        ));
    }

    #[tokio::test]
    async fn test_unload_not_loaded_is_noop() {
        let manager = ConfigEntries::new();

        let entry = manager.add(ConfigEntry::new("datadog", "Test"));
        manager.unload(&entry.entry_id).await.unwrap();
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::NotLoaded
        );
    }

    #[tokio::test]
    async fn test_reload() {
        let manager = ConfigEntries::new();
        let setups = Arc::new(AtomicU32::new(0));

        let counter = setups.clone();
        manager.register_setup_handler(
            "datadog",
            Arc::new(move |_entry| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        let entry = manager.add(ConfigEntry::new("datadog", "Test"));
        manager.setup(&entry.entry_id).await.unwrap();
        manager.reload(&entry.entry_id).await.unwrap();

        assert_eq!(setups.load(Ordering::SeqCst), 2);
        assert!(manager.get(&entry.entry_id).unwrap().is_loaded());
    }
}
