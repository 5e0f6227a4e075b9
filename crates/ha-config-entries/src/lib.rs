//! Config entry lifecycle for integration instances
//!
//! A [`ConfigEntry`] holds one configured instance of an integration
//! together with its [`ConfigEntryState`]. The [`ConfigEntries`]
//! manager owns every entry and drives setup, unload and reload
//! through the handlers an integration registers.
//!
//! Entries live in memory only. The host hands an integration its
//! configuration through the entry's `data` and `options` maps, and the
//! integration hands back per-entry runtime state through the entry's
//! type-erased runtime slot and unload hooks.

pub mod entry;
pub mod manager;
pub mod state_machine;

// Re-export main types
pub use entry::{ConfigEntry, ConfigEntrySource, ConfigEntryState, ConfigEntryUpdate, UnloadHook};

pub use manager::{
    ConfigEntries, ConfigEntriesError, ConfigEntriesResult, SetupHandler, UnloadHandler,
};

pub use state_machine::InvalidTransition;
