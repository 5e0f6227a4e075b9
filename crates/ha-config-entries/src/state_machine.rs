//! Lifecycle transitions for config entries.
//!
//! ```text
//! NotLoaded → SetupInProgress → Loaded
//!                            ↘ SetupError → SetupInProgress (retry via reload)
//!
//! Loaded/SetupError → UnloadInProgress → NotLoaded
//!                                      ↘ FailedUnload (terminal)
//! ```
//!
//! Every state change of an entry goes through [`ConfigEntryState::try_transition`];
//! anything outside the graph above is refused.

use crate::entry::ConfigEntryState;
use thiserror::Error;

/// A transition outside the lifecycle graph was attempted
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("config entry cannot move from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: ConfigEntryState,
    pub to: ConfigEntryState,
}

impl ConfigEntryState {
    /// The states this state may move to
    fn targets(self) -> &'static [ConfigEntryState] {
        use ConfigEntryState::*;

        match self {
            NotLoaded => &[SetupInProgress],
            SetupInProgress => &[Loaded, SetupError],
            Loaded => &[UnloadInProgress],
            SetupError => &[SetupInProgress, UnloadInProgress],
            UnloadInProgress => &[NotLoaded, FailedUnload],
            // Terminal, nothing releases a failed unload
            FailedUnload => &[],
        }
    }

    /// Check whether a transition is allowed without performing it
    pub fn can_transition_to(self, to: ConfigEntryState) -> bool {
        self.targets().contains(&to)
    }

    /// Move to `to`, or report the refused transition
    pub fn try_transition(
        self,
        to: ConfigEntryState,
    ) -> Result<ConfigEntryState, InvalidTransition> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(InvalidTransition { from: self, to })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConfigEntryState::*;

    const ALL: [ConfigEntryState; 6] = [
        NotLoaded,
        SetupInProgress,
        Loaded,
        SetupError,
        UnloadInProgress,
        FailedUnload,
    ];

    const ALLOWED: [(ConfigEntryState, ConfigEntryState); 8] = [
        (NotLoaded, SetupInProgress),
        (SetupInProgress, Loaded),
        (SetupInProgress, SetupError),
        (Loaded, UnloadInProgress),
        (SetupError, SetupInProgress),
        (SetupError, UnloadInProgress),
        (UnloadInProgress, NotLoaded),
        (UnloadInProgress, FailedUnload),
    ];

    fn walk(start: ConfigEntryState, steps: &[ConfigEntryState]) -> ConfigEntryState {
        steps
            .iter()
            .fold(start, |state, &next| state.try_transition(next).unwrap())
    }

    #[test]
    fn test_transition_table_is_exact() {
        // Every pair outside ALLOWED must be refused, every pair inside accepted
        for from in ALL {
            for to in ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    ALLOWED.contains(&(from, to)),
                    "{from:?} -> {to:?}"
                );
            }
        }
    }

    #[test]
    fn test_try_transition_yields_the_target() {
        assert_eq!(
            NotLoaded.try_transition(SetupInProgress),
            Ok(SetupInProgress)
        );
    }

    #[test]
    fn test_refused_transition_reports_both_states() {
        let err = NotLoaded.try_transition(Loaded).unwrap_err();
        assert_eq!(err.from, NotLoaded);
        assert_eq!(err.to, Loaded);
        assert_eq!(
            err.to_string(),
            "config entry cannot move from NotLoaded to Loaded"
        );
    }

    #[test]
    fn test_setup_unload_round_trip() {
        let end = walk(
            NotLoaded,
            &[SetupInProgress, Loaded, UnloadInProgress, NotLoaded],
        );
        assert_eq!(end, NotLoaded);
    }

    #[test]
    fn test_failed_setup_recovers_through_reload() {
        let end = walk(
            NotLoaded,
            &[SetupInProgress, SetupError, SetupInProgress, Loaded],
        );
        assert_eq!(end, Loaded);
    }

    #[test]
    fn test_setup_error_can_unload() {
        let end = walk(
            NotLoaded,
            &[SetupInProgress, SetupError, UnloadInProgress, NotLoaded],
        );
        assert_eq!(end, NotLoaded);
    }

    #[test]
    fn test_failed_unload_is_terminal() {
        let end = walk(
            NotLoaded,
            &[SetupInProgress, Loaded, UnloadInProgress, FailedUnload],
        );
        for to in ALL {
            assert!(!end.can_transition_to(to), "FailedUnload -> {to:?}");
        }
    }
}
