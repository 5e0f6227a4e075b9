//! Causality context attached to every event and state change

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Context carried by every event, linking it to its origin.
///
/// A fresh context gets a new ULID. Events caused by another event carry
/// that event's context id in `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Unique identifier for this context
    pub id: String,
    /// The user who triggered the action, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// The context id of the event that caused this one, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            id: Ulid::new().to_string(),
            user_id: None,
            parent_id: None,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contexts_are_unique() {
        let a = Context::new();
        let b = Context::new();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_optional_fields_omitted_in_json() {
        let ctx = Context::new();
        let json = serde_json::to_string(&ctx).unwrap();
        assert!(!json.contains("user_id"));
        assert!(!json.contains("parent_id"));
    }
}
