//! Schema switching.
//!
//! Key bindings with a `select` action delegate to a switching collaborator
//! reached through the `SchemaSwitcher` capability trait. The concrete
//! `Switcher` manages the enabled-schema order and records which schema was
//! selected when, so hosts can offer recency-ordered schema menus
//! elsewhere. Candidate-list construction itself is out of scope here.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Sentinel schema id meaning "advance to the next enabled schema".
pub const SELECT_NEXT: &str = ".next";

/// Capability interface for components that can switch schemas.
pub trait SchemaSwitcher {
    /// Advance to the next enabled schema in managed order.
    fn select_next_schema(&mut self);

    /// Activate a specific schema by id, recording it for recency ordering.
    fn apply_schema(&mut self, schema_id: &str);

    /// Id of the currently active schema.
    fn current_schema(&self) -> &str;
}

/// Persistable per-user switching state.
///
/// Serialization uses serde so hosts may store this alongside their other
/// user data; this crate does not persist it itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwitcherUserState {
    /// Schema id most recently activated by an explicit selection.
    pub previously_selected_schema: String,
    /// Unix timestamp of each schema's last activation.
    pub schema_access_time: AHashMap<String, u64>,
}

/// Default switcher over an ordered list of enabled schema ids.
#[derive(Debug, Clone, Default)]
pub struct Switcher {
    schemas: Vec<String>,
    current: usize,
    user_state: SwitcherUserState,
}

impl Switcher {
    /// Build a switcher over the given schema ids; the first entry starts
    /// active.
    pub fn new(schemas: Vec<String>) -> Self {
        Self {
            schemas,
            current: 0,
            user_state: SwitcherUserState::default(),
        }
    }

    /// Restore a switcher with previously saved user state.
    pub fn with_user_state(schemas: Vec<String>, user_state: SwitcherUserState) -> Self {
        let mut switcher = Self::new(schemas);
        switcher.user_state = user_state;
        switcher
    }

    /// The enabled schemas in managed order.
    pub fn schemas(&self) -> &[String] {
        &self.schemas
    }

    pub fn user_state(&self) -> &SwitcherUserState {
        &self.user_state
    }

    fn record_selection(&mut self, schema_id: &str) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.user_state.previously_selected_schema = schema_id.to_string();
        self.user_state
            .schema_access_time
            .insert(schema_id.to_string(), now);
    }
}

impl SchemaSwitcher for Switcher {
    fn select_next_schema(&mut self) {
        if self.schemas.is_empty() {
            return;
        }
        self.current = (self.current + 1) % self.schemas.len();
        debug!(schema = %self.schemas[self.current], "advanced to next schema");
    }

    fn apply_schema(&mut self, schema_id: &str) {
        if let Some(index) = self.schemas.iter().position(|id| id == schema_id) {
            self.current = index;
        }
        self.record_selection(schema_id);
        debug!(schema = schema_id, "applied schema");
    }

    fn current_schema(&self) -> &str {
        self.schemas
            .get(self.current)
            .map(String::as_str)
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn switcher() -> Switcher {
        Switcher::new(vec![
            "steno".to_string(),
            "pinyin".to_string(),
            "zhuyin".to_string(),
        ])
    }

    #[test]
    fn test_select_next_wraps() {
        let mut sw = switcher();
        assert_eq!(sw.current_schema(), "steno");
        sw.select_next_schema();
        assert_eq!(sw.current_schema(), "pinyin");
        sw.select_next_schema();
        sw.select_next_schema();
        assert_eq!(sw.current_schema(), "steno");
    }

    #[test]
    fn test_apply_records_recency() {
        let mut sw = switcher();
        sw.apply_schema("zhuyin");
        assert_eq!(sw.current_schema(), "zhuyin");
        assert_eq!(sw.user_state().previously_selected_schema, "zhuyin");
        assert!(sw.user_state().schema_access_time.contains_key("zhuyin"));
    }

    #[test]
    fn test_apply_unknown_schema_still_recorded() {
        let mut sw = switcher();
        sw.apply_schema("unlisted");
        // not in the enabled list, so the active schema is unchanged
        assert_eq!(sw.current_schema(), "steno");
        assert_eq!(sw.user_state().previously_selected_schema, "unlisted");
    }

    #[test]
    fn test_restored_user_state_survives() {
        let mut sw = switcher();
        sw.apply_schema("pinyin");
        let saved = sw.user_state().clone();

        let restored = Switcher::with_user_state(
            vec!["steno".to_string(), "pinyin".to_string()],
            saved,
        );
        assert_eq!(restored.user_state().previously_selected_schema, "pinyin");
        assert!(restored
            .user_state()
            .schema_access_time
            .contains_key("pinyin"));
        assert_eq!(restored.current_schema(), "steno");
    }

    #[test]
    fn test_empty_switcher() {
        let mut sw = Switcher::new(Vec::new());
        sw.select_next_schema();
        assert_eq!(sw.current_schema(), "");
    }
}
