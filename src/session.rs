//! Explicit session context for the gates and the resolver.
//!
//! The resolver never reads request-attached ambient state; callers hand it
//! a [`SessionData`] value and persist whatever comes back. The in-memory
//! [`SessionStore`] backs the demo server; a host CMS would substitute its
//! own session machinery.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// The three session keys this crate defines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    /// Language the visitor explicitly chose on a prior visit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_language: Option<String>,

    /// Region the visitor explicitly chose on a prior visit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_region: Option<String>,

    /// Set once the visitor has actively picked a region or language.
    /// Page rendering reads it to swap the automatic-region notice for a
    /// plain switcher link.
    #[serde(default)]
    pub chosen_region_or_language: bool,
}

impl SessionData {
    pub fn new() -> Self {
        Self::default()
    }
}

/// In-memory session store keyed by an opaque session id.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionData>>,
    next_id: AtomicU64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh session id.
    pub fn create(&self) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("s{:016x}", id.wrapping_mul(0x9e37_79b9_7f4a_7c15))
    }

    /// Load a session, or an empty one for unknown ids.
    pub fn load(&self, id: &str) -> SessionData {
        self.sessions
            .lock()
            .expect("session store lock poisoned")
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Persist a session.
    pub fn save(&self, id: &str, data: SessionData) {
        self.sessions
            .lock()
            .expect("session store lock poisoned")
            .insert(id.to_string(), data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_session_is_empty() {
        let store = SessionStore::new();
        let data = store.load("nope");
        assert_eq!(data, SessionData::default());
        assert!(!data.chosen_region_or_language);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let store = SessionStore::new();
        let id = store.create();

        let mut data = SessionData::new();
        data.site_region = Some("ca".to_string());
        data.chosen_region_or_language = true;
        store.save(&id, data.clone());

        assert_eq!(store.load(&id), data);
    }

    #[test]
    fn test_ids_are_unique() {
        let store = SessionStore::new();
        let a = store.create();
        let b = store.create();
        assert_ne!(a, b);
    }

    #[test]
    fn test_session_data_json_keys() {
        let mut data = SessionData::new();
        data.site_language = Some("fr".to_string());
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["site_language"], "fr");
        assert_eq!(json["chosen_region_or_language"], false);
        // Unset keys are omitted entirely.
        assert!(json.get("site_region").is_none());
    }
}
