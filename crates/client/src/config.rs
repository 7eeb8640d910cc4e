//! Harness configuration: the persisted record and its store.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::storage::KeyValueStore;

/// Storage key the record is persisted under.
pub const CONFIG_KEY: &str = "wsprobe.config";

fn default_rest_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_ws_base_url() -> String {
    "ws://localhost:8080/exchange-socket".to_string()
}

fn default_username() -> String {
    "bot1".to_string()
}

/// The flat configuration record the operator edits between runs.
///
/// Every field has a serde default so a partially persisted record merges over
/// the defaults field-by-field; an unparseable record is discarded wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigRecord {
    #[serde(default = "default_rest_base_url")]
    pub rest_base_url: String,
    #[serde(default = "default_ws_base_url")]
    pub ws_base_url: String,
    #[serde(default = "default_username")]
    pub username: String,
    pub api_key: String,
    pub session_id: String,
    pub admin_username: String,
    pub admin_password: String,
}

impl Default for ConfigRecord {
    fn default() -> Self {
        Self {
            rest_base_url: default_rest_base_url(),
            ws_base_url: default_ws_base_url(),
            username: default_username(),
            api_key: String::new(),
            session_id: String::new(),
            admin_username: String::new(),
            admin_password: String::new(),
        }
    }
}

/// Loads and persists the [`ConfigRecord`]. `read` never fails; `write` is
/// best-effort.
pub struct ConfigStore {
    store: Arc<dyn KeyValueStore>,
}

impl ConfigStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the persisted record, falling back to the full default record on
    /// any missing or corrupt payload.
    pub fn read(&self) -> ConfigRecord {
        match self.store.load(CONFIG_KEY) {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("discarding corrupt config record: {e}");
                ConfigRecord::default()
            }),
            None => ConfigRecord::default(),
        }
    }

    /// Persist the record. Failure is logged and otherwise swallowed.
    pub fn write(&self, record: &ConfigRecord) {
        match serde_json::to_string(record) {
            Ok(json) => {
                if !self.store.save(CONFIG_KEY, &json) {
                    tracing::warn!("config write skipped: store unavailable");
                }
            }
            Err(e) => tracing::warn!("config serialize failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn store_with(raw: Option<&str>) -> ConfigStore {
        let mem = MemoryStore::new();
        if let Some(raw) = raw {
            mem.save(CONFIG_KEY, raw);
        }
        ConfigStore::new(Arc::new(mem))
    }

    #[test]
    fn read_without_persisted_record_yields_defaults() {
        let record = store_with(None).read();
        assert_eq!(record, ConfigRecord::default());
        assert_eq!(record.ws_base_url, "ws://localhost:8080/exchange-socket");
    }

    #[test]
    fn corrupt_payload_yields_exactly_the_default_record() {
        let record = store_with(Some("{not json")).read();
        assert_eq!(record, ConfigRecord::default());
    }

    #[test]
    fn partial_record_merges_over_defaults_field_by_field() {
        let record = store_with(Some(r#"{"username":"team49","apiKey":"k1"}"#)).read();
        assert_eq!(record.username, "team49");
        assert_eq!(record.api_key, "k1");
        assert_eq!(record.rest_base_url, "http://localhost:8080");
        assert_eq!(record.session_id, "");
    }

    #[test]
    fn write_then_read_round_trips() {
        let store = store_with(None);
        let mut record = ConfigRecord::default();
        record.session_id = "ABC123".into();
        store.write(&record);
        assert_eq!(store.read(), record);
    }

    #[test]
    fn write_to_an_unavailable_store_is_a_silent_no_op() {
        struct BrokenStore;

        impl KeyValueStore for BrokenStore {
            fn load(&self, _key: &str) -> Option<String> {
                None
            }
            fn save(&self, _key: &str, _value: &str) -> bool {
                false
            }
            fn remove(&self, _key: &str) {}
        }

        let store = ConfigStore::new(Arc::new(BrokenStore));
        let mut record = ConfigRecord::default();
        record.session_id = "ABC123".into();
        store.write(&record); // swallowed, no panic, no error to propagate
        assert_eq!(store.read(), ConfigRecord::default());
    }

    #[test]
    fn persists_with_camel_case_keys() {
        let mem = Arc::new(MemoryStore::new());
        let store = ConfigStore::new(mem.clone());
        store.write(&ConfigRecord::default());
        let raw = mem.load(CONFIG_KEY).unwrap();
        assert!(raw.contains("restBaseUrl"));
        assert!(raw.contains("adminUsername"));
    }
}
