//! In-memory key-value store simulating the persistence layer
//!
//! Durability is out of scope; records live for the lifetime of the
//! application, keyed by `{namespace}:{id}` strings the way the surrounding
//! product stores verification and session records.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

/// Simulated persistence for verification, fraud, and session records
pub struct KvStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl KvStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Insert or replace a record
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.entries.lock().insert(key.into(), value);
    }

    /// Fetch a record by exact key
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().get(key).cloned()
    }

    /// Remove a record, returning it if present
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.entries.lock().remove(key)
    }

    /// All records whose key starts with `prefix`, in unspecified order
    pub fn get_by_prefix(&self, prefix: &str) -> Vec<Value> {
        self.entries
            .lock()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(_, value)| value.clone())
            .collect()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the store holds no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for KvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_get_remove() {
        let store = KvStore::new();
        store.set("biometric:abc", json!({"confidence": 0.91}));

        assert_eq!(
            store.get("biometric:abc"),
            Some(json!({"confidence": 0.91}))
        );
        assert!(store.get("biometric:missing").is_none());

        assert!(store.remove("biometric:abc").is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_by_prefix() {
        let store = KvStore::new();
        store.set("biometric:a", json!(1));
        store.set("biometric:b", json!(2));
        store.set("exam_session:c", json!(3));

        assert_eq!(store.get_by_prefix("biometric:").len(), 2);
        assert_eq!(store.get_by_prefix("exam_session:").len(), 1);
        assert!(store.get_by_prefix("fraud:").is_empty());
    }
}
