//! In-memory document store
//!
//! Backs tests and acts as a process-local cache. Same whole-node replace
//! semantics as the remote backends, so the read-modify-write behavior of
//! callers is exercised identically.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::DocumentStore;
use crate::Result;

/// Map-backed [`DocumentStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    nodes: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored top-level nodes
    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    /// True when no node has been written
    pub async fn is_empty(&self) -> bool {
        self.nodes.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.nodes.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: Value) -> Result<()> {
        self.nodes.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn load_missing_key_is_none() {
        let store = MemoryStore::new();
        assert!(store.load("absent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = MemoryStore::new();
        store
            .save("a-b-x-com", json!({"first_name": "A"}))
            .await
            .unwrap();

        let loaded = store.load("a-b-x-com").await.unwrap().unwrap();
        assert_eq!(loaded, json!({"first_name": "A"}));
    }

    #[tokio::test]
    async fn save_replaces_whole_node() {
        let store = MemoryStore::new();
        store.save("users", json!([{"name": "A"}])).await.unwrap();
        store.save("users", json!([{"name": "B"}])).await.unwrap();

        let loaded = store.load("users").await.unwrap().unwrap();
        assert_eq!(loaded, json!([{"name": "B"}]));
        assert_eq!(store.len().await, 1);
    }
}
