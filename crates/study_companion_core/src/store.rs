//! crates/study_companion_core/src/store.rs
//!
//! Fixed storage keys, the typed load/save helpers every component goes through,
//! and an in-memory `KeyValueStore`.

use crate::ports::{KeyValueStore, PortError, PortResult};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::warn;

pub const PROFILE_KEY: &str = "companion_user";
pub const SESSIONS_KEY: &str = "companion_chat_sessions";
pub const PINNED_BOOKS_KEY: &str = "companion_pinned_books";
pub const CUSTOM_SOURCES_KEY: &str = "companion_custom_sources";

/// Loads and decodes the record under `key`.
///
/// A payload that cannot be read or decoded counts as absent: the key is
/// cleared and `None` is returned so the caller falls back to its defaults.
pub async fn load_record<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let value = match store.get(key).await {
        Ok(Some(value)) => value,
        Ok(None) => return None,
        Err(e) => {
            warn!("Discarding unreadable record '{}': {}", key, e);
            discard(store, key).await;
            return None;
        }
    };

    match serde_json::from_value(value) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("Discarding record '{}' with unexpected shape: {}", key, e);
            discard(store, key).await;
            None
        }
    }
}

/// Serializes `record` and writes the whole snapshot under `key`.
pub async fn save_record<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    record: &T,
) -> PortResult<()> {
    let value = serde_json::to_value(record).map_err(|e| PortError::Unexpected(e.to_string()))?;
    store.set(key, &value).await
}

async fn discard(store: &dyn KeyValueStore, key: &str) {
    if let Err(e) = store.remove(key).await {
        warn!("Failed to clear record '{}': {}", key, e);
    }
}

//=========================================================================================
// In-memory implementation
//=========================================================================================

/// In-memory implementation of `KeyValueStore`.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<DashMap<String, serde_json::Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> PortResult<Option<serde_json::Value>> {
        Ok(self.entries.get(key).map(|entry| entry.clone()))
    }

    async fn set(&self, key: &str, value: &serde_json::Value) -> PortResult<()> {
        self.entries.insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn mis_shaped_record_is_cleared() {
        let store = InMemoryStore::new();
        store.set("numbers", &json!({"not": "a list"})).await.unwrap();

        let loaded: Option<Vec<u32>> = load_record(&store, "numbers").await;

        assert!(loaded.is_none());
        assert!(!store.contains("numbers"));
    }

    #[tokio::test]
    async fn saved_record_loads_back() {
        let store = InMemoryStore::new();
        save_record(&store, "numbers", &vec![1u32, 2, 3]).await.unwrap();

        let loaded: Option<Vec<u32>> = load_record(&store, "numbers").await;
        assert_eq!(loaded, Some(vec![1, 2, 3]));
    }
}
