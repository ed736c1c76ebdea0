//! Durable key/value persistence for learning state.
//!
//! Values are JSON blobs addressed by the key families in [`keys`]. There are no
//! transactions: every `save` replaces the whole value and the last writer wins.

pub mod file;
pub mod keys;

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::StoreError;

pub use file::JsonFileStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<Value>, StoreError>;
    async fn save(&self, key: &str, value: Value) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn save(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Loads a typed slice, falling back to the default when it is missing or malformed.
///
/// A malformed slice is removed from the store so the next save starts clean.
pub async fn load_slice<T>(store: &dyn Store, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let raw = match store.load(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(err) => {
            warn!(key, error = %err, "failed to read learning state, starting from defaults");
            return T::default();
        }
    };

    match serde_json::from_value(raw) {
        Ok(value) => value,
        Err(err) => {
            warn!(key, error = %err, "corrupted learning state reset to defaults");
            if let Err(err) = store.remove(key).await {
                warn!(key, error = %err, "failed to drop corrupted learning state");
            }
            T::default()
        }
    }
}

pub async fn save_slice<T>(store: &dyn Store, key: &str, value: &T) -> Result<(), StoreError>
where
    T: Serialize + ?Sized,
{
    let encoded = serde_json::to_value(value).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })?;
    store.save(key, encoded).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        store.save("k", json!({"a": 1})).await.unwrap();
        assert_eq!(store.load("k").await.unwrap(), Some(json!({"a": 1})));
        store.remove("k").await.unwrap();
        assert_eq!(store.load("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_load_slice_recovers_from_corruption() {
        let store = MemoryStore::new();
        store.save(keys::SRS_ITEMS, json!("not a list")).await.unwrap();

        let items: Vec<crate::types::ReviewItem> = load_slice(&store, keys::SRS_ITEMS).await;

        assert!(items.is_empty());
        assert!(!store.contains(keys::SRS_ITEMS));
    }

    #[tokio::test]
    async fn test_load_slice_missing_is_default() {
        let store = MemoryStore::new();
        let stats: crate::types::UserStats = load_slice(&store, keys::USER_STATS).await;
        assert_eq!(stats, crate::types::UserStats::default());
    }
}
