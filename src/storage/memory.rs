use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use super::KeyValueStore;
use crate::errors::StorageError;

/// Process-lifetime store; cloning shares the same map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StorageError> {
        Ok(keys
            .iter()
            .filter_map(|k| self.inner.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, items: Vec<(String, Value)>) -> Result<(), StorageError> {
        for (key, value) in items {
            self.inner.insert(key, value);
        }
        Ok(())
    }
}
