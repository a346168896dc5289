use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::errors::StorageError;
use crate::models::CachedRate;

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

pub const EXCHANGE_RATE: &str = "exchangeRate";
pub const LAST_UPDATE_TIME: &str = "lastUpdateTime";
pub const LAST_UPDATE_DATE: &str = "lastUpdateDate";
pub const SELECTED_CURRENCY: &str = "selectedCurrency";
pub const RATE_BASE_CURRENCY: &str = "rateBaseCurrency";
pub const RATE_TARGET_CURRENCY: &str = "rateTargetCurrency";

pub const ALL_KEYS: [&str; 6] = [
    EXCHANGE_RATE,
    LAST_UPDATE_TIME,
    LAST_UPDATE_DATE,
    SELECTED_CURRENCY,
    RATE_BASE_CURRENCY,
    RATE_TARGET_CURRENCY,
];

/// Extension-scoped key-value storage. Values are JSON so every backend
/// agrees on the shape of what it holds.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the subset of `keys` that are present.
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StorageError>;

    /// Writes all `items`, overwriting existing keys.
    async fn set(&self, items: Vec<(String, Value)>) -> Result<(), StorageError>;
}

/// Typed view over the keys this crate stores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredState {
    pub exchange_rate: Option<f64>,
    pub last_update_time: Option<i64>,
    pub last_update_date: Option<String>,
    pub selected_currency: Option<String>,
    pub rate_base_currency: Option<String>,
    pub rate_target_currency: Option<String>,
}

impl StoredState {
    pub async fn load(store: &dyn KeyValueStore) -> Result<Self, StorageError> {
        let values = store.get(&ALL_KEYS).await?;
        let text = |key: &str| values.get(key).and_then(Value::as_str).map(str::to_string);

        Ok(Self {
            exchange_rate: values.get(EXCHANGE_RATE).and_then(Value::as_f64),
            last_update_time: values.get(LAST_UPDATE_TIME).and_then(Value::as_i64),
            last_update_date: text(LAST_UPDATE_DATE),
            selected_currency: text(SELECTED_CURRENCY),
            rate_base_currency: text(RATE_BASE_CURRENCY),
            rate_target_currency: text(RATE_TARGET_CURRENCY),
        })
    }

    /// The persisted rate, if all of its parts are present and the value is
    /// usable.
    pub fn cached_rate(&self) -> Option<CachedRate> {
        let value = self.exchange_rate.filter(|v| v.is_finite() && *v > 0.0)?;
        Some(CachedRate {
            value,
            fetched_at_ms: self.last_update_time?,
            base_currency: self.rate_base_currency.clone()?,
            target_currency: self.rate_target_currency.clone()?,
        })
    }
}

/// Items written after a successful fetch.
pub fn rate_items(rate: &CachedRate, display_date: &str) -> Vec<(String, Value)> {
    vec![
        (EXCHANGE_RATE.to_string(), json!(rate.value)),
        (LAST_UPDATE_TIME.to_string(), json!(rate.fetched_at_ms)),
        (LAST_UPDATE_DATE.to_string(), json!(display_date)),
        (RATE_BASE_CURRENCY.to_string(), json!(rate.base_currency)),
        (RATE_TARGET_CURRENCY.to_string(), json!(rate.target_currency)),
    ]
}

pub async fn save_selected_currency(
    store: &dyn KeyValueStore,
    currency: &str,
) -> Result<(), StorageError> {
    store
        .set(vec![(SELECTED_CURRENCY.to_string(), json!(currency))])
        .await
}
