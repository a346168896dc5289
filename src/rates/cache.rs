use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use dashmap::DashMap;

use super::RateProvider;
use crate::errors::RateError;
use crate::models::{CachedRate, UserPreference, currency_code};
use crate::storage::{self, KeyValueStore, StoredState};

/// Returned when no rate was ever fetched and the provider is unreachable.
pub const FALLBACK_RATE: f64 = 1.0;

/// Source of "now" in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Caches conversion rates per currency pair for a fixed TTL and persists the
/// latest one to the key-value store.
///
/// Rates are always quoted as "1 selected = x page currency", which is the
/// form the rate provider serves and the options surface displays.
pub struct RateCache {
    provider: Arc<dyn RateProvider>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    page_currency: String,
    // "USD:TRY" → rate; last writer wins
    rates: DashMap<String, CachedRate>,
}

impl RateCache {
    pub fn new(
        provider: Arc<dyn RateProvider>,
        store: Arc<dyn KeyValueStore>,
        page_currency: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            provider,
            store,
            clock: Arc::new(SystemClock),
            ttl,
            page_currency: page_currency.into(),
            rates: DashMap::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn page_currency(&self) -> &str {
        &self.page_currency
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    fn key(base: &str, target: &str) -> String {
        format!("{}:{}", base, target)
    }

    /// Seeds the in-memory cache from storage and returns the stored
    /// preference, falling back to `default_currency`.
    pub async fn load_persisted(&self, default_currency: &str) -> UserPreference {
        let state = match StoredState::load(self.store.as_ref()).await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("Failed to read stored state: {e}");
                StoredState::default()
            }
        };

        if let Some(rate) = state.cached_rate() {
            let key = Self::key(&rate.base_currency, &rate.target_currency);
            let newer = self
                .rates
                .get(&key)
                .is_none_or(|held| held.fetched_at_ms < rate.fetched_at_ms);
            if newer {
                tracing::debug!("Loaded persisted rate {}", rate.display());
                self.rates.insert(key, rate);
            }
        }

        let selected_currency = state
            .selected_currency
            .as_deref()
            .and_then(currency_code)
            .unwrap_or_else(|| default_currency.to_string());

        UserPreference { selected_currency }
    }

    /// The rate for `selected_currency`. Never fails: on fetch failure the
    /// last known rate for the pair is returned, or [`FALLBACK_RATE`].
    pub async fn get_rate(&self, selected_currency: &str) -> f64 {
        self.resolve(selected_currency).await.value
    }

    /// Like [`get_rate`](Self::get_rate) but returns the full quote, which
    /// callers need to know which way round to convert.
    pub async fn resolve(&self, selected_currency: &str) -> CachedRate {
        let now = self.clock.now_ms();

        if let Some(cached) = self.cached(selected_currency) {
            if cached.is_fresh(now, self.ttl_ms()) {
                metrics::counter!("rate_cache_hits_total").increment(1);
                tracing::debug!("Using cached rate {}", cached.display());
                return cached;
            }
        }

        match self.refresh(selected_currency).await {
            Ok(rate) => rate,
            Err(e) => {
                tracing::warn!(
                    "Failed to fetch exchange rate for {selected_currency}: {e}"
                );
                self.cached(selected_currency).unwrap_or_else(|| CachedRate {
                    value: FALLBACK_RATE,
                    fetched_at_ms: now,
                    base_currency: selected_currency.to_string(),
                    target_currency: self.page_currency.clone(),
                })
            }
        }
    }

    /// Fetches a new rate regardless of freshness. On success the rate is
    /// cached and persisted; storage failures are logged, not returned.
    pub async fn refresh(&self, selected_currency: &str) -> Result<CachedRate, RateError> {
        let now = self.clock.now_ms();

        let value = match self
            .provider
            .fetch_rate(selected_currency, &self.page_currency)
            .await
        {
            Ok(value) => {
                metrics::counter!("rate_fetch_total", "outcome" => "ok").increment(1);
                value
            }
            Err(e) => {
                metrics::counter!("rate_fetch_total", "outcome" => "error").increment(1);
                return Err(e);
            }
        };

        let rate = CachedRate {
            value,
            fetched_at_ms: now,
            base_currency: selected_currency.to_string(),
            target_currency: self.page_currency.clone(),
        };

        self.rates
            .insert(Self::key(selected_currency, &self.page_currency), rate.clone());

        let items = storage::rate_items(&rate, &display_date(now));
        if let Err(e) = self.store.set(items).await {
            tracing::warn!("Failed to persist exchange rate: {e}");
        }

        tracing::info!("[{}] {}", self.provider.name(), rate.display());
        Ok(rate)
    }

    /// Last rate held in memory for `selected_currency`, fresh or not.
    pub fn cached(&self, selected_currency: &str) -> Option<CachedRate> {
        self.rates
            .get(&Self::key(selected_currency, &self.page_currency))
            .map(|r| r.clone())
    }

    /// The human readable time of the last successful fetch.
    pub async fn last_update_date(&self) -> Option<String> {
        match StoredState::load(self.store.as_ref()).await {
            Ok(state) => state.last_update_date,
            Err(e) => {
                tracing::warn!("Failed to read last update date: {e}");
                None
            }
        }
    }

    fn ttl_ms(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }
}

/// Local time string stored alongside the rate for display.
pub fn display_date(epoch_ms: i64) -> String {
    DateTime::from_timestamp_millis(epoch_ms)
        .map(|utc| {
            utc.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_default()
}
