#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lira_lens::errors::RateError;
use lira_lens::rates::{RateCache, RateProvider};
use lira_lens::storage::MemoryStore;

/// Serves a fixed rate, or fails with 503 when none is set.
pub struct StubProvider {
    rate: Mutex<Option<f64>>,
    calls: AtomicUsize,
}

impl StubProvider {
    pub fn new(rate: Option<f64>) -> Arc<Self> {
        Arc::new(Self {
            rate: Mutex::new(rate),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set(&self, rate: Option<f64>) {
        *self.rate.lock().unwrap() = rate;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateProvider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn fetch_rate(&self, _base: &str, _target: &str) -> Result<f64, RateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rate = *self.rate.lock().unwrap();
        rate.ok_or(RateError::Status(503))
    }
}

pub fn cache_with(provider: Arc<StubProvider>, store: MemoryStore) -> Arc<RateCache> {
    Arc::new(RateCache::new(
        provider,
        Arc::new(store),
        "TRY",
        Duration::from_secs(300),
    ))
}
