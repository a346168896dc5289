use async_trait::async_trait;

use crate::errors::RateError;

pub mod cache;
pub mod exchangerate_api;

pub use cache::{Clock, RateCache, SystemClock, FALLBACK_RATE};
pub use exchangerate_api::ExchangeRateApi;

#[async_trait]
pub trait RateProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Units of `target` per one unit of `base`.
    async fn fetch_rate(&self, base: &str, target: &str) -> Result<f64, RateError>;
}
