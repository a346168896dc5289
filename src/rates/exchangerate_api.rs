use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use super::RateProvider;
use crate::config::DEFAULT_RATE_API_URL;
use crate::errors::RateError;

/// The part of `/v4/latest/{base}` we consume; the rest of the body is ignored.
#[derive(Debug, Deserialize)]
struct LatestResponse {
    rates: HashMap<String, f64>,
}

pub struct ExchangeRateApi {
    client: reqwest::Client,
    base_url: String,
}

impl ExchangeRateApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn latest_url(&self, base: &str) -> String {
        format!("{}/v4/latest/{}", self.base_url, base)
    }
}

impl Default for ExchangeRateApi {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_API_URL)
    }
}

#[async_trait]
impl RateProvider for ExchangeRateApi {
    fn name(&self) -> &'static str {
        "exchangerate-api"
    }

    /// Fetches the latest table for `base` and picks out `target`.
    async fn fetch_rate(&self, base: &str, target: &str) -> Result<f64, RateError> {
        let url = self.latest_url(base);
        tracing::debug!("[{}] GET {url}", self.name());

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RateError::Status(status.as_u16()));
        }

        // read as text first so a malformed body is reported as a parse error
        let body = response.text().await?;
        let latest: LatestResponse = serde_json::from_str(&body)?;

        let rate = latest
            .rates
            .get(target)
            .copied()
            .ok_or_else(|| RateError::MissingRate {
                base: base.to_string(),
                target: target.to_string(),
            })?;

        if !rate.is_finite() || rate <= 0.0 {
            return Err(RateError::InvalidRate(rate));
        }

        Ok(rate)
    }
}
