use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::models::require_currency;

pub const DEFAULT_RATE_API_URL: &str = "https://api.exchangerate-api.com";
pub const PRICE_CONTAINER_CLASS: &str = "classified-price-container";
pub const ANNOTATION_CLASS: &str = "usd-price";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_port: u16,
    pub rate_api_url: String,
    /// Currency prices are displayed in on the page.
    pub page_currency: String,
    /// Used until the user picks one.
    pub default_currency: String,
    pub cache_ttl: Duration,
    pub debounce: Duration,
    pub container_class: String,
    pub annotation_class: String,
    /// JSON file backing the key-value store; in-memory when unset.
    pub storage_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_port: 3000,
            rate_api_url: DEFAULT_RATE_API_URL.to_string(),
            page_currency: "TRY".to_string(),
            default_currency: "USD".to_string(),
            cache_ttl: Duration::from_secs(5 * 60),
            debounce: Duration::from_millis(500),
            container_class: PRICE_CONTAINER_CLASS.to_string(),
            annotation_class: ANNOTATION_CLASS.to_string(),
            storage_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any variable source; unset variables keep their
    /// defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = lookup("API_PORT") {
            config.api_port = parse_var("API_PORT", &port, "a valid port number (1-65535)")?;
        }

        if let Some(url) = lookup("RATE_API_URL") {
            config.rate_api_url = url.trim().trim_end_matches('/').to_string();
        }

        if let Some(code) = lookup("PAGE_CURRENCY") {
            config.page_currency = require_currency("PAGE_CURRENCY", &code)?;
        }

        if let Some(code) = lookup("DEFAULT_CURRENCY") {
            config.default_currency = require_currency("DEFAULT_CURRENCY", &code)?;
        }

        if let Some(secs) = lookup("CACHE_TTL_SECS") {
            let secs: u64 = parse_var("CACHE_TTL_SECS", &secs, "a number of seconds")?;
            config.cache_ttl = Duration::from_secs(secs);
        }

        if let Some(ms) = lookup("DEBOUNCE_MS") {
            let ms: u64 = parse_var("DEBOUNCE_MS", &ms, "a number of milliseconds")?;
            config.debounce = Duration::from_millis(ms);
        }

        if let Some(class) = lookup("PRICE_CONTAINER_CLASS") {
            config.container_class = require_class("PRICE_CONTAINER_CLASS", &class)?;
        }

        if let Some(class) = lookup("ANNOTATION_CLASS") {
            config.annotation_class = require_class("ANNOTATION_CLASS", &class)?;
        }

        // an annotation that is also a container would be annotated again on every scan
        if config.annotation_class == config.container_class {
            return Err(ConfigError::Invalid {
                var: "ANNOTATION_CLASS",
                expected: "a class different from PRICE_CONTAINER_CLASS",
                value: config.annotation_class,
            });
        }

        config.storage_path = lookup("STORAGE_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(
    var: &'static str,
    value: &str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
        var,
        expected,
        value: value.to_string(),
    })
}

/// A class attribute holds whitespace-separated tokens, so a usable class
/// name is one non-empty token.
fn require_class(var: &'static str, value: &str) -> Result<String, ConfigError> {
    let class = value.trim();
    if class.is_empty() || class.chars().any(char::is_whitespace) {
        return Err(ConfigError::Invalid {
            var,
            expected: "a single class name without whitespace",
            value: value.to_string(),
        });
    }
    Ok(class.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_port, 3000);
        assert_eq!(config.page_currency, "TRY");
        assert_eq!(config.default_currency, "USD");
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.debounce, Duration::from_millis(500));
        assert_eq!(config.container_class, "classified-price-container");
        assert!(config.storage_path.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("API_PORT", "8080"),
            ("RATE_API_URL", "http://localhost:9000/"),
            ("DEFAULT_CURRENCY", "eur"),
            ("DEBOUNCE_MS", "250"),
            ("STORAGE_PATH", "/tmp/lira.json"),
        ]))
        .unwrap();

        assert_eq!(config.api_port, 8080);
        assert_eq!(config.rate_api_url, "http://localhost:9000");
        assert_eq!(config.default_currency, "EUR");
        assert_eq!(config.debounce, Duration::from_millis(250));
        assert_eq!(config.storage_path, Some(PathBuf::from("/tmp/lira.json")));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Config::from_lookup(lookup(&[("API_PORT", "70000")])).is_err());
        assert!(Config::from_lookup(lookup(&[("DEFAULT_CURRENCY", "dollars")])).is_err());
        assert!(Config::from_lookup(lookup(&[("CACHE_TTL_SECS", "-1")])).is_err());
        assert!(Config::from_lookup(lookup(&[("ANNOTATION_CLASS", "")])).is_err());
        assert!(Config::from_lookup(lookup(&[("ANNOTATION_CLASS", "usd price")])).is_err());
        assert!(Config::from_lookup(lookup(&[("PRICE_CONTAINER_CLASS", "  ")])).is_err());
    }

    #[test]
    fn rejects_annotation_class_equal_to_container_class() {
        let vars = lookup(&[("ANNOTATION_CLASS", PRICE_CONTAINER_CLASS)]);
        let err = Config::from_lookup(vars).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                var: "ANNOTATION_CLASS",
                ..
            }
        ));

        let err = Config::from_lookup(lookup(&[
            ("PRICE_CONTAINER_CLASS", "price"),
            ("ANNOTATION_CLASS", "price"),
        ]));
        assert!(err.is_err());
    }

    #[test]
    fn trims_class_names() {
        let config = Config::from_lookup(lookup(&[
            ("PRICE_CONTAINER_CLASS", " listing-price "),
            ("ANNOTATION_CLASS", "converted-price\n"),
        ]))
        .unwrap();
        assert_eq!(config.container_class, "listing-price");
        assert_eq!(config.annotation_class, "converted-price");
    }
}
