use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// A conversion rate: `value` units of `target_currency` per one unit of
/// `base_currency`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedRate {
    pub value: f64,
    pub fetched_at_ms: i64,
    pub base_currency: String,
    pub target_currency: String,
}

impl CachedRate {
    pub fn is_for(&self, base: &str, target: &str) -> bool {
        self.base_currency == base && self.target_currency == target
    }

    pub fn is_fresh(&self, now_ms: i64, ttl_ms: i64) -> bool {
        now_ms - self.fetched_at_ms < ttl_ms
    }

    /// Whether `currency` is either side of this rate.
    pub fn quotes(&self, currency: &str) -> bool {
        self.base_currency == currency || self.target_currency == currency
    }

    /// Converts an amount expressed in `from` using this rate, whichever way
    /// round the rate is quoted. `None` when `from` is neither side of it.
    pub fn convert_from(&self, amount: f64, from: &str) -> Option<f64> {
        if self.base_currency == from {
            Some(amount * self.value)
        } else if self.target_currency == from {
            Some(amount / self.value)
        } else {
            None
        }
    }

    /// Human readable quote, e.g. "1 USD = 38.5 TRY".
    pub fn display(&self) -> String {
        format!(
            "1 {} = {} {}",
            self.base_currency, self.value, self.target_currency
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreference {
    pub selected_currency: String,
}

/// Normalizes a currency code to upper case, rejecting anything that is not
/// three ASCII letters.
pub fn currency_code(raw: &str) -> Option<String> {
    let code = raw.trim();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(code.to_ascii_uppercase())
    } else {
        None
    }
}

pub(crate) fn require_currency(var: &'static str, raw: &str) -> Result<String, ConfigError> {
    currency_code(raw).ok_or_else(|| ConfigError::Invalid {
        var,
        expected: "a three letter currency code",
        value: raw.to_string(),
    })
}

/// Sign shown in front of an amount for well-known currencies.
pub fn currency_symbol(code: &str) -> &'static str {
    match code {
        "USD" | "CAD" | "AUD" => "$",
        "EUR" => "€",
        "GBP" => "£",
        "JPY" => "¥",
        "TRY" => "₺",
        "CHF" => "CHF ",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate(value: f64, base: &str, target: &str) -> CachedRate {
        CachedRate {
            value,
            fetched_at_ms: 0,
            base_currency: base.to_string(),
            target_currency: target.to_string(),
        }
    }

    #[test]
    fn converts_in_either_direction() {
        let try_to_usd = rate(0.03, "TRY", "USD");
        let usd = try_to_usd.convert_from(1000.0, "TRY").unwrap();
        assert!((usd - 30.0).abs() < 1e-9);

        let usd_to_try = rate(40.0, "USD", "TRY");
        assert_eq!(usd_to_try.convert_from(1000.0, "TRY"), Some(25.0));

        assert_eq!(usd_to_try.convert_from(1000.0, "EUR"), None);
    }

    #[test]
    fn freshness_is_strictly_inside_ttl() {
        let r = CachedRate {
            fetched_at_ms: 1_000,
            ..rate(1.0, "USD", "TRY")
        };
        assert!(r.is_fresh(1_000 + 299_999, 300_000));
        assert!(!r.is_fresh(1_000 + 300_000, 300_000));
    }

    #[test]
    fn currency_codes_are_normalized() {
        assert_eq!(currency_code(" eur "), Some("EUR".to_string()));
        assert_eq!(currency_code("EURO"), None);
        assert_eq!(currency_code("U$D"), None);
        assert_eq!(currency_symbol("USD"), "$");
        assert_eq!(currency_symbol("SEK"), "");
    }

    #[test]
    fn display_matches_options_page_format() {
        assert_eq!(rate(38.5, "USD", "TRY").display(), "1 USD = 38.5 TRY");
    }
}
