use serde::{Deserialize, Serialize};

/// Response for GET /options and for both refresh actions
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OptionsResponse {
    pub selected_currency: String,
    pub rate: Option<f64>,
    /// "1 USD = 38.5 TRY", or "Not available"
    pub rate_display: String,
    /// Local time of the last fetch, or "Never"
    pub last_update: String,
}

/// Body of PUT /options/currency
#[derive(Debug, Deserialize, Serialize)]
pub struct CurrencyRequest {
    pub currency: String,
}
