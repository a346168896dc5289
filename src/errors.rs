use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RateError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate provider returned status {0}")]
    Status(u16),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No {target} rate in response for base {base}")]
    MissingRate { base: String, target: String },

    #[error("Invalid rate {0}: must be a positive finite number")]
    InvalidRate(f64),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum MarkupError {
    #[error("Unterminated {0} at byte {1}")]
    Unterminated(&'static str, usize),
}

/// Errors surfaced by the options API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid currency code: {0:?}")]
    InvalidCurrency(String),

    #[error("Error fetching exchange rate: {0}")]
    Refresh(#[from] RateError),

    #[error("Invalid markup: {0}")]
    Markup(#[from] MarkupError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidCurrency(_) | ApiError::Markup(_) => StatusCode::BAD_REQUEST,
            ApiError::Refresh(_) => StatusCode::BAD_GATEWAY,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::warn!("API error ({status}): {self}");
        (status, self.to_string()).into_response()
    }
}
