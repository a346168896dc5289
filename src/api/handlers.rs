use axum::extract::State;
use axum::response::{Html, Json};

use super::AppState;
use super::models::{CurrencyRequest, OptionsResponse};
use crate::annotator::PageSession;
use crate::dom::markup;
use crate::errors::ApiError;
use crate::models::{CachedRate, currency_code};
use crate::storage::{self, StoredState};

/// GET /health — simple liveness check
pub async fn health() -> &'static str {
    "OK"
}

/// GET /options — selected currency plus the rate and when it was fetched
pub async fn get_options(State(state): State<AppState>) -> Result<Json<OptionsResponse>, ApiError> {
    let stored = StoredState::load(state.cache.store().as_ref()).await?;
    let selected = selected_currency(&state, &stored);
    Ok(Json(options_response(&state, &stored, selected)))
}

/// PUT /options/currency — saves the choice, then fetches its rate.
/// The choice stays saved even when the fetch fails.
pub async fn put_currency(
    State(state): State<AppState>,
    Json(req): Json<CurrencyRequest>,
) -> Result<Json<OptionsResponse>, ApiError> {
    let currency = currency_code(&req.currency)
        .ok_or_else(|| ApiError::InvalidCurrency(req.currency.clone()))?;

    tracing::info!("Updating to {currency}");
    storage::save_selected_currency(state.cache.store().as_ref(), &currency).await?;
    state.cache.refresh(&currency).await?;

    let stored = StoredState::load(state.cache.store().as_ref()).await?;
    Ok(Json(options_response(&state, &stored, currency)))
}

/// POST /options/refresh — fetches the latest rate for the saved currency
pub async fn post_refresh(
    State(state): State<AppState>,
) -> Result<Json<OptionsResponse>, ApiError> {
    let stored = StoredState::load(state.cache.store().as_ref()).await?;
    let selected = selected_currency(&state, &stored);

    state.cache.refresh(&selected).await?;

    let stored = StoredState::load(state.cache.store().as_ref()).await?;
    Ok(Json(options_response(&state, &stored, selected)))
}

/// POST /annotate — loads an HTML page, runs the initial scan on it and
/// returns the annotated page.
pub async fn post_annotate(
    State(state): State<AppState>,
    body: String,
) -> Result<Html<String>, ApiError> {
    let doc = markup::parse(&body)?.into_shared();

    let session = PageSession::from_config(doc.clone(), state.cache.clone(), &state.config);
    // one-shot page: nothing will be inserted after the initial scan
    drop(session.initialize().await);

    let html = doc.lock().await.to_html();
    Ok(Html(html))
}

fn selected_currency(state: &AppState, stored: &StoredState) -> String {
    stored
        .selected_currency
        .as_deref()
        .and_then(currency_code)
        .unwrap_or_else(|| state.config.default_currency.clone())
}

fn options_response(state: &AppState, stored: &StoredState, selected: String) -> OptionsResponse {
    let page = state.cache.page_currency();
    let rate: Option<CachedRate> = state
        .cache
        .cached(&selected)
        .or_else(|| stored.cached_rate().filter(|r| r.is_for(&selected, page)));

    OptionsResponse {
        rate: rate.as_ref().map(|r| r.value),
        rate_display: rate
            .as_ref()
            .map_or_else(|| "Not available".to_string(), CachedRate::display),
        last_update: stored
            .last_update_date
            .clone()
            .unwrap_or_else(|| "Never".to_string()),
        selected_currency: selected,
    }
}
