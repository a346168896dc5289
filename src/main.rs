use std::sync::Arc;

use lira_lens::api::ApiServer;
use lira_lens::config::Config;
use lira_lens::rates::{ExchangeRateApi, RateCache};
use lira_lens::storage::{FileStore, KeyValueStore, MemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn KeyValueStore> = match &config.storage_path {
        Some(path) => Arc::new(FileStore::open(path).await?),
        None => Arc::new(MemoryStore::new()),
    };

    tracing::info!(
        "lira-lens starting: {} prices in {}, rates from {}, storage {}",
        config.page_currency,
        config.default_currency,
        config.rate_api_url,
        config
            .storage_path
            .as_ref()
            .map_or_else(|| "in memory".to_string(), |p| p.display().to_string()),
    );

    // ── 1. Rate cache, seeded from whatever was persisted ──────────
    let provider = Arc::new(ExchangeRateApi::new(&config.rate_api_url));
    let cache = Arc::new(RateCache::new(
        provider,
        store,
        &config.page_currency,
        config.cache_ttl,
    ));

    let pref = cache.load_persisted(&config.default_currency).await;

    // ── 2. Warm the cache so the first page doesn't wait on the network
    let rate = cache.get_rate(&pref.selected_currency).await;
    tracing::info!(
        "1 {} = {} {}",
        pref.selected_currency,
        rate,
        config.page_currency
    );

    // ── 3. Serve the options surface until Ctrl+C ──────────────────
    let server = ApiServer::new(cache, config);

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down..."),
    }

    Ok(())
}
