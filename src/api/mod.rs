pub mod handlers;
pub mod models;
pub mod router;

use crate::config::Config;
use crate::rates::RateCache;
use std::net::SocketAddr;
use std::sync::Arc;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<RateCache>,
    pub config: Arc<Config>,
}

pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    pub fn new(cache: Arc<RateCache>, config: Config) -> Self {
        Self {
            state: AppState {
                cache,
                config: Arc::new(config),
            },
        }
    }

    /// Binds the server to the configured port and starts serving.
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.api_port));
        let app = router::with_metrics(router::build(self.state));

        tracing::info!("Options API listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
