//! HTTP API server over the configured stores.

pub mod routes;

use crate::config::StoreRegistry;
use crate::metrics::MetricsCollector;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Shared application state for the HTTP server.
pub struct AppState {
    pub registry: RwLock<StoreRegistry>,
    pub metrics: RwLock<MetricsCollector>,
}

impl AppState {
    pub fn new(registry: StoreRegistry) -> Arc<Self> {
        Arc::new(Self {
            registry: RwLock::new(registry),
            metrics: RwLock::new(MetricsCollector::new()),
        })
    }
}

/// Serve the API on `addr` until the process is stopped.
pub async fn start(addr: &str, registry: StoreRegistry) -> anyhow::Result<()> {
    let stores = registry.names().join(", ");
    let app = routes::create_router(AppState::new(registry));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, %stores, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
