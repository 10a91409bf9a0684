use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use configs::AppConfig;
use offline_cache::{HttpFetcher, MemoryCacheStorage};
use service::autofill::GeminiExtractor;
use service::storage::FileKv;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::errors::StartupError;
use crate::routes;
use crate::state::{AppState, Backends};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

fn bind_addr(cfg: &AppConfig) -> Result<SocketAddr, StartupError> {
    format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .map_err(|e| StartupError::InvalidConfig(format!("bind address: {e}")))
}

/// Production wiring: file-backed provider, Gemini extractor, HTTP fetcher.
pub async fn build_state(cfg: &AppConfig) -> Result<AppState, StartupError> {
    common::env::ensure_env(&cfg.storage.data_dir).await?;
    let kv = FileKv::open(cfg.storage.file_path(), cfg.storage.quota_bytes)
        .await
        .map_err(|e| StartupError::Storage(e.to_string()))?;

    let extractor = GeminiExtractor::from_config(&cfg.autofill);
    if !extractor.is_configured() {
        warn!("API_KEY not set; autofill will report failures");
    }

    let backends = Backends {
        kv,
        extractor: Arc::new(extractor),
        cache_storage: Arc::new(MemoryCacheStorage::new(cfg.cache.max_entries)),
        fetcher: Arc::new(HttpFetcher::new()),
    };
    AppState::build(cfg, backends).await
}

/// Public entry: build the app and run the HTTP server
pub async fn run(cfg: AppConfig) -> Result<(), StartupError> {
    offline_cache::observability::register_all();
    let state = build_state(&cfg).await?;

    // the shell is pre-cached in the background; requests pass through until it is active
    let assets = state.assets.clone();
    tokio::spawn(async move {
        match assets.start().await {
            Ok(report) => info!(cached = report.cached, failed = report.failed.len(), "offline cache ready"),
            Err(e) => warn!(error = %e, "offline cache activation failed"),
        }
    });

    let app: Router = routes::build_router(state, build_cors());

    let addr = bind_addr(&cfg)?;
    info!(%addr, "starting server crate");
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(anyhow::Error::from)?;
    axum::serve(listener, app).await.map_err(anyhow::Error::from)?;
    Ok(())
}
