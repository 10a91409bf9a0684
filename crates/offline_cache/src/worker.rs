use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::CacheSettings;
use crate::errors::{CacheError, FetchError};
use crate::fetch::Fetcher;
use crate::lifecycle::Lifecycle;
use crate::observability::{
    CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL, NETWORK_FAILURES_TOTAL, PRECACHE_FAILURES_TOTAL,
    PURGED_GENERATIONS_TOTAL, REVALIDATIONS_TOTAL,
};
use crate::request::{AssetRequest, AssetResponse, CacheKey};
use crate::storage::CacheStorage;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallReport {
    pub cached: usize,
    /// Manifest entries that could not be stored.
    pub failed: Vec<String>,
}

/// Request interceptor for one cache generation.
pub struct AssetCache {
    settings: CacheSettings,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    state: ArcSwap<Lifecycle>,
}

impl AssetCache {
    pub fn new(settings: CacheSettings, storage: Arc<dyn CacheStorage>, fetcher: Arc<dyn Fetcher>) -> Arc<Self> {
        let state = Lifecycle::Installing { generation: settings.generation.clone() };
        Arc::new(Self { settings, storage, fetcher, state: ArcSwap::from_pointee(state) })
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.load_full().as_ref().clone()
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    /// Install then activate.
    pub async fn start(&self) -> Result<InstallReport, CacheError> {
        let report = self.install().await;
        self.activate().await?;
        Ok(report)
    }

    /// Best-effort pre-population of the shell manifest. A failed asset is
    /// logged, counted, and skipped.
    pub async fn install(&self) -> InstallReport {
        let generation = self.settings.generation.clone();
        self.state.store(Arc::new(Lifecycle::Installing { generation: generation.clone() }));

        let mut report = InstallReport::default();
        for (path, url) in self.settings.manifest_urls() {
            let outcome = match url {
                Ok(url) => self.precache(&generation, url).await,
                Err(e) => Err(e.to_string()),
            };
            match outcome {
                Ok(()) => report.cached += 1,
                Err(reason) => {
                    PRECACHE_FAILURES_TOTAL.inc();
                    warn!(asset = %path, %reason, %generation, "asset not pre-cached");
                    report.failed.push(path);
                }
            }
        }
        info!(%generation, cached = report.cached, failed = report.failed.len(), "cache generation installed");
        report
    }

    async fn precache(&self, generation: &str, url: String) -> Result<(), String> {
        let request = AssetRequest::get(url);
        let response = self.fetcher.fetch(&request).await.map_err(|e| e.to_string())?;
        if !response.is_ok() {
            return Err(format!("status {}", response.status));
        }
        self.storage
            .put(generation, request.key(), response)
            .await
            .map_err(|e| e.to_string())
    }

    /// Take over request handling and purge every other generation.
    pub async fn activate(&self) -> Result<Vec<String>, CacheError> {
        let current = self.settings.generation.clone();
        let mut purged = Vec::new();
        for name in self.storage.generations().await? {
            if name != current && self.storage.delete_generation(&name).await? {
                PURGED_GENERATIONS_TOTAL.inc();
                purged.push(name);
            }
        }
        self.state.store(Arc::new(Lifecycle::Active { generation: current.clone() }));
        info!(generation = %current, ?purged, "cache generation active");
        Ok(purged)
    }

    /// Absolute URL for an incoming request target.
    pub fn resolve(&self, target: &str) -> Result<String, CacheError> {
        self.settings.resolve(target)
    }

    pub async fn handle(&self, request: AssetRequest) -> Result<AssetResponse, FetchError> {
        let state = self.state.load_full();
        let Lifecycle::Active { generation } = state.as_ref() else {
            return self.network(&request).await;
        };
        if !request.is_get() {
            return self.network(&request).await;
        }

        let key = request.key();
        let cached = self.lookup(generation, &key).await;

        if self.settings.is_same_origin(&request.url) {
            if let Some(hit) = cached {
                CACHE_HITS_TOTAL.inc();
                return Ok(hit);
            }
            CACHE_MISSES_TOTAL.inc();
            return self.network(&request).await;
        }

        // cross-origin: serve what we have, refresh for next time
        match cached {
            Some(hit) => {
                CACHE_HITS_TOTAL.inc();
                let storage = self.storage.clone();
                let fetcher = self.fetcher.clone();
                let generation = generation.clone();
                tokio::spawn(async move {
                    revalidate(storage, fetcher, generation, key, request).await;
                });
                Ok(hit)
            }
            None => {
                CACHE_MISSES_TOTAL.inc();
                let response = self.network(&request).await?;
                if response.is_ok() {
                    store(self.storage.as_ref(), generation, key, response.clone()).await;
                }
                Ok(response)
            }
        }
    }

    async fn lookup(&self, generation: &str, key: &CacheKey) -> Option<AssetResponse> {
        match self.storage.match_entry(generation, key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(error = %e, key = key.as_str(), "cache lookup failed");
                None
            }
        }
    }

    async fn network(&self, request: &AssetRequest) -> Result<AssetResponse, FetchError> {
        self.fetcher.fetch(request).await.map_err(|e| {
            NETWORK_FAILURES_TOTAL.inc();
            warn!(url = %request.url, error = %e, "network fetch failed");
            e
        })
    }
}

async fn revalidate(
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    generation: String,
    key: CacheKey,
    request: AssetRequest,
) {
    match fetcher.fetch(&request).await {
        Ok(response) if response.is_ok() => {
            REVALIDATIONS_TOTAL.inc();
            store(storage.as_ref(), &generation, key, response).await;
        }
        Ok(response) => debug!(url = %request.url, status = response.status, "revalidation kept stale entry"),
        Err(e) => {
            NETWORK_FAILURES_TOTAL.inc();
            debug!(url = %request.url, error = %e, "revalidation failed; stale entry kept");
        }
    }
}

async fn store(storage: &dyn CacheStorage, generation: &str, key: CacheKey, response: AssetResponse) {
    if let Err(e) = storage.put(generation, key, response).await {
        warn!(error = %e, %generation, "cache write failed");
    }
}
