use std::sync::Arc;

use configs::AppConfig;
use offline_cache::{AssetCache, CacheSettings, CacheStorage, Fetcher};
use service::autofill::{AutofillGate, Extractor};
use service::calculator::Calculator;
use service::photos::UploadPolicy;
use service::records::RecordStore;
use service::storage::KvProvider;
use service::workbook::Workbook;
use tokio::sync::Mutex;

use crate::errors::StartupError;

/// Shared handles for every route.
#[derive(Clone)]
pub struct AppState {
    pub records: Arc<RecordStore>,
    pub calculator: Arc<Calculator>,
    pub autofill_gate: Arc<AutofillGate>,
    pub extractor: Arc<dyn Extractor>,
    pub assets: Arc<AssetCache>,
    pub upload_policy: UploadPolicy,
    /// Entry form and detail view of the device's single user.
    pub workbook: Arc<Mutex<Workbook>>,
}

/// Collaborators chosen by the caller: production wiring passes the file
/// provider and real network clients, tests pass in-memory fakes.
pub struct Backends {
    pub kv: Arc<dyn KvProvider>,
    pub extractor: Arc<dyn Extractor>,
    pub cache_storage: Arc<dyn CacheStorage>,
    pub fetcher: Arc<dyn Fetcher>,
}

impl AppState {
    pub async fn build(cfg: &AppConfig, backends: Backends) -> Result<Self, StartupError> {
        let settings =
            CacheSettings::from_config(&cfg.cache).map_err(|e| StartupError::InvalidConfig(e.to_string()))?;
        let records = RecordStore::open(backends.kv.clone()).await;
        let upload_policy = UploadPolicy::from(&cfg.uploads);
        Ok(Self {
            workbook: Arc::new(Mutex::new(Workbook::new(records.clone(), upload_policy))),
            records,
            calculator: Calculator::open(backends.kv).await,
            autofill_gate: Arc::new(AutofillGate::new()),
            extractor: backends.extractor,
            assets: AssetCache::new(settings, backends.cache_storage, backends.fetcher),
            upload_policy,
        })
    }

    /// Body limit for every route except photo upload, which streams its parts.
    pub fn body_limit(&self) -> usize {
        let per_file = usize::try_from(self.upload_policy.max_file_bytes).unwrap_or(usize::MAX);
        per_file.saturating_mul(8).max(2 * 1024 * 1024)
    }
}
