use reqwest::Url;

use crate::errors::CacheError;

/// Runtime view of `configs::CacheConfig` with the origin parsed once.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub generation: String,
    pub max_entries: u64,
    pub manifest: Vec<String>,
    base: Url,
}

impl CacheSettings {
    pub fn new(generation: impl Into<String>, origin: &str, manifest: Vec<String>, max_entries: u64) -> Result<Self, CacheError> {
        let mut base = Url::parse(origin).map_err(|e| CacheError::InvalidUrl(format!("{origin}: {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { generation: generation.into(), max_entries, manifest, base })
    }

    pub fn from_config(cfg: &configs::CacheConfig) -> Result<Self, CacheError> {
        Self::new(cfg.generation.clone(), &cfg.origin, cfg.manifest.clone(), cfg.max_entries)
    }

    /// Origin the shell is served from, e.g. `http://127.0.0.1:5173`.
    pub fn origin(&self) -> String {
        self.base.origin().ascii_serialization()
    }

    /// Absolute URLs pass through; anything else is resolved against the origin.
    pub fn resolve(&self, target: &str) -> Result<String, CacheError> {
        match Url::parse(target) {
            Ok(url) => Ok(url.to_string()),
            Err(_) => self
                .base
                .join(target)
                .map(|u| u.to_string())
                .map_err(|e| CacheError::InvalidUrl(format!("{target}: {e}"))),
        }
    }

    pub fn is_same_origin(&self, url: &str) -> bool {
        Url::parse(url).map(|u| u.origin() == self.base.origin()).unwrap_or(false)
    }

    /// Absolute URLs of every manifest entry, paired with the entry as configured.
    pub fn manifest_urls(&self) -> Vec<(String, Result<String, CacheError>)> {
        self.manifest.iter().map(|p| (p.clone(), self.resolve(p))).collect()
    }
}
