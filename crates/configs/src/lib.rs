use anyhow::anyhow;
use anyhow::Result;
use serde::Deserialize;
use url::Url;

/// Every photo slot shares this ceiling unless `uploads.max_file_bytes` says otherwise.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// Bumped on every deploy that changes a manifest asset.
pub const DEFAULT_CACHE_GENERATION: &str = "vk-apps-cache-v1";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub autofill: AutofillConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8081, worker_threads: Some(4) }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_file_name")]
    pub file_name: String,
    /// Capacity of the key-value provider; `None` means unbounded.
    #[serde(default = "default_quota_bytes")]
    pub quota_bytes: Option<u64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            file_name: default_file_name(),
            quota_bytes: default_quota_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self { max_file_bytes: default_max_file_bytes() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_generation")]
    pub generation: String,
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            generation: default_generation(),
            origin: default_origin(),
            max_entries: default_max_entries(),
            manifest: default_manifest(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutofillConfig {
    #[serde(default = "default_autofill_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_autofill_model")]
    pub model: String,
    /// Never read from the TOML file; filled from `API_KEY` / `GEMINI_API_KEY`.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for AutofillConfig {
    fn default() -> Self {
        Self {
            endpoint: default_autofill_endpoint(),
            model: default_autofill_model(),
            api_key: None,
        }
    }
}

fn default_data_dir() -> String { "data".into() }
fn default_file_name() -> String { "local_storage.json".into() }
fn default_quota_bytes() -> Option<u64> { Some(10 * 1024 * 1024) }
fn default_max_file_bytes() -> u64 { DEFAULT_MAX_UPLOAD_BYTES }
fn default_generation() -> String { DEFAULT_CACHE_GENERATION.into() }
fn default_origin() -> String { "http://127.0.0.1:5173".into() }
fn default_max_entries() -> u64 { 512 }
fn default_autofill_endpoint() -> String { "https://generativelanguage.googleapis.com/v1beta".into() }
fn default_autofill_model() -> String { "gemini-3-flash-preview".into() }

fn default_manifest() -> Vec<String> {
    [
        "./",
        "./index.html",
        "./manifest.json",
        "./icons/icon-192.png",
        "./icons/icon-512.png",
        "./index.tsx",
        "./App.tsx",
        "./types.ts",
        "./components/Dashboard.tsx",
        "./components/Flashlight.tsx",
        "./components/Calculator.tsx",
        "./components/WorkApp.tsx",
        "./components/Button.tsx",
        "./components/InstallPrompt.tsx",
        "./services/geminiService.ts",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    load_from_str(&content)
}

pub fn load_from_str(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Load `config.toml` (or `CONFIG_PATH`), falling back to defaults when the file is absent.
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = match load_default() {
            Ok(cfg) => cfg,
            Err(e) if is_not_found(&e) => AppConfig::default(),
            Err(e) => return Err(e),
        };
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize_from_env();
        self.server.normalize()?;
        self.storage.validate()?;
        self.uploads.validate()?;
        self.cache.normalize()?;
        self.reject_self_origin()?;
        self.autofill.normalize_from_env();
        Ok(())
    }

    /// `cache.origin` must not be this server's own listener.
    fn reject_self_origin(&self) -> Result<()> {
        let origin = Url::parse(&self.cache.origin).map_err(|e| anyhow!("cache.origin is not a valid URL: {e}"))?;
        let host = origin
            .host_str()
            .ok_or_else(|| anyhow!("cache.origin must name a host"))?;
        if origin.port_or_known_default() == Some(self.server.port) && same_listener(&self.server.host, host) {
            return Err(anyhow!(
                "cache.origin {} points at this server ({}:{})",
                self.cache.origin,
                self.server.host,
                self.server.port
            ));
        }
        Ok(())
    }
}

const LOCAL_HOSTS: [&str; 3] = ["127.0.0.1", "localhost", "::1"];

fn same_listener(bind_host: &str, origin_host: &str) -> bool {
    let bind = bind_host.trim().trim_matches(&['[', ']'][..]).to_ascii_lowercase();
    let origin = origin_host.trim_matches(&['[', ']'][..]).to_ascii_lowercase();
    let local_origin = LOCAL_HOSTS.contains(&origin.as_str()) || origin == "0.0.0.0" || origin == "::";
    bind == origin
        || (LOCAL_HOSTS.contains(&bind.as_str()) && local_origin)
        || ((bind == "0.0.0.0" || bind == "::") && local_origin)
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<std::io::Error>()
        .map(|io| io.kind() == std::io::ErrorKind::NotFound)
        .unwrap_or(false)
}

impl ServerConfig {
    fn normalize_from_env(&mut self) {
        if let Ok(host) = std::env::var("SERVER_HOST") {
            self.host = host;
        }
        if let Some(port) = std::env::var("SERVER_PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            self.port = port;
        }
    }

    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be within 1..=65535"));
        }
        match self.worker_threads {
            Some(0) | None => self.worker_threads = Some(4),
            Some(_) => {}
        }
        Ok(())
    }
}

impl StorageConfig {
    fn validate(&self) -> Result<()> {
        if self.data_dir.trim().is_empty() {
            return Err(anyhow!("storage.data_dir must not be empty"));
        }
        if self.file_name.trim().is_empty() || self.file_name.contains('/') {
            return Err(anyhow!("storage.file_name must be a plain file name"));
        }
        if self.quota_bytes == Some(0) {
            return Err(anyhow!("storage.quota_bytes must be positive when set"));
        }
        Ok(())
    }

    pub fn file_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.data_dir).join(&self.file_name)
    }
}

impl UploadConfig {
    fn validate(&self) -> Result<()> {
        if self.max_file_bytes == 0 {
            return Err(anyhow!("uploads.max_file_bytes must be positive"));
        }
        Ok(())
    }
}

impl CacheConfig {
    fn normalize(&mut self) -> Result<()> {
        self.generation = self.generation.trim().to_string();
        if self.generation.is_empty() {
            return Err(anyhow!("cache.generation must not be empty"));
        }
        let origin = self.origin.trim().trim_end_matches('/').to_string();
        let lower = origin.to_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return Err(anyhow!("cache.origin must start with http:// or https://"));
        }
        self.origin = origin;
        if self.max_entries == 0 {
            return Err(anyhow!("cache.max_entries must be positive"));
        }
        if let Some(bad) = self
            .manifest
            .iter()
            .find(|p| p.contains("://") || p.starts_with("//"))
        {
            return Err(anyhow!("cache.manifest entry {bad} is not a same-origin relative path"));
        }
        Ok(())
    }
}

impl AutofillConfig {
    fn normalize_from_env(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("API_KEY")
                .or_else(|_| std::env::var("GEMINI_API_KEY"))
                .ok()
                .filter(|k| !k.trim().is_empty());
        }
        self.endpoint = self.endpoint.trim_end_matches('/').to_string();
    }
}
