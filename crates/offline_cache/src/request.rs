use bytes::Bytes;

/// Outgoing resource request as seen by the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub method: String,
    /// Absolute URL.
    pub url: String,
    pub body: Bytes,
}

impl AssetRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: "GET".into(), url: url.into(), body: Bytes::new() }
    }

    pub fn new(method: impl Into<String>, url: impl Into<String>, body: Bytes) -> Self {
        Self { method: method.into(), url: url.into(), body }
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::new(&self.method, &self.url)
    }
}

/// Method plus absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(method: &str, url: &str) -> Self {
        Self(format!("{} {}", method.to_ascii_uppercase(), url))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl AssetResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, headers: Vec::new(), body: body.into() }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}
