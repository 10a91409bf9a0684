use async_trait::async_trait;
use reqwest::Method;
use tracing::debug;

use crate::errors::FetchError;
use crate::request::{AssetRequest, AssetResponse};

/// The network side of the cache.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse, FetchError>;
}

#[derive(Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse, FetchError> {
        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|e| FetchError::InvalidRequest(e.to_string()))?;
        let mut builder = self.client.request(method, &request.url);
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }
        let resp = builder.send().await.map_err(|e| FetchError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();
        let body = resp.bytes().await.map_err(|e| FetchError::Network(e.to_string()))?;
        debug!(url = %request.url, status, bytes = body.len(), "fetched");
        Ok(AssetResponse { status, headers, body })
    }
}
