use thiserror::Error;

/// The network could not produce a response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("cache storage error: {0}")]
    Storage(String),
}
