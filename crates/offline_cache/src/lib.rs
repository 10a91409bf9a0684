//! Versioned offline cache for the app shell and cross-origin assets.
//!
//! A generation is installed by pre-fetching the shell manifest, then activated,
//! which purges every other generation. Requests are answered cache-first for
//! same-origin assets and stale-while-revalidate for cross-origin ones.

pub mod config;
pub mod errors;
pub mod fetch;
pub mod lifecycle;
pub mod observability;
pub mod request;
pub mod storage;
pub mod worker;

pub use config::CacheSettings;
pub use errors::{CacheError, FetchError};
pub use fetch::{Fetcher, HttpFetcher};
pub use lifecycle::Lifecycle;
pub use request::{AssetRequest, AssetResponse, CacheKey};
pub use storage::{CacheStorage, MemoryCacheStorage};
pub use worker::{AssetCache, InstallReport};
