use async_trait::async_trait;
use dashmap::DashMap;
use moka::future::Cache;

use crate::errors::CacheError;
use crate::request::{AssetResponse, CacheKey};

/// Named cache generations, each a map from request key to stored response.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    async fn match_entry(&self, generation: &str, key: &CacheKey) -> Result<Option<AssetResponse>, CacheError>;
    async fn put(&self, generation: &str, key: CacheKey, response: AssetResponse) -> Result<(), CacheError>;
    async fn generations(&self) -> Result<Vec<String>, CacheError>;
    /// `true` when the generation existed.
    async fn delete_generation(&self, generation: &str) -> Result<bool, CacheError>;
}

/// In-process storage; every generation is a bounded moka cache.
pub struct MemoryCacheStorage {
    generations: DashMap<String, Cache<CacheKey, AssetResponse>>,
    max_entries: u64,
}

impl MemoryCacheStorage {
    pub fn new(max_entries: u64) -> Self {
        Self { generations: DashMap::new(), max_entries }
    }

    fn generation(&self, name: &str) -> Option<Cache<CacheKey, AssetResponse>> {
        self.generations.get(name).map(|c| c.value().clone())
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn match_entry(&self, generation: &str, key: &CacheKey) -> Result<Option<AssetResponse>, CacheError> {
        match self.generation(generation) {
            Some(cache) => Ok(cache.get(key).await),
            None => Ok(None),
        }
    }

    async fn put(&self, generation: &str, key: CacheKey, response: AssetResponse) -> Result<(), CacheError> {
        let cache = self
            .generations
            .entry(generation.to_string())
            .or_insert_with(|| Cache::builder().max_capacity(self.max_entries).build())
            .value()
            .clone();
        cache.insert(key, response).await;
        Ok(())
    }

    async fn generations(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.generations.iter().map(|e| e.key().clone()).collect())
    }

    async fn delete_generation(&self, generation: &str) -> Result<bool, CacheError> {
        match self.generations.remove(generation) {
            Some((_, cache)) => {
                cache.invalidate_all();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
