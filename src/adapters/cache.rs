use crate::domain::ports::{CachedResponse, ResponseCache};
use crate::utils::error::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct CacheEntry {
    response: CachedResponse,
    stored_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        self.stored_at.elapsed() < self.response.max_age
    }
}

/// In-process stand-in for an edge cache: entries expire after their own max-age.
#[derive(Debug, Clone, Default)]
pub struct MemoryResponseCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl MemoryResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl ResponseCache for MemoryResponseCache {
    async fn lookup(&self, url: &str) -> Result<Option<CachedResponse>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(url)
            .filter(|entry| entry.is_fresh())
            .map(|entry| entry.response.clone()))
    }

    async fn store(&self, url: &str, response: CachedResponse) -> Result<()> {
        let mut entries = self.entries.write().await;
        // 順便清掉過期的
        entries.retain(|_, entry| entry.is_fresh());
        entries.insert(
            url.to_string(),
            CacheEntry {
                response,
                stored_at: Instant::now(),
            },
        );
        Ok(())
    }
}

/// Used when `server.cache_enabled = false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopResponseCache;

impl ResponseCache for NoopResponseCache {
    async fn lookup(&self, _url: &str) -> Result<Option<CachedResponse>> {
        Ok(None)
    }

    async fn store(&self, _url: &str, _response: CachedResponse) -> Result<()> {
        Ok(())
    }
}
