use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{AnalysisCache, AnalysisCacheEntry, CacheKey};

/// Process-local cache, used in tests and when no database is wanted.
#[derive(Debug, Default)]
pub struct MemoryAnalysisCache {
    entries: RwLock<HashMap<CacheKey, AnalysisCacheEntry>>,
}

impl MemoryAnalysisCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl AnalysisCache for MemoryAnalysisCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<AnalysisCacheEntry>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn upsert(&self, key: &CacheKey, entry: &AnalysisCacheEntry) -> Result<()> {
        self.entries.write().await.insert(*key, entry.clone());
        Ok(())
    }
}
