use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{AnalysisCache, AnalysisCacheEntry, CacheKey};
use crate::db::{
    format_timestamp, get_analysis_cache, parse_timestamp, upsert_analysis_cache,
    AnalysisCacheRow, Database,
};

/// Durable cache backed by the `comment_analysis_cache` table.
#[derive(Debug, Clone)]
pub struct SqliteAnalysisCache {
    db: Database,
}

impl SqliteAnalysisCache {
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AnalysisCache for SqliteAnalysisCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<AnalysisCacheEntry>> {
        let Some(row) = get_analysis_cache(
            self.db.pool(),
            key.user_id,
            key.platform.as_str(),
            key.range.label(),
        )
        .await?
        else {
            return Ok(None);
        };

        let comments = serde_json::from_str(&row.comments_json)
            .context("Failed to decode cached comments")?;
        let summary = row
            .summary_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .context("Failed to decode cached summary")?;

        Ok(Some(AnalysisCacheEntry {
            comments,
            summary,
            refreshed_at: parse_timestamp(&row.refreshed_at)?,
            expires_at: parse_timestamp(&row.expires_at)?,
        }))
    }

    async fn upsert(&self, key: &CacheKey, entry: &AnalysisCacheEntry) -> Result<()> {
        let row = AnalysisCacheRow {
            user_id: key.user_id,
            platform_filter: key.platform.as_str().to_string(),
            time_range: key.range.label().to_string(),
            comments_json: serde_json::to_string(&entry.comments)
                .context("Failed to encode comments")?,
            summary_json: entry
                .summary
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .context("Failed to encode summary")?,
            refreshed_at: format_timestamp(entry.refreshed_at),
            expires_at: format_timestamp(entry.expires_at),
        };
        upsert_analysis_cache(self.db.pool(), &row).await
    }
}
