//! Analysis result cache with per-range TTL and staleness policy.
//!
//! Entries are keyed by `(user, platform filter, time range)` and written with
//! upsert semantics. The store is a trait so the orchestrator can run against
//! SQLite in production and an in-memory map in tests.

mod memory;
pub mod policy;
mod sqlite;

pub use memory::MemoryAnalysisCache;
pub use policy::TimeRange;
pub use sqlite::SqliteAnalysisCache;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{ClassifiedComment, PlatformFilter, Summary};

/// Hard cap on comments kept in a cache entry.
pub const MAX_CACHED_COMMENTS: usize = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub user_id: i64,
    pub platform: PlatformFilter,
    pub range: TimeRange,
}

impl CacheKey {
    #[must_use]
    pub const fn new(user_id: i64, platform: PlatformFilter, range: TimeRange) -> Self {
        Self {
            user_id,
            platform,
            range,
        }
    }
}

/// Stored analysis result. `summary == None` marks a checkpoint written
/// mid-classification; it is served like any other entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisCacheEntry {
    pub comments: Vec<ClassifiedComment>,
    pub summary: Option<Summary>,
    pub refreshed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AnalysisCacheEntry {
    /// Build an entry, enforcing ordering (newest first), the comment cap and
    /// `expires_at = refreshed_at + ttl`.
    #[must_use]
    pub fn new(
        mut comments: Vec<ClassifiedComment>,
        summary: Option<Summary>,
        range: TimeRange,
        refreshed_at: DateTime<Utc>,
    ) -> Self {
        comments.sort_by(|a, b| b.comment.timestamp.cmp(&a.comment.timestamp));
        comments.truncate(MAX_CACHED_COMMENTS);
        Self {
            comments,
            summary,
            refreshed_at,
            expires_at: refreshed_at + range.ttl(),
        }
    }
}

/// Keyed store of analysis results.
#[async_trait]
pub trait AnalysisCache: Send + Sync {
    /// Fetch the live entry for a key, if any.
    async fn get(&self, key: &CacheKey) -> Result<Option<AnalysisCacheEntry>>;

    /// Insert or replace the entry for a key. Last write wins.
    async fn upsert(&self, key: &CacheKey, entry: &AnalysisCacheEntry) -> Result<()>;
}

/// What a non-refreshing read sees.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedRead {
    Hit {
        entry: AnalysisCacheEntry,
        is_stale: bool,
    },
    /// No entry yet; the caller must request a refresh.
    Empty,
}

/// Read a key without triggering collection. Stale entries are still served.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub async fn read_cached(
    cache: &dyn AnalysisCache,
    key: &CacheKey,
    now: DateTime<Utc>,
) -> Result<CachedRead> {
    Ok(match cache.get(key).await? {
        Some(entry) => {
            let is_stale = key.range.is_stale(entry.refreshed_at, now);
            CachedRead::Hit { entry, is_stale }
        }
        None => CachedRead::Empty,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Platform, UnifiedComment};
    use chrono::Duration;

    fn classified(id: usize, minutes_ago: i64, now: DateTime<Utc>) -> ClassifiedComment {
        ClassifiedComment::unclassified(UnifiedComment {
            id: format!("c{id}"),
            text: "text".to_string(),
            author: "a".to_string(),
            timestamp: now - Duration::minutes(minutes_ago),
            platform: Platform::Instagram,
            content_id: "1".to_string(),
            content_title: "post".to_string(),
            content_url: None,
        })
    }

    #[test]
    fn test_entry_expiry_matches_ttl_for_all_ranges() {
        let now = Utc::now();
        for range in TimeRange::ALL {
            let entry = AnalysisCacheEntry::new(vec![], None, range, now);
            assert_eq!(entry.expires_at - entry.refreshed_at, range.ttl());
        }
    }

    #[test]
    fn test_entry_sorts_and_caps() {
        let now = Utc::now();
        let comments: Vec<_> = (0..200).map(|i| classified(i, (i as i64 * 7) % 500, now)).collect();
        let entry = AnalysisCacheEntry::new(comments, None, TimeRange::Week, now);

        assert_eq!(entry.comments.len(), MAX_CACHED_COMMENTS);
        assert!(entry
            .comments
            .windows(2)
            .all(|w| w[0].comment.timestamp >= w[1].comment.timestamp));
    }

    #[tokio::test]
    async fn test_read_cached_empty() {
        let cache = MemoryAnalysisCache::new();
        let key = CacheKey::new(1, PlatformFilter::All, TimeRange::Day);
        let read = read_cached(&cache, &key, Utc::now()).await.unwrap();
        assert_eq!(read, CachedRead::Empty);
    }

    #[tokio::test]
    async fn test_read_cached_flags_stale_but_serves() {
        let cache = MemoryAnalysisCache::new();
        let now = Utc::now();
        let key = CacheKey::new(1, PlatformFilter::All, TimeRange::Week);
        let entry = AnalysisCacheEntry::new(
            vec![classified(1, 50, now)],
            None,
            TimeRange::Week,
            now - Duration::minutes(45),
        );
        cache.upsert(&key, &entry).await.unwrap();

        match read_cached(&cache, &key, now).await.unwrap() {
            CachedRead::Hit { entry, is_stale } => {
                assert!(is_stale);
                assert_eq!(entry.comments.len(), 1);
            }
            CachedRead::Empty => panic!("expected a cache hit"),
        }
    }

    #[tokio::test]
    async fn test_read_cached_fresh() {
        let cache = MemoryAnalysisCache::new();
        let now = Utc::now();
        let key = CacheKey::new(1, PlatformFilter::Youtube, TimeRange::Day);
        let entry = AnalysisCacheEntry::new(vec![], None, TimeRange::Day, now - Duration::minutes(5));
        cache.upsert(&key, &entry).await.unwrap();

        let read = read_cached(&cache, &key, now).await.unwrap();
        assert!(matches!(read, CachedRead::Hit { is_stale: false, .. }));
    }
}
