//! Request orchestration: cache read or full refresh.
//!
//! A non-refreshing request is answered from the cache alone, stale or not.
//! A refresh runs every selected collector in turn, merges, dedups and caps
//! the comments, then hands them to the classification pipeline, which owns
//! the cache writes.

mod locks;
mod response;

pub use locks::{RefreshGuard, RefreshLocks};
pub use response::{AnalysisRequest, AnalysisResponse, ReconnectNotice};

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::cache::{read_cached, AnalysisCache, CacheKey, CachedRead, MAX_CACHED_COMMENTS};
use crate::classify::ClassificationPipeline;
use crate::collectors::{dedup_comments, CollectError, CollectionRequest, CommentCollector};
use crate::content::{ContentIndex, ContentQuery, ContentStatus, ContentStore};

/// Tunables for a refresh run.
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    /// Most recent comments kept for classification.
    pub max_comments: usize,
    /// Stored content created this long before the cutoff is still matched.
    pub content_lookback: Duration,
    pub content_limit: i64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            max_comments: MAX_CACHED_COMMENTS,
            content_lookback: Duration::days(30),
            content_limit: 50,
        }
    }
}

pub struct AnalysisService {
    cache: Arc<dyn AnalysisCache>,
    content: Arc<dyn ContentStore>,
    collectors: Vec<Arc<dyn CommentCollector>>,
    pipeline: ClassificationPipeline,
    settings: AnalysisSettings,
    locks: RefreshLocks,
}

impl AnalysisService {
    #[must_use]
    pub fn new(
        cache: Arc<dyn AnalysisCache>,
        content: Arc<dyn ContentStore>,
        pipeline: ClassificationPipeline,
    ) -> Self {
        Self {
            cache,
            content,
            collectors: Vec::new(),
            pipeline,
            settings: AnalysisSettings::default(),
            locks: RefreshLocks::new(),
        }
    }

    #[must_use]
    pub fn with_collector(mut self, collector: Arc<dyn CommentCollector>) -> Self {
        self.collectors.push(collector);
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: AnalysisSettings) -> Self {
        self.settings = AnalysisSettings {
            max_comments: settings.max_comments.min(MAX_CACHED_COMMENTS),
            ..settings
        };
        self
    }

    /// Answer an analysis request.
    ///
    /// # Errors
    ///
    /// Fails only when a store (cache or content) cannot be reached.
    /// Collector, classifier and summarizer failures are absorbed.
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse> {
        let key = CacheKey::new(request.user_id, request.platform, request.range);

        if !request.refresh {
            return match read_cached(self.cache.as_ref(), &key, Utc::now()).await? {
                CachedRead::Hit { entry, is_stale } => Ok(AnalysisResponse::cached(entry, is_stale)),
                CachedRead::Empty => Ok(AnalysisResponse::needs_refresh()),
            };
        }

        let _guard = match self.locks.try_acquire(key) {
            Some(guard) => guard,
            None => {
                info!(user_id = key.user_id, platform = %key.platform, range = %key.range, "Refresh already running, waiting");
                self.locks.acquire(key).await
            }
        };

        self.refresh(&key).await
    }

    async fn refresh(&self, key: &CacheKey) -> Result<AnalysisResponse> {
        let now = Utc::now();
        let cutoff = key.range.cutoff(now);

        let mut fetched = Vec::new();
        let mut contents_considered = 0;
        let mut reconnect = Vec::new();

        for collector in self
            .collectors
            .iter()
            .filter(|c| key.platform.includes(c.platform()))
        {
            let platform = collector.platform();
            let records = self
                .content
                .list_content(&ContentQuery {
                    owner_id: key.user_id,
                    platform,
                    status: ContentStatus::Published,
                    created_after: cutoff - self.settings.content_lookback,
                    created_before: now,
                    limit: self.settings.content_limit,
                })
                .await
                .with_context(|| format!("Failed to load {platform} content records"))?;

            let index = ContentIndex::build(records);
            let request = CollectionRequest {
                user_id: key.user_id,
                cutoff,
                content: &index,
            };

            match collector.collect(&request).await {
                Ok(collected) => {
                    contents_considered += collected.contents_considered;
                    fetched.extend(collected.comments);
                }
                Err(CollectError::InsufficientScope { platform, message }) => {
                    warn!(user_id = key.user_id, %platform, detail = %message, "Platform token lacks required scope");
                    reconnect.push(ReconnectNotice {
                        platform,
                        message: CollectError::reconnect_message(platform),
                    });
                }
                Err(e @ CollectError::NotConnected { .. }) => {
                    info!(user_id = key.user_id, %platform, "{e}");
                }
                Err(e) => {
                    warn!(user_id = key.user_id, %platform, error = %e, "Collection failed, continuing without platform");
                }
            }
        }

        let mut comments = dedup_comments(fetched);
        let total_fetched = comments.len();
        comments.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let truncated = total_fetched > self.settings.max_comments;
        comments.truncate(self.settings.max_comments);

        info!(
            user_id = key.user_id,
            platform = %key.platform,
            range = %key.range,
            total_fetched,
            kept = comments.len(),
            contents_considered,
            "Collection finished"
        );

        let entry = self.pipeline.run(self.cache.as_ref(), key, comments).await?;
        Ok(AnalysisResponse::refreshed(
            entry,
            contents_considered,
            total_fetched,
            truncated,
            reconnect,
        ))
    }
}
