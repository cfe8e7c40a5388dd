use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::{AnalysisCacheEntry, TimeRange};
use crate::model::{ClassifiedComment, Platform, PlatformFilter, Summary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub user_id: i64,
    pub platform: PlatformFilter,
    pub range: TimeRange,
    /// Re-run collection even if a fresh entry exists.
    pub refresh: bool,
}

/// A platform whose token lacks a required permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconnectNotice {
    pub platform: Platform,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub from_cache: bool,
    pub is_stale: bool,
    pub needs_refresh: bool,
    pub comments: Vec<ClassifiedComment>,
    pub summary: Option<Summary>,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub total_contents_considered: usize,
    pub total_fetched: usize,
    pub truncated: bool,
    pub reconnect: Vec<ReconnectNotice>,
}

impl AnalysisResponse {
    /// Nothing cached yet; the caller has to ask for a refresh.
    #[must_use]
    pub fn needs_refresh() -> Self {
        Self {
            from_cache: true,
            is_stale: true,
            needs_refresh: true,
            comments: Vec::new(),
            summary: None,
            refreshed_at: None,
            expires_at: None,
            total_contents_considered: 0,
            total_fetched: 0,
            truncated: false,
            reconnect: Vec::new(),
        }
    }

    /// A cached entry served as-is. Checkpoints without a summary are also
    /// flagged for refresh.
    #[must_use]
    pub fn cached(entry: AnalysisCacheEntry, is_stale: bool) -> Self {
        Self {
            from_cache: true,
            is_stale,
            needs_refresh: is_stale || entry.summary.is_none(),
            total_fetched: entry.comments.len(),
            comments: entry.comments,
            summary: entry.summary,
            refreshed_at: Some(entry.refreshed_at),
            expires_at: Some(entry.expires_at),
            total_contents_considered: 0,
            truncated: false,
            reconnect: Vec::new(),
        }
    }

    /// Result of a collection and classification run.
    #[must_use]
    pub fn refreshed(
        entry: AnalysisCacheEntry,
        total_contents_considered: usize,
        total_fetched: usize,
        truncated: bool,
        reconnect: Vec<ReconnectNotice>,
    ) -> Self {
        Self {
            from_cache: false,
            is_stale: false,
            needs_refresh: false,
            comments: entry.comments,
            summary: entry.summary,
            refreshed_at: Some(entry.refreshed_at),
            expires_at: Some(entry.expires_at),
            total_contents_considered,
            total_fetched,
            truncated,
            reconnect,
        }
    }
}
