//! Internally stored content records and platform accounts, plus the store
//! traits the pipeline reads them through.

pub mod identity;

pub use identity::{ContentIdentity, ContentIndex, ExternalItem};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::Platform;

/// Lifecycle status of a stored content record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentStatus {
    Draft,
    Scheduled,
    Published,
    Failed,
}

impl ContentStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Published => "published",
            Self::Failed => "failed",
        }
    }
}

/// A post or video previously published through this system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRecord {
    pub id: i64,
    pub owner_id: i64,
    pub platform: Platform,
    pub title: Option<String>,
    pub remote_media_id: Option<String>,
    pub remote_creation_id: Option<String>,
    pub permalink_url: Option<String>,
    pub media_url: Option<String>,
    pub platform_post_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Filter for [`ContentStore::list_content`]. Results are newest-first.
#[derive(Debug, Clone)]
pub struct ContentQuery {
    pub owner_id: i64,
    pub platform: Platform,
    pub status: ContentStatus,
    pub created_after: DateTime<Utc>,
    pub created_before: DateTime<Utc>,
    pub limit: i64,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn list_content(&self, query: &ContentQuery) -> Result<Vec<ContentRecord>>;
}

/// Per-user OAuth state for one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformAccount {
    pub user_id: i64,
    pub platform: Platform,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    /// Business-account id (Instagram) or channel id (YouTube).
    pub external_account_id: Option<String>,
}

impl PlatformAccount {
    /// Whether the access token is expired, or will be within `skew`.
    #[must_use]
    pub fn token_expired(&self, now: DateTime<Utc>, skew: chrono::Duration) -> bool {
        self.token_expires_at
            .is_some_and(|expires_at| expires_at <= now + skew)
    }
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_account(&self, user_id: i64, platform: Platform)
        -> Result<Option<PlatformAccount>>;

    /// Persist a refreshed access token.
    async fn save_refreshed_token(
        &self,
        user_id: i64,
        platform: Platform,
        access_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn account(expires_at: Option<DateTime<Utc>>) -> PlatformAccount {
        PlatformAccount {
            user_id: 1,
            platform: Platform::Youtube,
            access_token: "token".to_string(),
            refresh_token: Some("refresh".to_string()),
            token_expires_at: expires_at,
            external_account_id: None,
        }
    }

    #[test]
    fn test_token_expired() {
        let now = Utc::now();
        let skew = Duration::seconds(60);
        assert!(account(Some(now - Duration::minutes(1))).token_expired(now, skew));
        assert!(account(Some(now + Duration::seconds(30))).token_expired(now, skew));
        assert!(!account(Some(now + Duration::hours(1))).token_expired(now, skew));
        assert!(!account(None).token_expired(now, skew));
    }
}
