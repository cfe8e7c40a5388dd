use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::content::{ContentRecord, ContentStatus, PlatformAccount};
use crate::model::Platform;

/// Format a timestamp the way every table stores it (sortable RFC 3339, UTC).
#[must_use]
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp.
///
/// # Errors
///
/// Returns an error if the value is not RFC 3339.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid stored timestamp: {value}"))
}

/// A user of the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub created_at: String,
}

/// A login session. Tokens are issued by the login flow, which lives outside
/// this service.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub expires_at: String,
    pub created_at: String,
    pub last_used_at: Option<String>,
}

/// Row of `content_records`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContentRecordRow {
    pub id: i64,
    pub owner_id: i64,
    pub platform: String,
    pub status: String,
    pub title: Option<String>,
    pub remote_media_id: Option<String>,
    pub remote_creation_id: Option<String>,
    pub permalink_url: Option<String>,
    pub media_url: Option<String>,
    pub platform_post_id: Option<String>,
    pub created_at: String,
}

impl TryFrom<ContentRecordRow> for ContentRecord {
    type Error = anyhow::Error;

    fn try_from(row: ContentRecordRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            owner_id: row.owner_id,
            platform: Platform::parse(&row.platform)?,
            title: row.title,
            remote_media_id: row.remote_media_id,
            remote_creation_id: row.remote_creation_id,
            permalink_url: row.permalink_url,
            media_url: row.media_url,
            platform_post_id: row.platform_post_id,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

/// Values for inserting a content record.
#[derive(Debug, Clone)]
pub struct NewContentRecord {
    pub owner_id: i64,
    pub platform: Platform,
    pub status: ContentStatus,
    pub title: Option<String>,
    pub remote_media_id: Option<String>,
    pub remote_creation_id: Option<String>,
    pub permalink_url: Option<String>,
    pub media_url: Option<String>,
    pub platform_post_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewContentRecord {
    /// A published record with no remote identifiers set.
    #[must_use]
    pub fn published(owner_id: i64, platform: Platform, created_at: DateTime<Utc>) -> Self {
        Self {
            owner_id,
            platform,
            status: ContentStatus::Published,
            title: None,
            remote_media_id: None,
            remote_creation_id: None,
            permalink_url: None,
            media_url: None,
            platform_post_id: None,
            created_at,
        }
    }
}

/// Row of `platform_accounts`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlatformAccountRow {
    pub user_id: i64,
    pub platform: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<String>,
    pub external_account_id: Option<String>,
    pub updated_at: String,
}

impl TryFrom<PlatformAccountRow> for PlatformAccount {
    type Error = anyhow::Error;

    fn try_from(row: PlatformAccountRow) -> Result<Self> {
        Ok(Self {
            user_id: row.user_id,
            platform: Platform::parse(&row.platform)?,
            access_token: row.access_token,
            refresh_token: row.refresh_token.filter(|t| !t.is_empty()),
            token_expires_at: row
                .token_expires_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            external_account_id: row.external_account_id.filter(|id| !id.is_empty()),
        })
    }
}

/// Row of `comment_analysis_cache`. Comments and summary are stored as JSON.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnalysisCacheRow {
    pub user_id: i64,
    pub platform_filter: String,
    pub time_range: String,
    pub comments_json: String,
    pub summary_json: Option<String>,
    pub refreshed_at: String,
    pub expires_at: String,
}
