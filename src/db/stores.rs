//! SQLite-backed implementations of the content and account stores.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{get_platform_account, list_content_records, update_platform_token, Database};
use crate::content::{AccountStore, ContentQuery, ContentRecord, ContentStore, PlatformAccount};
use crate::model::Platform;

#[async_trait]
impl ContentStore for Database {
    async fn list_content(&self, query: &ContentQuery) -> Result<Vec<ContentRecord>> {
        list_content_records(self.pool(), query)
            .await?
            .into_iter()
            .map(ContentRecord::try_from)
            .collect()
    }
}

#[async_trait]
impl AccountStore for Database {
    async fn get_account(
        &self,
        user_id: i64,
        platform: Platform,
    ) -> Result<Option<PlatformAccount>> {
        get_platform_account(self.pool(), user_id, platform)
            .await?
            .map(PlatformAccount::try_from)
            .transpose()
    }

    async fn save_refreshed_token(
        &self,
        user_id: i64,
        platform: Platform,
        access_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        update_platform_token(self.pool(), user_id, platform, access_token, expires_at).await
    }
}
