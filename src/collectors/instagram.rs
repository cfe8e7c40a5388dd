//! Instagram Graph API collector.
//!
//! Lists the business account's media with cursor pagination, then fetches
//! comments for the most recent media inside the requested window.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::api::{fetch_json, parse_platform_time, FetchError};
use super::{Collected, CollectError, CollectionRequest, CommentCollector};
use crate::content::{AccountStore, ExternalItem};
use crate::model::{Platform, UnifiedComment};

/// Hard cap on media items listed per run.
const MAX_MEDIA: usize = 200;
/// Media items inside the window whose comments are fetched.
const MAX_MEDIA_WITH_COMMENTS: usize = 20;
const PAGE_SIZE: usize = 50;
const PAGE_LIMIT: &str = "50";
/// Upper bound on media pages requested, whatever the cursors say.
const MAX_MEDIA_PAGES: usize = MAX_MEDIA.div_ceil(PAGE_SIZE) + 1;
const MEDIA_FIELDS: &str = "id,caption,permalink,media_url,timestamp";
const COMMENT_FIELDS: &str = "id,text,username,timestamp";

#[derive(Debug, Deserialize)]
struct Me {
    id: String,
    /// Present on the Instagram Login flavour of the API.
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Media {
    id: String,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
}

impl Media {
    fn published_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp.as_deref().and_then(parse_platform_time)
    }

    fn as_external(&self) -> ExternalItem<'_> {
        ExternalItem {
            id: &self.id,
            permalink: self.permalink.as_deref(),
            caption: self.caption.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IgComment {
    id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    username: Option<String>,
    timestamp: String,
}

pub struct InstagramCollector {
    client: Client,
    base_url: String,
    accounts: Arc<dyn AccountStore>,
}

impl InstagramCollector {
    #[must_use]
    pub fn new(client: Client, base_url: &str, accounts: Arc<dyn AccountStore>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            accounts,
        }
    }

    fn scope_error(message: String) -> CollectError {
        CollectError::InsufficientScope {
            platform: Platform::Instagram,
            message,
        }
    }

    /// Resolve the business-account id with a "who am I" call.
    async fn resolve_account_id(&self, token: &str) -> Result<String, CollectError> {
        let request = self
            .client
            .get(format!("{}/me", self.base_url))
            .query(&[("fields", "id,username"), ("access_token", token)]);

        match fetch_json::<Me>(request).await {
            Ok(me) => Ok(me.user_id.filter(|id| !id.is_empty()).unwrap_or(me.id)),
            Err(FetchError::InsufficientScope(message)) => Err(Self::scope_error(message)),
            Err(e) => Err(CollectError::Unavailable {
                platform: Platform::Instagram,
                reason: format!("could not resolve business account: {e}"),
            }),
        }
    }

    /// List media, following `paging.next` until exhausted or capped.
    ///
    /// A failure on the first page makes the platform unavailable; a failure
    /// on a later page keeps what was already listed. Listing also stops on an
    /// empty page, a repeated cursor URL or after [`MAX_MEDIA_PAGES`] pages.
    async fn list_media(&self, account_id: &str, token: &str) -> Result<Vec<Media>, CollectError> {
        let mut media: Vec<Media> = Vec::new();
        let mut requested: HashSet<String> = HashSet::new();
        let mut next: Option<String> = None;

        for page_number in 1..=MAX_MEDIA_PAGES {
            let request = match &next {
                Some(url) => self.client.get(url.as_str()),
                None => self
                    .client
                    .get(format!("{}/{}/media", self.base_url, account_id))
                    .query(&[
                        ("fields", MEDIA_FIELDS),
                        ("limit", PAGE_LIMIT),
                        ("access_token", token),
                    ]),
            };

            let page: Page<Media> = match fetch_json(request).await {
                Ok(page) => page,
                Err(FetchError::InsufficientScope(message)) => {
                    return Err(Self::scope_error(message))
                }
                Err(e) if media.is_empty() => {
                    return Err(CollectError::Unavailable {
                        platform: Platform::Instagram,
                        reason: format!("media listing failed: {e}"),
                    })
                }
                Err(e) => {
                    warn!(listed = media.len(), error = %e, "Media pagination failed, keeping partial list");
                    break;
                }
            };

            if page.data.is_empty() {
                debug!(page = page_number, "Empty media page, stopping");
                break;
            }

            media.extend(page.data);
            if media.len() >= MAX_MEDIA {
                media.truncate(MAX_MEDIA);
                break;
            }

            match page.paging.and_then(|p| p.next) {
                Some(url) if !requested.insert(url.clone()) => {
                    warn!(page = page_number, "Media cursor repeated, stopping");
                    break;
                }
                Some(url) => next = Some(url),
                None => break,
            }
        }

        Ok(media)
    }

    async fn fetch_comments(&self, media_id: &str, token: &str) -> Result<Vec<IgComment>, FetchError> {
        let request = self
            .client
            .get(format!("{}/{}/comments", self.base_url, media_id))
            .query(&[
                ("fields", COMMENT_FIELDS),
                ("limit", PAGE_LIMIT),
                ("access_token", token),
            ]);
        let page: Page<IgComment> = fetch_json(request).await?;
        Ok(page.data)
    }
}

#[async_trait]
impl CommentCollector for InstagramCollector {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    async fn collect(&self, request: &CollectionRequest<'_>) -> Result<Collected, CollectError> {
        let account = self
            .accounts
            .get_account(request.user_id, Platform::Instagram)
            .await
            .context("Failed to load Instagram account")?
            .ok_or(CollectError::NotConnected {
                platform: Platform::Instagram,
            })?;
        let token = account.access_token.as_str();

        let account_id = match account.external_account_id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => self.resolve_account_id(token).await?,
        };

        let media = self.list_media(&account_id, token).await?;
        let listed = media.len();
        let recent: Vec<Media> = media
            .into_iter()
            .filter(|m| m.published_at().is_some_and(|t| t >= request.cutoff))
            .take(MAX_MEDIA_WITH_COMMENTS)
            .collect();

        info!(
            user_id = request.user_id,
            platform = "instagram",
            listed,
            in_window = recent.len(),
            "Fetching Instagram comments"
        );

        let mut collected = Collected::default();
        let mut unmatched = 0;
        for item in &recent {
            collected.contents_considered += 1;

            let comments = match self.fetch_comments(&item.id, token).await {
                Ok(comments) => comments,
                Err(FetchError::InsufficientScope(message)) => return Err(Self::scope_error(message)),
                Err(e) => {
                    warn!(media_id = %item.id, timeout = e.is_timeout(), error = %e, "Failed to fetch media comments");
                    continue;
                }
            };

            let identity = request.content.resolve(Platform::Instagram, &item.as_external());
            if !identity.matched {
                unmatched += 1;
            }
            for comment in comments {
                let Some(timestamp) = parse_platform_time(&comment.timestamp) else {
                    debug!(comment_id = %comment.id, "Skipping comment with unparseable timestamp");
                    continue;
                };
                if timestamp < request.cutoff {
                    continue;
                }
                collected.comments.push(UnifiedComment {
                    id: comment.id,
                    text: comment.text,
                    author: comment.username.unwrap_or_else(|| "unknown".to_string()),
                    timestamp,
                    platform: Platform::Instagram,
                    content_id: identity.content_id.clone(),
                    content_title: identity.content_title.clone(),
                    content_url: identity.content_url.clone(),
                });
            }
        }

        info!(
            user_id = request.user_id,
            platform = "instagram",
            comments = collected.comments.len(),
            media = collected.contents_considered,
            unmatched,
            "Instagram collection complete"
        );
        Ok(collected)
    }
}
