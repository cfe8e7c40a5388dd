//! YouTube Data API collector.
//!
//! Comments are sourced two ways: from videos this system published (stored
//! content records) and from a channel-wide search for recent uploads that
//! the stored records may not know about. Both paths share one
//! [`ProcessedIds`] set so each video is fetched at most once.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::api::{fetch_json, parse_platform_time, FetchError};
use super::dedup::ProcessedIds;
use super::{Collected, CollectError, CollectionRequest, CommentCollector};
use crate::content::{
    AccountStore, ContentIdentity, ContentRecord, ExternalItem, PlatformAccount,
};
use crate::model::{Platform, UnifiedComment};

/// Recent uploads listed by the channel-wide fallback.
const FALLBACK_SEARCH_RESULTS: &str = "25";
/// Unprocessed fallback videos whose comments are fetched.
const MAX_FALLBACK_VIDEOS: usize = 10;
const THREADS_PER_VIDEO: &str = "100";
/// Tokens this close to expiry are refreshed first.
const TOKEN_EXPIRY_SKEW_SECS: i64 = 60;

static VIDEO_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:youtube\.com/(?:watch\?(?:[^#]*&)?v=|shorts/|embed/|live/)|youtu\.be/)([A-Za-z0-9_-]{11})",
    )
    .unwrap()
});

/// Extract a video id from any of the common YouTube URL forms.
#[must_use]
pub fn extract_video_id(url: &str) -> Option<String> {
    VIDEO_ID_PATTERN
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Remote video id for a stored record: explicit ids first, then URLs.
#[must_use]
pub fn video_id_for(record: &ContentRecord) -> Option<String> {
    let explicit = [&record.platform_post_id, &record.remote_media_id]
        .into_iter()
        .filter_map(|v| v.as_deref().map(str::trim))
        .find(|v| !v.is_empty())
        .map(|v| {
            if v.contains('/') {
                extract_video_id(v)
            } else {
                Some(v.to_string())
            }
        });

    if let Some(Some(id)) = explicit {
        return Some(id);
    }

    [&record.permalink_url, &record.media_url]
        .into_iter()
        .filter_map(|v| v.as_deref())
        .find_map(extract_video_id)
}

fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

/// OAuth client used to refresh expired access tokens.
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

const fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    id: SearchId,
    #[serde(default)]
    snippet: Option<SearchSnippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchId {
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchSnippet {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentThread {
    id: String,
    snippet: ThreadSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadSnippet {
    top_level_comment: TopLevelComment,
}

#[derive(Debug, Deserialize)]
struct TopLevelComment {
    snippet: CommentSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentSnippet {
    #[serde(default)]
    text_original: Option<String>,
    #[serde(default)]
    text_display: Option<String>,
    #[serde(default)]
    author_display_name: Option<String>,
    published_at: String,
}

pub struct YoutubeCollector {
    client: Client,
    api_base: String,
    oauth: Option<OAuthCredentials>,
    accounts: Arc<dyn AccountStore>,
}

impl YoutubeCollector {
    #[must_use]
    pub fn new(client: Client, api_base: &str, accounts: Arc<dyn AccountStore>) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            oauth: None,
            accounts,
        }
    }

    /// Enable token refresh. Without credentials an expired token makes the
    /// platform unavailable.
    #[must_use]
    pub fn with_oauth(mut self, credentials: OAuthCredentials) -> Self {
        self.oauth = Some(credentials);
        self
    }

    fn scope_error(message: String) -> CollectError {
        CollectError::InsufficientScope {
            platform: Platform::Youtube,
            message,
        }
    }

    fn unavailable(reason: impl Into<String>) -> CollectError {
        CollectError::Unavailable {
            platform: Platform::Youtube,
            reason: reason.into(),
        }
    }

    /// Return a usable access token, refreshing and persisting it if the
    /// stored one is expired.
    async fn access_token(&self, account: &PlatformAccount) -> Result<String, CollectError> {
        let now = Utc::now();
        if !account.token_expired(now, Duration::seconds(TOKEN_EXPIRY_SKEW_SECS)) {
            return Ok(account.access_token.clone());
        }

        let Some(refresh_token) = account.refresh_token.as_deref().filter(|t| !t.is_empty()) else {
            return Err(Self::unavailable("token expired and no refresh token stored"));
        };
        let Some(oauth) = &self.oauth else {
            return Err(Self::unavailable("token expired and no OAuth client configured"));
        };

        let request = self.client.post(oauth.token_url.as_str()).form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", oauth.client_secret.as_str()),
        ]);

        let refreshed: TokenResponse = fetch_json(request)
            .await
            .map_err(|e| Self::unavailable(format!("token refresh failed: {e}")))?;

        let expires_at = now + Duration::seconds(refreshed.expires_in);
        if let Err(e) = self
            .accounts
            .save_refreshed_token(account.user_id, Platform::Youtube, &refreshed.access_token, expires_at)
            .await
        {
            warn!(user_id = account.user_id, error = %e, "Failed to persist refreshed YouTube token");
        } else {
            info!(user_id = account.user_id, %expires_at, "Refreshed YouTube access token");
        }

        Ok(refreshed.access_token)
    }

    async fn resolve_channel_id(&self, token: &str) -> Result<Option<String>, FetchError> {
        let request = self
            .client
            .get(format!("{}/channels", self.api_base))
            .query(&[("part", "id"), ("mine", "true")])
            .bearer_auth(token);
        let channels: ListResponse<Channel> = fetch_json(request).await?;
        Ok(channels.items.into_iter().next().map(|c| c.id))
    }

    async fn search_recent_videos(
        &self,
        channel_id: &str,
        token: &str,
    ) -> Result<Vec<SearchResult>, FetchError> {
        let request = self
            .client
            .get(format!("{}/search", self.api_base))
            .query(&[
                ("part", "snippet"),
                ("channelId", channel_id),
                ("type", "video"),
                ("order", "date"),
                ("maxResults", FALLBACK_SEARCH_RESULTS),
            ])
            .bearer_auth(token);
        let results: ListResponse<SearchResult> = fetch_json(request).await?;
        Ok(results.items)
    }

    async fn fetch_threads(&self, video_id: &str, token: &str) -> Result<Vec<CommentThread>, FetchError> {
        let request = self
            .client
            .get(format!("{}/commentThreads", self.api_base))
            .query(&[
                ("part", "snippet"),
                ("videoId", video_id),
                ("maxResults", THREADS_PER_VIDEO),
                ("order", "time"),
            ])
            .bearer_auth(token);
        let threads: ListResponse<CommentThread> = fetch_json(request).await?;
        Ok(threads.items)
    }

    /// Fetch one video's threads into `out`. Per-video failures are logged
    /// and skipped; scope failures abort the platform.
    async fn collect_video(
        &self,
        video_id: &str,
        token: &str,
        identity: &ContentIdentity,
        cutoff: DateTime<Utc>,
        out: &mut Vec<UnifiedComment>,
    ) -> Result<(), CollectError> {
        let threads = match self.fetch_threads(video_id, token).await {
            Ok(threads) => threads,
            Err(FetchError::InsufficientScope(message)) => return Err(Self::scope_error(message)),
            Err(e) => {
                warn!(video_id, timeout = e.is_timeout(), error = %e, "Failed to fetch comment threads");
                return Ok(());
            }
        };

        for thread in threads {
            let snippet = thread.snippet.top_level_comment.snippet;
            let Some(timestamp) = parse_platform_time(&snippet.published_at) else {
                debug!(comment_id = %thread.id, "Skipping comment with unparseable timestamp");
                continue;
            };
            if timestamp < cutoff {
                continue;
            }
            out.push(UnifiedComment {
                id: thread.id,
                text: snippet
                    .text_original
                    .or(snippet.text_display)
                    .unwrap_or_default(),
                author: snippet
                    .author_display_name
                    .unwrap_or_else(|| "unknown".to_string()),
                timestamp,
                platform: Platform::Youtube,
                content_id: identity.content_id.clone(),
                content_title: identity.content_title.clone(),
                content_url: identity.content_url.clone(),
            });
        }
        Ok(())
    }

    /// Channel-wide pass over recent uploads not reached through stored
    /// records.
    async fn collect_fallback(
        &self,
        account: &PlatformAccount,
        token: &str,
        request: &CollectionRequest<'_>,
        processed: &mut ProcessedIds,
        collected: &mut Collected,
    ) -> Result<(), CollectError> {
        let stored_channel = account
            .external_account_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(ToString::to_string);
        let channel_id = match stored_channel {
            Some(id) => id,
            None => match self.resolve_channel_id(token).await {
                Ok(Some(id)) => id,
                Ok(None) => {
                    info!(user_id = request.user_id, "No YouTube channel for account, skipping fallback");
                    return Ok(());
                }
                Err(FetchError::InsufficientScope(message)) => return Err(Self::scope_error(message)),
                Err(e) => {
                    warn!(user_id = request.user_id, error = %e, "Failed to resolve YouTube channel");
                    return Ok(());
                }
            },
        };

        let results = match self.search_recent_videos(&channel_id, token).await {
            Ok(results) => results,
            Err(FetchError::InsufficientScope(message)) => return Err(Self::scope_error(message)),
            Err(e) => {
                warn!(channel_id, error = %e, "Channel video search failed");
                return Ok(());
            }
        };

        let pending: Vec<(String, Option<String>)> = results
            .into_iter()
            .filter_map(|r| {
                let title = r.snippet.and_then(|s| s.title);
                r.id.video_id.map(|id| (id, title))
            })
            .filter(|(id, _)| !processed.contains(id))
            .take(MAX_FALLBACK_VIDEOS)
            .collect();

        debug!(channel_id, pending = pending.len(), "Fallback videos to fetch");

        let mut unmatched = 0;
        for (video_id, title) in pending {
            if !processed.mark(&video_id) {
                continue;
            }
            let permalink = watch_url(&video_id);
            let identity = request.content.resolve(
                Platform::Youtube,
                &ExternalItem {
                    id: &video_id,
                    permalink: Some(&permalink),
                    caption: title.as_deref(),
                },
            );
            if !identity.matched {
                unmatched += 1;
            }
            collected.contents_considered += 1;
            self.collect_video(&video_id, token, &identity, request.cutoff, &mut collected.comments)
                .await?;
        }
        debug!(channel_id, unmatched, "Fallback videos fetched");
        Ok(())
    }
}

#[async_trait]
impl CommentCollector for YoutubeCollector {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    async fn collect(&self, request: &CollectionRequest<'_>) -> Result<Collected, CollectError> {
        let account = self
            .accounts
            .get_account(request.user_id, Platform::Youtube)
            .await
            .context("Failed to load YouTube account")?
            .ok_or(CollectError::NotConnected {
                platform: Platform::Youtube,
            })?;
        let token = self.access_token(&account).await?;

        let mut processed = ProcessedIds::new();
        let mut collected = Collected::default();

        for record in request.content.records() {
            let Some(video_id) = video_id_for(record) else {
                debug!(record_id = record.id, "No video id for stored record");
                continue;
            };
            if !processed.mark(&video_id) {
                continue;
            }
            collected.contents_considered += 1;
            let identity = ContentIdentity::from_record(record);
            self.collect_video(&video_id, &token, &identity, request.cutoff, &mut collected.comments)
                .await?;
        }

        let from_stored = collected.comments.len();
        self.collect_fallback(&account, &token, request, &mut processed, &mut collected)
            .await?;

        info!(
            user_id = request.user_id,
            platform = "youtube",
            from_stored,
            from_fallback = collected.comments.len() - from_stored,
            videos = processed.len(),
            "YouTube collection complete"
        );
        Ok(collected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentIndex;
    use std::sync::Mutex;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingAccounts {
        account: Option<PlatformAccount>,
        saved: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AccountStore for RecordingAccounts {
        async fn get_account(
            &self,
            _user_id: i64,
            _platform: Platform,
        ) -> anyhow::Result<Option<PlatformAccount>> {
            Ok(self.account.clone())
        }

        async fn save_refreshed_token(
            &self,
            _user_id: i64,
            _platform: Platform,
            access_token: &str,
            _expires_at: DateTime<Utc>,
        ) -> anyhow::Result<()> {
            self.saved.lock().unwrap().push(access_token.to_string());
            Ok(())
        }
    }

    fn account(expires_at: Option<DateTime<Utc>>) -> PlatformAccount {
        PlatformAccount {
            user_id: 7,
            platform: Platform::Youtube,
            access_token: "yt-token".to_string(),
            refresh_token: Some("refresh-1".to_string()),
            token_expires_at: expires_at,
            external_account_id: Some("UC123".to_string()),
        }
    }

    fn record(id: i64, video_id: &str) -> ContentRecord {
        ContentRecord {
            id,
            owner_id: 7,
            platform: Platform::Youtube,
            title: Some(format!("Video {id}")),
            remote_media_id: None,
            remote_creation_id: None,
            permalink_url: Some(format!("https://youtu.be/{video_id}")),
            media_url: None,
            platform_post_id: None,
            created_at: Utc::now(),
        }
    }

    fn threads(ids: &[&str], at: DateTime<Utc>) -> serde_json::Value {
        let items: Vec<_> = ids
            .iter()
            .map(|id| {
                serde_json::json!({
                    "id": id,
                    "snippet": {"topLevelComment": {"snippet": {
                        "textOriginal": format!("comment {id}"),
                        "authorDisplayName": "viewer",
                        "publishedAt": at.to_rfc3339()
                    }}}
                })
            })
            .collect();
        serde_json::json!({ "items": items })
    }

    async fn mount_threads(server: &MockServer, video_id: &str, body: serde_json::Value, expect: u64) {
        Mock::given(method("GET"))
            .and(path("/commentThreads"))
            .and(query_param("videoId", video_id))
            .and(header("authorization", "Bearer yt-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(expect)
            .mount(server)
            .await;
    }

    #[test]
    fn test_extract_video_id_forms() {
        let id = "dQw4w9WgXcQ";
        for url in [
            format!("https://www.youtube.com/watch?v={id}"),
            format!("https://www.youtube.com/watch?feature=share&v={id}"),
            format!("https://youtube.com/shorts/{id}"),
            format!("https://www.youtube.com/embed/{id}?start=3"),
            format!("https://www.youtube.com/live/{id}"),
            format!("https://youtu.be/{id}"),
        ] {
            assert_eq!(extract_video_id(&url).as_deref(), Some(id), "{url}");
        }
        assert_eq!(extract_video_id("https://example.com/video"), None);
    }

    #[test]
    fn test_video_id_prefers_explicit_ids() {
        let mut r = record(1, "AAAAAAAAAAA");
        r.platform_post_id = Some("BBBBBBBBBBB".to_string());
        assert_eq!(video_id_for(&r).as_deref(), Some("BBBBBBBBBBB"));

        r.platform_post_id = None;
        r.remote_media_id = Some("  ".to_string());
        assert_eq!(video_id_for(&r).as_deref(), Some("AAAAAAAAAAA"));

        r.permalink_url = None;
        assert_eq!(video_id_for(&r), None);
    }

    #[tokio::test]
    async fn test_video_reachable_by_both_paths_is_fetched_once() {
        let server = MockServer::start().await;
        let now = Utc::now();

        mount_threads(&server, "AAAAAAAAAAA", threads(&["a1", "a2"], now), 1).await;
        mount_threads(&server, "BBBBBBBBBBB", threads(&["b1"], now), 1).await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("channelId", "UC123"))
            .and(query_param("maxResults", "25"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {"id": {"videoId": "AAAAAAAAAAA"}, "snippet": {"title": "Stored upload"}},
                    {"id": {"videoId": "BBBBBBBBBBB"}, "snippet": {"title": "Uploaded elsewhere"}},
                    {"id": {"channelId": "not-a-video"}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let accounts = Arc::new(RecordingAccounts {
            account: Some(account(None)),
            ..Default::default()
        });
        let collector = YoutubeCollector::new(Client::new(), &server.uri(), accounts);
        let index = ContentIndex::build(vec![record(5, "AAAAAAAAAAA")]);
        let request = CollectionRequest {
            user_id: 7,
            cutoff: now - Duration::days(7),
            content: &index,
        };

        let collected = collector.collect(&request).await.unwrap();

        let mut ids: Vec<_> = collected.comments.iter().map(|c| c.id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["a1", "a2", "b1"]);
        assert_eq!(collected.contents_considered, 2);

        let a1 = collected.comments.iter().find(|c| c.id == "a1").unwrap();
        assert_eq!(a1.content_id, "5");
        let b1 = collected.comments.iter().find(|c| c.id == "b1").unwrap();
        assert_eq!(b1.content_id, "youtube:BBBBBBBBBBB");
        assert_eq!(b1.content_title, "Uploaded elsewhere");
        assert_eq!(
            b1.content_url.as_deref(),
            Some("https://www.youtube.com/watch?v=BBBBBBBBBBB")
        );
    }

    #[tokio::test]
    async fn test_old_threads_are_filtered() {
        let server = MockServer::start().await;
        let now = Utc::now();

        Mock::given(method("GET"))
            .and(path("/commentThreads"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    threads(&["new"], now)["items"][0].clone(),
                    threads(&["old"], now - Duration::days(30))["items"][0].clone()
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
            .mount(&server)
            .await;

        let accounts = Arc::new(RecordingAccounts {
            account: Some(account(None)),
            ..Default::default()
        });
        let collector = YoutubeCollector::new(Client::new(), &server.uri(), accounts);
        let index = ContentIndex::build(vec![record(1, "AAAAAAAAAAA")]);
        let request = CollectionRequest {
            user_id: 7,
            cutoff: now - Duration::days(7),
            content: &index,
        };

        let collected = collector.collect(&request).await.unwrap();
        assert_eq!(collected.comments.len(), 1);
        assert_eq!(collected.comments[0].id, "new");
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_persisted() {
        let server = MockServer::start().await;
        let now = Utc::now();

        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh-token", "expires_in": 3599
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(header("authorization", "Bearer fresh-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
            .expect(1)
            .mount(&server)
            .await;

        let accounts = Arc::new(RecordingAccounts {
            account: Some(account(Some(now - Duration::minutes(5)))),
            ..Default::default()
        });
        let collector = YoutubeCollector::new(Client::new(), &server.uri(), accounts.clone())
            .with_oauth(OAuthCredentials {
                token_url: format!("{}/token", server.uri()),
                client_id: "client".to_string(),
                client_secret: "secret".to_string(),
            });
        let index = ContentIndex::default();
        let request = CollectionRequest {
            user_id: 7,
            cutoff: now - Duration::days(1),
            content: &index,
        };

        collector.collect(&request).await.unwrap();
        assert_eq!(*accounts.saved.lock().unwrap(), vec!["fresh-token".to_string()]);
    }

    #[tokio::test]
    async fn test_refresh_failure_makes_platform_unavailable() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({"error": "invalid_grant"})))
            .mount(&server)
            .await;

        let accounts = Arc::new(RecordingAccounts {
            account: Some(account(Some(Utc::now() - Duration::hours(1)))),
            ..Default::default()
        });
        let collector = YoutubeCollector::new(Client::new(), &server.uri(), accounts.clone())
            .with_oauth(OAuthCredentials {
                token_url: format!("{}/token", server.uri()),
                client_id: "client".to_string(),
                client_secret: "secret".to_string(),
            });
        let index = ContentIndex::default();
        let request = CollectionRequest {
            user_id: 7,
            cutoff: Utc::now(),
            content: &index,
        };

        let err = collector.collect(&request).await.unwrap_err();
        assert!(matches!(err, CollectError::Unavailable { .. }));
        assert!(accounts.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_scope_is_distinguished() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/commentThreads"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {
                    "code": 403,
                    "message": "Request had insufficient authentication scopes.",
                    "errors": [{"reason": "insufficientPermissions"}]
                }
            })))
            .mount(&server)
            .await;

        let accounts = Arc::new(RecordingAccounts {
            account: Some(account(None)),
            ..Default::default()
        });
        let collector = YoutubeCollector::new(Client::new(), &server.uri(), accounts);
        let index = ContentIndex::build(vec![record(1, "AAAAAAAAAAA")]);
        let request = CollectionRequest {
            user_id: 7,
            cutoff: Utc::now() - Duration::days(1),
            content: &index,
        };

        let err = collector.collect(&request).await.unwrap_err();
        assert!(matches!(
            err,
            CollectError::InsufficientScope { platform: Platform::Youtube, ref message }
                if message.contains("insufficient authentication scopes")
        ));
    }

    #[tokio::test]
    async fn test_per_video_failure_is_skipped() {
        let server = MockServer::start().await;
        let now = Utc::now();

        Mock::given(method("GET"))
            .and(path("/commentThreads"))
            .and(query_param("videoId", "AAAAAAAAAAA"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {"code": 403, "message": "The video has disabled comments.", "errors": [{"reason": "commentsDisabled"}]}
            })))
            .mount(&server)
            .await;
        mount_threads(&server, "BBBBBBBBBBB", threads(&["b1"], now), 1).await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let accounts = Arc::new(RecordingAccounts {
            account: Some(account(None)),
            ..Default::default()
        });
        let collector = YoutubeCollector::new(Client::new(), &server.uri(), accounts);
        let index = ContentIndex::build(vec![record(1, "AAAAAAAAAAA"), record(2, "BBBBBBBBBBB")]);
        let request = CollectionRequest {
            user_id: 7,
            cutoff: now - Duration::days(1),
            content: &index,
        };

        let collected = collector.collect(&request).await.unwrap();
        assert_eq!(collected.comments.len(), 1);
        assert_eq!(collected.comments[0].content_id, "2");
    }

    #[tokio::test]
    async fn test_forbidden_thread_keeps_earlier_comments() {
        let server = MockServer::start().await;
        let now = Utc::now();

        mount_threads(&server, "AAAAAAAAAAA", threads(&["a1"], now), 1).await;
        Mock::given(method("GET"))
            .and(path("/commentThreads"))
            .and(query_param("videoId", "BBBBBBBBBBB"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {
                    "code": 403,
                    "message": "The comment thread could not be retrieved due to insufficient permissions. The request might not be properly authorized.",
                    "errors": [{"reason": "forbidden", "domain": "youtube.commentThread"}]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
            .mount(&server)
            .await;

        let accounts = Arc::new(RecordingAccounts {
            account: Some(account(None)),
            ..Default::default()
        });
        let collector = YoutubeCollector::new(Client::new(), &server.uri(), accounts);
        let index = ContentIndex::build(vec![record(1, "AAAAAAAAAAA"), record(2, "BBBBBBBBBBB")]);
        let request = CollectionRequest {
            user_id: 7,
            cutoff: now - Duration::days(1),
            content: &index,
        };

        let collected = collector.collect(&request).await.unwrap();
        assert_eq!(collected.contents_considered, 2);
        assert_eq!(collected.comments.len(), 1);
        assert_eq!(collected.comments[0].id, "a1");
    }

    #[tokio::test]
    async fn test_fallback_fetches_at_most_ten_videos() {
        let server = MockServer::start().await;

        let results: Vec<_> = (0..15)
            .map(|i| {
                serde_json::json!({
                    "id": {"videoId": format!("video{i:06}")},
                    "snippet": {"title": format!("Upload {i}")}
                })
            })
            .collect();
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("channelId", "UC123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": results})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/commentThreads"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
            .expect(10)
            .mount(&server)
            .await;

        let accounts = Arc::new(RecordingAccounts {
            account: Some(account(None)),
            ..Default::default()
        });
        let collector = YoutubeCollector::new(Client::new(), &server.uri(), accounts);
        let index = ContentIndex::default();
        let request = CollectionRequest {
            user_id: 7,
            cutoff: Utc::now() - Duration::days(1),
            content: &index,
        };

        let collected = collector.collect(&request).await.unwrap();
        assert_eq!(collected.contents_considered, MAX_FALLBACK_VIDEOS);
    }
}
