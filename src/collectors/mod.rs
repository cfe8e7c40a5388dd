//! Platform comment collectors.
//!
//! Each collector reads one platform for one user and returns unified
//! comments already attached to a content identity. Per-item failures are
//! logged and skipped inside the collector; only platform-level conditions
//! surface as a [`CollectError`].

pub mod api;
pub mod dedup;
pub mod instagram;
pub mod youtube;

pub use dedup::{dedup_comments, ProcessedIds};
pub use instagram::InstagramCollector;
pub use youtube::YoutubeCollector;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::content::ContentIndex;
use crate::model::{Platform, UnifiedComment};

#[derive(Debug, Error)]
pub enum CollectError {
    /// The user has no stored account for this platform.
    #[error("{platform} is not connected")]
    NotConnected { platform: Platform },

    /// The stored token lacks a permission; the user must reconnect.
    #[error("{platform} needs to be reconnected: {message}")]
    InsufficientScope { platform: Platform, message: String },

    /// The platform cannot be used this run (e.g. token refresh failed).
    #[error("{platform} unavailable: {reason}")]
    Unavailable { platform: Platform, reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CollectError {
    /// User-facing prompt for a scope failure.
    #[must_use]
    pub fn reconnect_message(platform: Platform) -> String {
        format!(
            "Reconnect your {} account to grant comment access",
            platform.display_name()
        )
    }
}

/// Inputs shared by every collector for a single request.
#[derive(Debug, Clone, Copy)]
pub struct CollectionRequest<'a> {
    pub user_id: i64,
    /// Comments (and media) older than this are dropped.
    pub cutoff: DateTime<Utc>,
    /// Stored content for this user and platform.
    pub content: &'a ContentIndex,
}

#[derive(Debug, Default)]
pub struct Collected {
    pub comments: Vec<UnifiedComment>,
    /// Media items or videos whose comments were fetched.
    pub contents_considered: usize,
}

#[async_trait]
pub trait CommentCollector: Send + Sync {
    fn platform(&self) -> Platform;

    /// Collect every comment at or after the cutoff.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError`] when the platform as a whole cannot be read.
    async fn collect(&self, request: &CollectionRequest<'_>) -> Result<Collected, CollectError>;
}
