use anyhow::Result;
use chrono::{Duration, Utc};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use sqlx::SqlitePool;

use crate::db;

/// Generate a cryptographically secure random session token.
pub fn generate_session_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

/// Session lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionDuration {
    /// 1 hour
    Short,
    /// 30 days
    Long,
}

impl SessionDuration {
    #[must_use]
    pub const fn as_seconds(&self) -> i64 {
        match self {
            Self::Short => 3600,
            Self::Long => 2_592_000,
        }
    }
}

/// Create a session for `user_id` and return its token.
///
/// # Errors
///
/// Returns an error if the session cannot be stored.
pub async fn issue_session(
    pool: &SqlitePool,
    user_id: i64,
    duration: SessionDuration,
) -> Result<String> {
    let token = generate_session_token();
    let expires_at = Utc::now() + Duration::seconds(duration.as_seconds());
    db::create_session(pool, user_id, &token, expires_at).await?;
    Ok(token)
}
