use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::models::{
    format_timestamp, AnalysisCacheRow, ContentRecordRow, NewContentRecord, PlatformAccountRow,
    Session, User,
};
use crate::content::{ContentQuery, PlatformAccount};
use crate::model::Platform;

// ========== Users ==========

/// Create a user, returning its ID.
pub async fn create_user(pool: &SqlitePool, username: &str) -> Result<i64> {
    let result = sqlx::query("INSERT INTO users (username) VALUES (?)")
        .bind(username)
        .execute(pool)
        .await
        .context("Failed to create user")?;

    Ok(result.last_insert_rowid())
}

/// Get a user by ID.
pub async fn get_user_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch user by id")
}

/// Get a user by username.
pub async fn get_user_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch user by username")
}

// ========== Sessions ==========

/// Create a new session.
pub async fn create_session(
    pool: &SqlitePool,
    user_id: i64,
    token: &str,
    expires_at: DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query("INSERT INTO sessions (user_id, token, expires_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(token)
        .bind(format_timestamp(expires_at))
        .execute(pool)
        .await
        .context("Failed to create session")?;

    Ok(result.last_insert_rowid())
}

/// Get a session by token.
pub async fn get_session_by_token(pool: &SqlitePool, token: &str) -> Result<Option<Session>> {
    sqlx::query_as("SELECT * FROM sessions WHERE token = ?")
        .bind(token)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch session by token")
}

/// Update session last_used_at.
pub async fn update_session_last_used(pool: &SqlitePool, session_id: i64) -> Result<()> {
    sqlx::query("UPDATE sessions SET last_used_at = ? WHERE id = ?")
        .bind(format_timestamp(Utc::now()))
        .bind(session_id)
        .execute(pool)
        .await
        .context("Failed to update session last_used")?;

    Ok(())
}

/// Delete a session.
pub async fn delete_session(pool: &SqlitePool, token: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await
        .context("Failed to delete session")?;

    Ok(())
}

/// Delete every session past its expiry, returning how many were removed.
pub async fn delete_expired_sessions(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
        .bind(format_timestamp(Utc::now()))
        .execute(pool)
        .await
        .context("Failed to delete expired sessions")?;

    Ok(result.rows_affected())
}

// ========== Content Records ==========

/// Insert a content record, returning its ID.
pub async fn insert_content_record(pool: &SqlitePool, record: &NewContentRecord) -> Result<i64> {
    let result = sqlx::query(
        r"
        INSERT INTO content_records (
            owner_id, platform, status, title, remote_media_id, remote_creation_id,
            permalink_url, media_url, platform_post_id, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(record.owner_id)
    .bind(record.platform.as_str())
    .bind(record.status.as_str())
    .bind(&record.title)
    .bind(&record.remote_media_id)
    .bind(&record.remote_creation_id)
    .bind(&record.permalink_url)
    .bind(&record.media_url)
    .bind(&record.platform_post_id)
    .bind(format_timestamp(record.created_at))
    .execute(pool)
    .await
    .context("Failed to insert content record")?;

    Ok(result.last_insert_rowid())
}

/// List content records for an owner/platform/status within a creation
/// window, newest first.
pub async fn list_content_records(
    pool: &SqlitePool,
    query: &ContentQuery,
) -> Result<Vec<ContentRecordRow>> {
    sqlx::query_as(
        r"
        SELECT * FROM content_records
        WHERE owner_id = ?
          AND platform = ?
          AND status = ?
          AND created_at >= ?
          AND created_at <= ?
        ORDER BY created_at DESC, id DESC
        LIMIT ?
        ",
    )
    .bind(query.owner_id)
    .bind(query.platform.as_str())
    .bind(query.status.as_str())
    .bind(format_timestamp(query.created_after))
    .bind(format_timestamp(query.created_before))
    .bind(query.limit)
    .fetch_all(pool)
    .await
    .context("Failed to list content records")
}

// ========== Platform Accounts ==========

/// Insert or replace the OAuth state for a user's platform connection.
pub async fn upsert_platform_account(pool: &SqlitePool, account: &PlatformAccount) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO platform_accounts (
            user_id, platform, access_token, refresh_token, token_expires_at,
            external_account_id, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id, platform) DO UPDATE SET
            access_token = excluded.access_token,
            refresh_token = excluded.refresh_token,
            token_expires_at = excluded.token_expires_at,
            external_account_id = excluded.external_account_id,
            updated_at = excluded.updated_at
        ",
    )
    .bind(account.user_id)
    .bind(account.platform.as_str())
    .bind(&account.access_token)
    .bind(&account.refresh_token)
    .bind(account.token_expires_at.map(format_timestamp))
    .bind(&account.external_account_id)
    .bind(format_timestamp(Utc::now()))
    .execute(pool)
    .await
    .context("Failed to upsert platform account")?;

    Ok(())
}

/// Get the OAuth state for a user's platform connection.
pub async fn get_platform_account(
    pool: &SqlitePool,
    user_id: i64,
    platform: Platform,
) -> Result<Option<PlatformAccountRow>> {
    sqlx::query_as("SELECT * FROM platform_accounts WHERE user_id = ? AND platform = ?")
        .bind(user_id)
        .bind(platform.as_str())
        .fetch_optional(pool)
        .await
        .context("Failed to fetch platform account")
}

/// Store a refreshed access token and its expiry.
pub async fn update_platform_token(
    pool: &SqlitePool,
    user_id: i64,
    platform: Platform,
    access_token: &str,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r"
        UPDATE platform_accounts
        SET access_token = ?, token_expires_at = ?, updated_at = ?
        WHERE user_id = ? AND platform = ?
        ",
    )
    .bind(access_token)
    .bind(format_timestamp(expires_at))
    .bind(format_timestamp(Utc::now()))
    .bind(user_id)
    .bind(platform.as_str())
    .execute(pool)
    .await
    .context("Failed to update platform token")?;

    Ok(())
}

// ========== Comment Analysis Cache ==========

/// Get the cached analysis for a key.
pub async fn get_analysis_cache(
    pool: &SqlitePool,
    user_id: i64,
    platform_filter: &str,
    time_range: &str,
) -> Result<Option<AnalysisCacheRow>> {
    sqlx::query_as(
        r"
        SELECT * FROM comment_analysis_cache
        WHERE user_id = ? AND platform_filter = ? AND time_range = ?
        ",
    )
    .bind(user_id)
    .bind(platform_filter)
    .bind(time_range)
    .fetch_optional(pool)
    .await
    .context("Failed to fetch analysis cache entry")
}

/// Insert or replace the cached analysis for a key.
pub async fn upsert_analysis_cache(pool: &SqlitePool, row: &AnalysisCacheRow) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO comment_analysis_cache (
            user_id, platform_filter, time_range, comments_json, summary_json,
            refreshed_at, expires_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id, platform_filter, time_range) DO UPDATE SET
            comments_json = excluded.comments_json,
            summary_json = excluded.summary_json,
            refreshed_at = excluded.refreshed_at,
            expires_at = excluded.expires_at
        ",
    )
    .bind(row.user_id)
    .bind(&row.platform_filter)
    .bind(&row.time_range)
    .bind(&row.comments_json)
    .bind(&row.summary_json)
    .bind(&row.refreshed_at)
    .bind(&row.expires_at)
    .execute(pool)
    .await
    .context("Failed to upsert analysis cache entry")?;

    Ok(())
}
