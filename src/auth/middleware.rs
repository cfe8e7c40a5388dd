use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::warn;

use crate::db::{self as queries, parse_timestamp, User};

/// Session token from `Authorization: Bearer` or the `session` cookie.
fn session_token(parts: &Parts) -> Option<&str> {
    let bearer = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    bearer.or_else(|| {
        parts
            .headers
            .get(header::COOKIE)
            .and_then(|h| h.to_str().ok())
            .and_then(|cookies| {
                cookies
                    .split(';')
                    .find_map(|cookie| cookie.trim().strip_prefix("session="))
            })
    })
}

/// Current authenticated user (if any).
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    SqlitePool: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let pool = SqlitePool::from_ref(state);

        let Some(token) = session_token(parts) else {
            return Ok(MaybeUser(None));
        };

        let session = match queries::get_session_by_token(&pool, token).await {
            Ok(Some(s)) => s,
            Ok(None) => return Ok(MaybeUser(None)),
            Err(e) => {
                warn!("Session lookup failed: {e:#}");
                return Ok(MaybeUser(None));
            }
        };

        // Unparseable expiry counts as expired.
        let expired = parse_timestamp(&session.expires_at).map_or(true, |t| t <= Utc::now());
        if expired {
            let _ = queries::delete_session(&pool, token).await;
            return Ok(MaybeUser(None));
        }

        let user = match queries::get_user_by_id(&pool, session.user_id).await {
            Ok(Some(u)) => u,
            _ => return Ok(MaybeUser(None)),
        };

        let _ = queries::update_session_last_used(&pool, session.id).await;

        Ok(MaybeUser(Some(user)))
    }
}

/// Current authenticated user (required). Rejects with 401 JSON.
#[derive(Debug, Clone)]
pub struct RequireUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
    SqlitePool: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let MaybeUser(user) = MaybeUser::from_request_parts(parts, state).await?;

        match user {
            Some(u) => Ok(RequireUser(u)),
            None => Err((
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "Authentication required" })),
            )
                .into_response()),
        }
    }
}
