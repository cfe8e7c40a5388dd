//! HTTP plumbing shared by the platform collectors.

use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

/// Longest error body kept for logs.
const MAX_ERROR_BODY: usize = 500;

/// Error reasons that mark an authorization failure as a missing-scope
/// problem. Compared case-insensitively.
const SCOPE_REASONS: &[&str] = &[
    "insufficientPermissions",
    "ACCESS_TOKEN_SCOPE_INSUFFICIENT",
    "insufficient_scope",
];

#[derive(Debug, Error)]
pub enum FetchError {
    /// The token is valid but lacks a permission the call needs.
    #[error("insufficient scope: {0}")]
    InsufficientScope(String),
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl FetchError {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request(e) if e.is_timeout())
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    /// Graph API numeric code; YouTube uses the HTTP status here.
    #[serde(default)]
    code: Option<i64>,
    /// YouTube per-error details.
    #[serde(default)]
    errors: Vec<ErrorReason>,
    /// Google RPC-style details (`ErrorInfo.reason`).
    #[serde(default)]
    details: Vec<ErrorReason>,
}

#[derive(Debug, Deserialize)]
struct ErrorReason {
    #[serde(default)]
    reason: Option<String>,
}

impl ErrorBody {
    fn has_scope_reason(&self) -> bool {
        self.errors
            .iter()
            .chain(&self.details)
            .filter_map(|e| e.reason.as_deref())
            .any(is_scope_reason)
    }
}

fn is_scope_reason(reason: &str) -> bool {
    SCOPE_REASONS.iter().any(|r| r.eq_ignore_ascii_case(reason))
}

/// Send a request and decode a JSON body, classifying failures.
///
/// # Errors
///
/// Returns [`FetchError::InsufficientScope`] for permission failures,
/// [`FetchError::Status`] for other non-success responses and
/// [`FetchError::Request`] for transport, timeout and decode failures.
pub async fn fetch_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, FetchError> {
    let response = request.send().await?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_failure(status, &body));
    }

    Ok(response.json::<T>().await?)
}

/// Decide whether a failed response is a scope problem or a plain failure.
///
/// Only Graph permission codes (10, 200-299) and the scope reasons in
/// [`SCOPE_REASONS`] count. A plain `forbidden` on one item stays a plain
/// failure even when its message mentions permissions.
#[must_use]
pub fn classify_failure(status: StatusCode, body: &str) -> FetchError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();

    if let Some(ErrorEnvelope { error }) = &envelope {
        let graph_permission = error
            .code
            .is_some_and(|code| code == 10 || (200..300).contains(&code));
        let scope_reason = matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
            && error.has_scope_reason();
        if graph_permission || scope_reason {
            let message = if error.message.is_empty() {
                truncate(body)
            } else {
                error.message.clone()
            };
            return FetchError::InsufficientScope(message);
        }
    }

    // OAuth endpoints answer `{"error": "insufficient_scope"}` with no envelope.
    if envelope.is_none()
        && matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        && serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(is_scope_reason))
            .unwrap_or(false)
    {
        return FetchError::InsufficientScope(truncate(body));
    }

    FetchError::Status {
        status,
        body: truncate(body),
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY).collect()
}

/// Parse the timestamp formats the platforms return: RFC 3339 (YouTube) and
/// `2024-05-01T12:00:00+0000` (Graph API).
#[must_use]
pub fn parse_platform_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z"))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
