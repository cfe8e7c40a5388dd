use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::error;

use super::AppState;
use crate::analysis::AnalysisRequest;
use crate::auth::RequireUser;
use crate::cache::TimeRange;
use crate::model::PlatformFilter;

/// Create the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(health))
        .route("/api/comments/insights", get(comment_insights))
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct InsightsParams {
    range: Option<String>,
    platform: Option<String>,
    refresh: Option<String>,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn parse_flag(value: Option<&str>) -> Result<bool, String> {
    match value.map(|v| v.trim().to_lowercase()).as_deref() {
        None | Some("" | "false" | "0" | "no") => Ok(false),
        Some("true" | "1" | "yes") => Ok(true),
        Some(other) => Err(format!("invalid refresh flag '{other}'")),
    }
}

async fn comment_insights(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Query(params): Query<InsightsParams>,
) -> Response {
    let range = match TimeRange::parse(params.range.as_deref().unwrap_or("7d")) {
        Ok(range) => range,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };
    let platform = match PlatformFilter::parse(params.platform.as_deref().unwrap_or("all")) {
        Ok(platform) => platform,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };
    let refresh = match parse_flag(params.refresh.as_deref()) {
        Ok(refresh) => refresh,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, &message),
    };

    let request = AnalysisRequest {
        user_id: user.id,
        platform,
        range,
        refresh,
    };

    match state.analysis.analyze(&request).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            error!(user_id = user.id, %platform, %range, refresh, "Comment analysis failed: {e:#}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to analyze comments")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(!parse_flag(None).unwrap());
        assert!(!parse_flag(Some("false")).unwrap());
        assert!(parse_flag(Some("true")).unwrap());
        assert!(parse_flag(Some("1")).unwrap());
        assert!(parse_flag(Some("maybe")).is_err());
    }
}
