mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::FromRef;
use axum::Router;
use reqwest::Client;
use sqlx::SqlitePool;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::analysis::AnalysisService;
use crate::cache::SqliteAnalysisCache;
use crate::classify::{ClassificationPipeline, InsightsClient};
use crate::collectors::{InstagramCollector, YoutubeCollector};
use crate::config::Config;
use crate::db::Database;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub analysis: Arc<AnalysisService>,
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.db.pool().clone()
    }
}

/// Wire the production analysis service: SQLite cache and stores, both
/// platform collectors and the insights service.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn build_analysis_service(config: &Config, db: &Database) -> Result<AnalysisService> {
    let client = Client::builder()
        .timeout(config.http_timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let accounts = Arc::new(db.clone());

    let mut youtube = YoutubeCollector::new(client.clone(), &config.youtube_api_base, accounts.clone());
    match config.youtube_oauth() {
        Some(oauth) => youtube = youtube.with_oauth(oauth),
        None => info!("YouTube OAuth client not configured, expired tokens cannot be refreshed"),
    }
    let instagram = InstagramCollector::new(client.clone(), &config.instagram_api_base, accounts);

    let insights = Arc::new(InsightsClient::new(
        client,
        &config.insights_api_url,
        config.insights_api_key.clone(),
    ));
    let pipeline = ClassificationPipeline::new(insights.clone(), insights)
        .with_chunk_size(config.classify_chunk_size);

    Ok(AnalysisService::new(
        Arc::new(SqliteAnalysisCache::new(db.clone())),
        Arc::new(db.clone()),
        pipeline,
    )
    .with_collector(Arc::new(instagram))
    .with_collector(Arc::new(youtube))
    .with_settings(config.analysis_settings()))
}

/// Start the web server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn serve(config: Config, db: Database) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.web_host, config.web_port)
        .parse()
        .context("Invalid web server address")?;

    let analysis = build_analysis_service(&config, &db)?;
    let state = AppState {
        db,
        config: Arc::new(config),
        analysis: Arc::new(analysis),
    };

    let app = create_app(state);

    info!(addr = %addr, "Starting HTTP web server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind web server")?;

    axum::serve(listener, app.into_make_service())
        .await
        .context("Web server error")?;

    Ok(())
}

/// Create the main application router.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::router())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
