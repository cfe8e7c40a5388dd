use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use comment_insights::auth::{self, SessionDuration};
use comment_insights::config::Config;
use comment_insights::db::{self, Database};
use comment_insights::web;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    if let Some(parent) = config.database_path.parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }

    let db = Database::new(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None | Some("serve") => serve(config, db).await,
        Some("issue-session") => {
            let Some(username) = args.get(1) else {
                bail!("usage: comment-insights issue-session <username> [--long]");
            };
            let duration = if args.iter().any(|a| a == "--long") {
                SessionDuration::Long
            } else {
                SessionDuration::Short
            };
            issue_session(&db, username, duration).await
        }
        Some(other) => bail!("unknown command '{other}' (expected 'serve' or 'issue-session')"),
    }
}

async fn serve(config: Config, db: Database) -> Result<()> {
    info!(
        database = %config.database_path.display(),
        insights_api = %config.insights_api_url,
        "Starting comment-insights"
    );

    let shutdown = CancellationToken::new();
    let cleanup_handle = tokio::spawn(auth::cleanup::run_cleanup_worker(
        db.pool().clone(),
        config.session_cleanup_interval,
        shutdown.clone(),
    ));

    let web_handle = tokio::spawn(async move {
        if let Err(e) = web::serve(config, db).await {
            error!("Web server error: {e:#}");
        }
    });

    shutdown_signal().await;

    info!("Shutting down...");

    shutdown.cancel();
    web_handle.abort();
    let _ = cleanup_handle.await;

    info!("Shutdown complete");

    Ok(())
}

/// Create the user if needed and print a fresh session token.
async fn issue_session(db: &Database, username: &str, duration: SessionDuration) -> Result<()> {
    let user_id = match db::get_user_by_username(db.pool(), username).await? {
        Some(user) => user.id,
        None => db::create_user(db.pool(), username).await?,
    };
    let token = auth::issue_session(db.pool(), user_id, duration).await?;
    info!(user_id, username, "Issued session");
    println!("{token}");
    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,comment_insights=debug"));

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
