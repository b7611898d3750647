//! Demo server wiring the Reddit OAuth adapter into an axum app

use reddit_oauth::{RedditOAuth, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Initialize tracing/logging
/// 2. Initialize metrics
/// 3. Load and validate configuration, create the adapter
/// 4. Start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize tracing/logging
    let log_format =
        std::env::var("REDDIT_OAUTH__LOGGING__FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "reddit_oauth=info,tower_http=debug".into());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting reddit-oauth demo...");

    // 2. Initialize metrics
    reddit_oauth::metrics::init_metrics();

    // 3. Load configuration and create the adapter
    let source = config::load_config_source()?;
    let adapter = RedditOAuth::create(source)?;
    tracing::info!(
        client_id = %adapter.config().client_id,
        callback_url = %adapter.config().callback_url,
        "Configuration loaded"
    );

    // 4. Start HTTP server
    let app = reddit_oauth::build_router(adapter);
    let addr = std::env::var("REDDIT_OAUTH_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!(
        "Sign in at http://{}{}",
        addr,
        reddit_oauth::LOGIN_PATH
    );

    axum::serve(listener, app).await?;

    Ok(())
}
