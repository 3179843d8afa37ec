mod auth;
mod handlers;
mod metrics;
mod problems;
mod routes;
mod ws;

use anyhow::Context;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use verdict_common::config::Config;
use verdict_common::store::SubmissionStore;

pub struct AppState {
    pub store: SubmissionStore,
    pub redis: ConnectionManager,
    pub http: reqwest::Client,
    pub sessions: ws::SessionRegistry,
    pub config: Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Verdict API booting...");

    let config = Config::from_env()?;

    let store = SubmissionStore::connect(&config.mongo_uri, &config.mongo_db)
        .await
        .context("Failed to connect to MongoDB")?;
    info!("Connected to MongoDB: {}", config.mongo_uri);

    let redis_url = config.redis_url();
    let client = redis::Client::open(redis_url.as_str())
        .context("Failed to create Redis client")?;
    let redis_conn = ConnectionManager::new(client)
        .await
        .context("Failed to connect to Redis")?;
    info!("Connected to Redis: {}", redis_url);

    let port = config.port;
    let state = Arc::new(AppState {
        store,
        redis: redis_conn,
        http: reqwest::Client::new(),
        sessions: ws::SessionRegistry::new(),
        config,
    });

    let app = routes::routes().with_state(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("HTTP server listening on {}", addr);
    info!("Ready to accept submissions");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
