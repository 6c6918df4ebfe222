use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use foundit_api::{app, config::AppConfig, database::open_store, media::open_media, AppState};

/// FoundIt lost-and-found API server
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Bind address, overrides HOST
    #[arg(long)]
    host: Option<String>,

    /// Listen port, overrides PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// Do not run embedded database migrations at startup
    #[arg(long)]
    skip_migrations: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so DATABASE_URL, JWT_SECRET, etc. are picked up
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")))
        .init();

    let args = Args::parse();
    let mut config = AppConfig::from_env();
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate().context("invalid configuration")?;
    tracing::info!("Starting FoundIt API in {:?} mode", config.environment);

    if config.security.verifier_ids.is_empty() {
        tracing::warn!("SECURITY_VERIFIER_IDS is empty; any signed-in user can verify items");
    }

    let store = open_store(&config.database, !args.skip_migrations)
        .await
        .context("failed to open the store")?;
    let media = open_media(&config.media).context("failed to set up the media store")?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, store, media);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("FoundIt API listening on http://{}", bind_addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
