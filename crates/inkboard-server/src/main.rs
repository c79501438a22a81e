use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use inkboard_server::{Config, Relay};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkboard_server=info,tower_http=info".into()),
        )
        .init();

    let config = Config::parse();
    let relay = Arc::new(Relay::new());

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    let addr = listener.local_addr()?;
    info!("Inkboard relay listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/", addr);

    inkboard_server::serve(listener, relay)
        .await
        .context("relay server stopped")
}
