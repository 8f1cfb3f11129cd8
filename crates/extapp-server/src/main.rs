//! extapp-server binary

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use extapp_auth::HandshakeOrchestrator;
use extapp_server::{ServerConfig, handshake_router, serve, shutdown_signal};
use tokio::net::TcpListener;
use tracing::info;

/// Extension application handshake server
#[derive(Parser, Debug)]
#[command(
    name = "extapp-server",
    version,
    about = "Serves the extension application authentication handshake"
)]
struct Cli {
    /// Configuration file (.toml, .yaml, .yml or .json)
    #[arg(long, short = 'c', env = "EXTAPP_CONFIG")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ServerConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let _guard = config
        .logging
        .init()
        .context("failed to initialize logging")?;

    let orchestrator = HandshakeOrchestrator::from_config(&config.handshake)
        .context("invalid handshake configuration")?;

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "extapp-server listening");

    serve(
        listener,
        handshake_router(Arc::new(orchestrator)),
        shutdown_signal(),
        config.server.shutdown_grace(),
    )
    .await
    .context("server error")?;

    info!("extapp-server stopped");
    Ok(())
}
