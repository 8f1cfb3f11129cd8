//! # extapp-server - HTTP surface for the extension application handshake
//!
//! Wires [`extapp_auth::HandshakeOrchestrator`] to axum routes, loads
//! configuration from file plus `EXTAPP_*` environment overrides, and sets up
//! `tracing` output.
//!
//! - [`config`] - `ServerConfig` loading (`config` crate)
//! - [`logging`] - subscriber setup with optional file rotation
//! - [`router`] - the three handshake routes and `/health`

pub mod config;
pub mod logging;
pub mod router;

use std::future::{Future, IntoFuture};
use std::io;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

pub use config::{ConfigError, ListenConfig, LogOutput, LogRotation, LoggingConfig, ServerConfig};
pub use logging::LoggingGuard;
pub use router::{HandshakeReply, handshake_router};

/// Serve `router` until `shutdown` resolves
///
/// After `shutdown`, in-flight requests get `grace` to finish before the
/// server stops regardless.
///
/// # Errors
///
/// Returns an error if accepting connections fails.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
    grace: Duration,
) -> io::Result<()> {
    let (draining_tx, mut draining_rx) = watch::channel(false);

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        shutdown.await;
        info!("Shutdown requested, draining in-flight requests");
        let _ = draining_tx.send(true);
    });

    let deadline = async move {
        if draining_rx.wait_for(|draining| *draining).await.is_err() {
            // Sender dropped without draining: the server already stopped
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server.into_future() => result,
        () = deadline => {
            warn!(grace_secs = grace.as_secs(), "Grace period elapsed, stopping with requests in flight");
            Ok(())
        }
    }
}

/// Resolves on Ctrl+C or, on unix, SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Ctrl+C received, initiating shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("SIGTERM received, initiating shutdown");
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
