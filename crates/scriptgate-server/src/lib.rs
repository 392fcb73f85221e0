pub mod api;
pub mod cli;
pub mod config;
pub mod logging;
pub mod middleware;
pub mod serve;
pub mod tls;

use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::api::Gateway;
use crate::config::ServerConfig;

/// Builds the gateway from `config` and serves until ctrl-c or SIGTERM.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    if config.auth_password.is_none() {
        warn!("No auth password configured, every request will be accepted");
    }

    let acceptor = tls::acceptor_for(&config)?;
    let gateway = Arc::new(Gateway::from_config(&config)?);
    let app = api::router(gateway.clone());

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;
    let local_addr = listener.local_addr()?;
    let scheme = if acceptor.is_some() { "https" } else { "http" };

    info!(
        scripts_folder = %config.scripts_folder.display(),
        lockout = %gateway.auth.guard().policy(),
        shell = gateway.streamer.shell(),
        max_concurrent = ?gateway.limiter.limit(),
        "Scriptgate listening on {}://{}",
        scheme,
        local_addr
    );

    serve::serve(listener, app, acceptor, shutdown_signal()).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
