//! Config Watcher
//!
//! Sidecar that polls a single Secret or ConfigMap and, whenever its
//! resourceVersion changes, signals the main container's process so it can
//! reload its configuration without a restart.
//!
//! The pod must run with `shareProcessNamespace: true` so the target PID is
//! visible from this container.

mod backoff;
mod config;
mod controller;
mod error;
mod watcher;

use crate::config::Config;
use crate::controller::Controller;
use crate::error::ControllerError;
use crate::watcher::Watcher;
use resource_client::KubeResourceAccessor;
use signaler::Signaler;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // kube's rustls client needs a process-wide provider; an Err means one is already installed
    let _ = rustls::crypto::ring::default_provider().install_default();

    info!("Starting Config Watcher");

    // Load configuration from environment variables
    let config = Config::from_env()?;
    config.log();

    // In-cluster service account first, then the local kubeconfig
    let client = kube::Client::try_default().await?;
    let watcher = Watcher::new(KubeResourceAccessor::new(client), config.resource.clone());

    let mut signaler = Signaler::new(config.locator.clone(), config.signal_kind);
    if let Some(container) = &config.container_name {
        signaler = signaler.with_container_name(container);
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown_signal(shutdown.clone()));

    let controller = Controller::new(watcher, signaler, config.loop_settings(), shutdown);
    controller.run().await;

    Ok(())
}

/// Cancels `token` on SIGINT or SIGTERM.
async fn cancel_on_shutdown_signal(token: CancellationToken) {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            }
        }
        Err(e) => {
            warn!("Cannot listen for SIGTERM, only SIGINT will stop the watcher: {}", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for SIGINT either: {}", e);
                return;
            }
            info!("Received SIGINT");
        }
    }

    info!("Shutting down");
    token.cancel();
}
