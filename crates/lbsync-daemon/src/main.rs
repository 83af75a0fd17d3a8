//! lbsync daemon
//!
//! Keeps the load balancer's frontends in sync with the service instances reported by the
//! discovery backend.

use anyhow::Context;
use clap::Parser;
use lbsync_api::{create_router, Credentials};
use lbsync_core::DaemonConfig;
use lbsync_discovery::HttpDiscoveryClient;
use lbsync_reconciler::Reconciler;
use lbsync_store::{DeclarationStore, SnapshotWriter};
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// lbsync daemon - load balancer routing reconciler
#[derive(Parser, Debug)]
#[command(name = "lbsyncd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "LBSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Log level, overrides the configuration file
    #[arg(long, env = "LBSYNC_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DaemonConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => DaemonConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok());
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    // RUST_LOG takes precedence over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("Invalid log level")?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")?;

    info!("Starting lbsync daemon v{}", env!("CARGO_PKG_VERSION"));

    config.validate()?;

    let store = Arc::new(DeclarationStore::new(
        config.storage.declarations_path.clone(),
    ));
    store.init().await?;
    let declarations = store.load().await?;

    let client = HttpDiscoveryClient::new(&config.discovery)?;
    info!(url = %client.url(), "Using discovery backend");

    let mut reconciler = Reconciler::new(client);
    let writer = SnapshotWriter::from_config(&config.output);
    info!(path = %writer.path().display(), "Writing committed configurations");
    reconciler
        .notifier_mut()
        .subscribe("snapshot", move |entries| writer.write(entries));

    // without a first configuration there is nothing to serve
    let initial = reconciler.start(declarations).await.map_err(|e| {
        error!(error = %e, "Failed to configure the load balancer");
        e
    })?;
    info!(
        frontends = initial.entries.len(),
        resolved = initial.resolved_count(),
        "Initial configuration committed"
    );

    let handle = reconciler.spawn(config.reconciler.poll_interval());

    let credentials = Credentials::from_config(&config.api);
    if !credentials.is_configured() {
        warn!("No admin password configured, the admin API rejects every request");
    }
    let router = create_router(handle.clone(), store, credentials);

    let addr: SocketAddr = format!("{}:{}", config.api.address, config.api.port)
        .parse()
        .context("Invalid API address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Admin API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down");
    handle.stop();
    handle.stopped().await;

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
///
/// The SIGTERM handler is installed when this is called, not on first poll.
fn shutdown_signal() -> impl Future<Output = ()> {
    #[cfg(unix)]
    let sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => Some(sigterm),
        Err(e) => {
            warn!(error = %e, "Failed to listen for SIGTERM");
            None
        }
    };

    async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async move {
            match sigterm {
                Some(mut sigterm) => {
                    sigterm.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
            _ = terminate => info!("Received SIGTERM, shutting down"),
        }
    }
}
