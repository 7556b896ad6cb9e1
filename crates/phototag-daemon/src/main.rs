//! PhotoTag Daemon - Background synchronization service
//!
//! This binary runs as a user service and handles:
//! - Restoring the tag set, photo cache and pending queue from disk
//! - Watching network availability
//! - Replaying queued posts when the network and server come back
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon wires the SQLite store, the HTTP client and the TCP network
//! probe into a [`SyncEngine`], then runs the network watcher and the
//! engine's connectivity loop side by side. Both are controlled by a
//! `CancellationToken` that is triggered on receipt of SIGTERM or SIGINT.

use std::sync::Arc;

use anyhow::{Context, Result};
use phototag_core::{
    config::Config,
    ports::{ILocalStore, INetworkProbe, INotificationService, IRemoteClient},
};
use phototag_remote::{HttpRemoteClient, TcpNetworkProbe};
use phototag_store::DatabasePool;
use phototag_sync::{
    connectivity::{watch_probe, ConnectivityMonitor},
    engine::{EngineOptions, SyncEngine},
    notifier::TracingNotifier,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

// ============================================================================
// DaemonService
// ============================================================================

/// Main daemon service that owns the engine and its adapters
struct DaemonService {
    /// Application configuration loaded from YAML
    config: Config,
    /// Synchronization engine
    engine: SyncEngine,
    /// Network availability probe feeding the engine's monitor
    probe: Arc<dyn INetworkProbe + Send + Sync>,
    /// Token for signalling graceful shutdown to all async tasks
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Creates a new DaemonService
    ///
    /// Opens the database, builds the adapters and restores the engine.
    async fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let db_path = config.storage.database.clone();
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let db_pool = DatabasePool::new(&db_path)
            .await
            .context("Failed to open database")?;
        let store: Arc<dyn ILocalStore + Send + Sync> =
            Arc::new(db_pool.local_store());
        info!(db_path = %db_path.display(), "Opened local store");

        let remote: Arc<dyn IRemoteClient + Send + Sync> = Arc::new(
            HttpRemoteClient::from_config(&config).context("Failed to build HTTP client")?,
        );
        let probe: Arc<dyn INetworkProbe + Send + Sync> = Arc::new(
            TcpNetworkProbe::from_config(&config).context("Failed to build network probe")?,
        );
        let notifier: Arc<dyn INotificationService + Send + Sync> = Arc::new(TracingNotifier);

        let online = probe.has_network().await;
        let connectivity = Arc::new(ConnectivityMonitor::new(online));
        info!(online, "Initial network state");

        let options = EngineOptions::from_config(&config)?;
        let engine = SyncEngine::open(store, remote, notifier, connectivity, options)
            .await
            .context("Failed to open sync engine")?;

        Ok(Self {
            config,
            engine,
            probe,
            shutdown,
        })
    }

    /// Runs the daemon until shutdown
    ///
    /// 1. Loads the tag set (snapshot or server)
    /// 2. Starts the network watcher
    /// 3. Runs the engine's connectivity loop until the token fires
    async fn run(&self) -> Result<()> {
        match self.engine.get_tags().await {
            Ok(tags) => info!(
                number_of_tags = tags.number_of_tags(),
                live = tags.live_count(),
                "Tags loaded"
            ),
            Err(e) => warn!(error = %e, "Could not load tags; mutations are disabled until they are"),
        }

        let watcher = tokio::spawn(watch_probe(
            Arc::clone(&self.probe),
            Arc::clone(self.engine.connectivity()),
            self.config.network_poll_interval(),
            self.shutdown.child_token(),
        ));

        let status = self.engine.status().await;
        info!(
            pending = status.pending.len(),
            cached_photos = status.cached_photos,
            "Daemon ready"
        );

        self.engine.run(self.shutdown.clone()).await;

        if let Err(e) = watcher.await {
            error!(error = %e, "Network watcher task failed");
        }

        let remaining = self.engine.pending().await.len();
        if remaining > 0 {
            info!(pending = remaining, "Posts remain queued for the next start");
        }
        Ok(())
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

/// Builds the log filter: `RUST_LOG` wins, then the configured level
fn env_filter(config: &Config) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = Config::default_path();
    let config = Config::load_or_default(&config_path);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(&config))
        .with_target(true)
        .init();

    info!(config_path = %config_path.display(), "PhotoTag daemon starting (phototagd)");

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!(field = %e.field, "{}", e.message);
        }
        anyhow::bail!("Invalid configuration ({} errors)", errors.len());
    }

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token.clone()).await?;
    let result = service.run().await;

    match &result {
        Ok(()) => info!("PhotoTag daemon shut down gracefully"),
        Err(e) => error!(error = %e, "PhotoTag daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use phototag_core::config::ConfigBuilder;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_empty());
    }

    #[test]
    fn test_env_filter_uses_configured_level() {
        std::env::remove_var("RUST_LOG");
        let config = ConfigBuilder::new().logging_level("debug").build();
        assert!(env_filter(&config).to_string().contains("debug"));
    }

    #[tokio::test]
    async fn test_service_starts_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigBuilder::new()
            .storage_database(dir.path().join("db").join("phototag.db"))
            .server_base_url("http://127.0.0.1:9")
            .server_request_timeout_secs(1)
            .network_probe_address("127.0.0.1:9")
            .network_probe_timeout_ms(100)
            .account_user_id("u1_")
            .build();

        let token = CancellationToken::new();
        let service = DaemonService::new(config, token.clone()).await.unwrap();
        token.cancel();
        service.run().await.unwrap();

        assert!(dir.path().join("db").join("phototag.db").exists());
        assert!(!service.engine.is_server_check_armed());
    }
}
