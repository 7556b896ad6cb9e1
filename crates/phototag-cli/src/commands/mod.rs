//! CLI subcommands
//!
//! Each command opens a short-lived [`Session`] over the same database the
//! daemon uses, does its work and shuts the engine down, which waits for
//! in-flight remote calls to settle.

pub mod account;
pub mod config;
pub mod posts;
pub mod status;
pub mod sync;
pub mod tags;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use phototag_core::{
    config::Config,
    ports::{ILocalStore, INetworkProbe, INotificationService, IRemoteClient},
};
use phototag_remote::{HttpRemoteClient, TcpNetworkProbe};
use phototag_store::DatabasePool;
use phototag_sync::{
    connectivity::ConnectivityMonitor,
    engine::{EngineOptions, MutationStatus, SyncEngine},
    notifier::TracingNotifier,
};
use tracing::debug;

/// An engine wired to the configured adapters
pub struct Session {
    pub engine: SyncEngine,
}

impl Session {
    /// Loads the configuration at `config_path` and opens the engine
    pub async fn open(config_path: &Path) -> Result<Self> {
        let config = Config::load_or_default(config_path);
        let errors = config.validate();
        if let Some(first) = errors.first() {
            anyhow::bail!(
                "Invalid configuration at {}: {} (run 'phototag config validate')",
                config_path.display(),
                first
            );
        }
        Self::open_with(&config).await
    }

    /// Opens the engine for an already loaded configuration
    pub async fn open_with(config: &Config) -> Result<Self> {
        let db_path = &config.storage.database;
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create data directory")?;
        }
        let pool = DatabasePool::new(db_path)
            .await
            .context("Failed to open database")?;
        let store: Arc<dyn ILocalStore + Send + Sync> =
            Arc::new(pool.local_store());

        let remote: Arc<dyn IRemoteClient + Send + Sync> =
            Arc::new(HttpRemoteClient::from_config(config)?);
        let probe = TcpNetworkProbe::from_config(config)?;
        let online = probe.has_network().await;
        debug!(online, "Probed network");

        let notifier: Arc<dyn INotificationService + Send + Sync> = Arc::new(TracingNotifier);
        let engine = SyncEngine::open(
            store,
            remote,
            notifier,
            Arc::new(ConnectivityMonitor::new(online)),
            EngineOptions::from_config(config)?,
        )
        .await
        .context("Failed to open sync engine")?;

        Ok(Self { engine })
    }

    /// Waits for in-flight work and stops the engine
    pub async fn close(self) {
        self.engine.shutdown().await;
    }
}

/// One-line description of a mutation outcome
pub fn describe_status(status: &MutationStatus) -> String {
    match status {
        MutationStatus::Synced => "synced with the server".to_string(),
        MutationStatus::Queued(operation) => {
            format!("server unreachable, queued as {}", operation)
        }
        MutationStatus::RolledBack(reason) => format!("rejected by the server: {}", reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phototag_core::config::ConfigBuilder;
    use phototag_core::domain::SyncOperation;

    #[test]
    fn test_describe_status() {
        assert_eq!(
            describe_status(&MutationStatus::Queued(SyncOperation::New)),
            "server unreachable, queued as NEW"
        );
        assert!(describe_status(&MutationStatus::RolledBack("ERROR".into())).contains("ERROR"));
    }

    #[tokio::test]
    async fn test_open_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested").join("phototag.db");
        let config = ConfigBuilder::new()
            .storage_database(db.clone())
            .network_probe_address("127.0.0.1:9")
            .network_probe_timeout_ms(100)
            .build();

        let session = Session::open_with(&config).await.unwrap();
        assert!(session.engine.pending().await.is_empty());
        session.close().await;
        assert!(db.exists());
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "logging:\n  level: loud\n").unwrap();
        let err = Session::open(&path).await.err().unwrap();
        assert!(err.to_string().contains("logging.level"));
    }
}
