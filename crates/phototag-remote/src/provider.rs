//! HttpRemoteClient - IRemoteClient implementation for the photo server
//!
//! Wraps the [`PhotoServerClient`] and adds the logging the engine relies
//! on when diagnosing offline behaviour: every mutation logs its outcome
//! class at debug level, and failures at warn.

use tracing::{debug, warn};

use phototag_core::config::Config;
use phototag_core::domain::{
    Credentials, PhotoPayload, RemoteError, TagEntry, TagSet, UserId, UserProfile,
};
use phototag_core::ports::{IRemoteClient, RemoteOutcome};

use crate::client::PhotoServerClient;

/// `IRemoteClient` adapter over HTTP
#[derive(Debug, Clone)]
pub struct HttpRemoteClient {
    client: PhotoServerClient,
}

impl HttpRemoteClient {
    /// Wraps an existing client
    pub fn new(client: PhotoServerClient) -> Self {
        Self { client }
    }

    /// Builds a client from the `server` section of the configuration
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = PhotoServerClient::new(&config.server.base_url, config.request_timeout())?;
        Ok(Self::new(client))
    }

    /// Returns the underlying HTTP client
    pub fn client(&self) -> &PhotoServerClient {
        &self.client
    }
}

/// Logs the outcome of a mutation and passes the result through
fn log_outcome(
    operation: &'static str,
    slot: usize,
    result: Result<(), RemoteError>,
) -> Result<(), RemoteError> {
    match RemoteOutcome::classify(&result) {
        RemoteOutcome::Success => debug!(operation, slot, "Remote mutation succeeded"),
        RemoteOutcome::Connectivity => {
            warn!(operation, slot, "Server unreachable, mutation not delivered")
        }
        RemoteOutcome::Hard(reason) => {
            warn!(operation, slot, reason = %reason, "Server refused mutation")
        }
    }
    result
}

#[async_trait::async_trait]
impl IRemoteClient for HttpRemoteClient {
    async fn login(&self, credentials: &Credentials) -> Result<UserProfile, RemoteError> {
        let result = self.client.login(credentials).await;
        match &result {
            Ok(profile) => debug!(user = %profile.id, "Signed in"),
            Err(e) => warn!(email = credentials.email(), error = %e, "Sign-in failed"),
        }
        result
    }

    async fn fetch_tags(&self, user: &UserId) -> Result<TagSet, RemoteError> {
        let result = self.client.get_my_tags(user).await;
        if let Err(e) = &result {
            warn!(user = %user, error = %e, "Fetching tags failed");
        }
        result
    }

    async fn upload_photo(
        &self,
        user: &UserId,
        slot: usize,
        file_name: &str,
        photo: &PhotoPayload,
    ) -> Result<(), RemoteError> {
        debug!(slot, file_name, "Uploading photo");
        let result = self.client.upload_photo(user, slot, file_name, photo).await;
        log_outcome("upload_photo", slot, result)
    }

    async fn insert_new_tag(
        &self,
        user: &UserId,
        slot: usize,
        entry: &TagEntry,
    ) -> Result<(), RemoteError> {
        let result = self.client.insert_new_tag(user, slot, entry).await;
        log_outcome("insert_new_tag", slot, result)
    }

    async fn update_tag(
        &self,
        user: &UserId,
        slot: usize,
        entry: &TagEntry,
    ) -> Result<(), RemoteError> {
        let result = self.client.update_tag(user, slot, entry).await;
        log_outcome("update_tag", slot, result)
    }

    async fn download_photo(&self, file_name: &str) -> Result<PhotoPayload, RemoteError> {
        let result = self.client.download_photo(file_name).await;
        if let Err(e) = &result {
            warn!(file_name, error = %e, "Downloading photo failed");
        }
        result
    }

    async fn is_server_reachable(&self) -> bool {
        let reachable = self.client.ping().await;
        debug!(reachable, "Server liveness probe");
        reachable
    }
}
