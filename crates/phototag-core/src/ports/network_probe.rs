//! Network probe port
//!
//! Answers the coarse question "is any network interface usable" without
//! talking to the photo server. The daemon polls it and turns changes into
//! edge events for the sync engine.

/// Port trait for network availability checks
#[async_trait::async_trait]
pub trait INetworkProbe: Send + Sync {
    /// Returns true if the device currently has network access
    async fn has_network(&self) -> bool;
}
