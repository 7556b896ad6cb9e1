//! PhotoTag Sync - Offline-aware synchronization engine
//!
//! Provides:
//! - Optimistic local mutations with write-through to the photo server
//! - A persisted queue of mutations the server has not confirmed
//! - Connectivity-driven replay of that queue
//!
//! ## Modules
//!
//! - [`engine`] - The [`SyncEngine`](engine::SyncEngine) owning tags, photos and the queue
//! - [`queue`] - Pending-operations queue and its persistence format
//! - [`lanes`] - Per-slot worker lanes serializing remote work on a slot
//! - [`scheduler`] - Cancellable periodic server check
//! - [`connectivity`] - Edge-triggered network availability
//! - [`notifier`] - Notification adapter that writes to the log

pub mod connectivity;
pub mod engine;
pub mod lanes;
pub mod notifier;
pub mod queue;
pub mod scheduler;

use thiserror::Error;

use phototag_core::domain::{DomainError, RemoteError};

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// The engine lacks required configuration, such as the user identity
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A mutation was attempted before the tag set was loaded
    #[error("Tags have not been loaded")]
    TagsNotLoaded,

    /// The photo server could not be reached
    #[error("Server unreachable: {0}")]
    Connectivity(String),

    /// The photo server refused the request
    #[error("Server rejected request: {0}")]
    RemoteRejection(String),

    /// The photo server answered with something that could not be decoded
    #[error("Malformed server response: {0}")]
    Parse(String),

    /// Reading or writing the local store failed
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),

    /// A domain-level error propagated from phototag-core
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// The engine is shutting down and no longer accepts work
    #[error("Sync engine is shutting down")]
    ShuttingDown,
}

impl From<RemoteError> for SyncError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Unreachable(msg) => SyncError::Connectivity(msg),
            RemoteError::Rejected(msg) => SyncError::RemoteRejection(msg),
            RemoteError::Parse(msg) => SyncError::Parse(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_mapping() {
        assert!(matches!(
            SyncError::from(RemoteError::Unreachable("x".into())),
            SyncError::Connectivity(_)
        ));
        assert!(matches!(
            SyncError::from(RemoteError::Rejected("x".into())),
            SyncError::RemoteRejection(_)
        ));
        assert!(matches!(
            SyncError::from(RemoteError::Parse("x".into())),
            SyncError::Parse(_)
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            SyncError::Configuration("no user id".into()).to_string(),
            "Configuration error: no user id"
        );
        assert_eq!(SyncError::TagsNotLoaded.to_string(), "Tags have not been loaded");
    }
}
