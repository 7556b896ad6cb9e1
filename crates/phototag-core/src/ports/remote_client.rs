//! Remote client port (driven/secondary port)
//!
//! This module defines the interface to the photo server. Every mutation
//! is independently fallible and reports a [`RemoteError`] whose variant
//! tells the engine how to react; see [`RemoteOutcome`].
//!
//! ## Design Notes
//!
//! - Mutations return `Result<(), RemoteError>`; success means the server
//!   answered exactly `OK`.
//! - Per-call timeouts are the adapter's responsibility.
//! - `is_server_reachable` never fails; any error counts as unreachable.

use crate::domain::{Credentials, PhotoPayload, RemoteError, TagEntry, TagSet, UserId, UserProfile};

// ============================================================================
// RemoteOutcome
// ============================================================================

/// Three-way classification of a remote mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// The server accepted the mutation
    Success,
    /// The server could not be reached; keep local state and queue
    Connectivity,
    /// The server refused or answered garbage; roll back
    Hard(String),
}

impl RemoteOutcome {
    /// Classifies the result of a remote mutation
    pub fn classify(result: &Result<(), RemoteError>) -> Self {
        match result {
            Ok(()) => RemoteOutcome::Success,
            Err(e) if e.is_connectivity() => RemoteOutcome::Connectivity,
            Err(e) => RemoteOutcome::Hard(e.to_string()),
        }
    }

    /// Chains a follow-up step after a first one
    ///
    /// A hard failure anywhere wins; a connectivity failure in the first
    /// step is carried through unless the second step fails hard.
    pub fn then(self, next: RemoteOutcome) -> Self {
        match (self, next) {
            (RemoteOutcome::Hard(reason), _) => RemoteOutcome::Hard(reason),
            (_, RemoteOutcome::Hard(reason)) => RemoteOutcome::Hard(reason),
            (RemoteOutcome::Connectivity, _) | (_, RemoteOutcome::Connectivity) => {
                RemoteOutcome::Connectivity
            }
            (RemoteOutcome::Success, RemoteOutcome::Success) => RemoteOutcome::Success,
        }
    }
}

// ============================================================================
// IRemoteClient
// ============================================================================

/// Port trait for the photo server
#[async_trait::async_trait]
pub trait IRemoteClient: Send + Sync {
    /// Signs in and returns the user's profile
    ///
    /// An empty answer means the server did not recognise the credentials
    /// and is reported as [`RemoteError::Rejected`].
    async fn login(&self, credentials: &Credentials) -> Result<UserProfile, RemoteError>;

    /// Fetches the user's tag set
    async fn fetch_tags(&self, user: &UserId) -> Result<TagSet, RemoteError>;

    /// Uploads a photo payload under `file_name` for `slot`
    async fn upload_photo(
        &self,
        user: &UserId,
        slot: usize,
        file_name: &str,
        photo: &PhotoPayload,
    ) -> Result<(), RemoteError>;

    /// Inserts a new tag at `slot` (which equals the server's numberOfTags)
    async fn insert_new_tag(
        &self,
        user: &UserId,
        slot: usize,
        entry: &TagEntry,
    ) -> Result<(), RemoteError>;

    /// Overwrites the tag stored at `slot`
    async fn update_tag(
        &self,
        user: &UserId,
        slot: usize,
        entry: &TagEntry,
    ) -> Result<(), RemoteError>;

    /// Downloads the photo stored under `file_name`
    async fn download_photo(&self, file_name: &str) -> Result<PhotoPayload, RemoteError>;

    /// Returns true if the server answers the liveness probe
    async fn is_server_reachable(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(RemoteOutcome::classify(&Ok(())), RemoteOutcome::Success);
        assert_eq!(
            RemoteOutcome::classify(&Err(RemoteError::Unreachable("refused".into()))),
            RemoteOutcome::Connectivity
        );
        assert!(matches!(
            RemoteOutcome::classify(&Err(RemoteError::Rejected("NOPE".into()))),
            RemoteOutcome::Hard(_)
        ));
        assert!(matches!(
            RemoteOutcome::classify(&Err(RemoteError::Parse("eof".into()))),
            RemoteOutcome::Hard(_)
        ));
    }

    #[test]
    fn test_then_chaining() {
        use RemoteOutcome::*;
        assert_eq!(Success.then(Success), Success);
        assert_eq!(Connectivity.then(Success), Connectivity);
        assert_eq!(Success.then(Connectivity), Connectivity);
        assert_eq!(Connectivity.then(Hard("x".into())), Hard("x".into()));
        assert_eq!(Hard("a".into()).then(Connectivity), Hard("a".into()));
    }
}
