//! Domain error types
//!
//! This module defines error types specific to domain operations
//! (validation of identities, payloads and slot indices) and the
//! classification of remote call failures.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// User identity is empty or malformed
    #[error("Invalid user id: {0}")]
    InvalidUserId(String),

    /// Photo payload is not valid base64
    #[error("Invalid photo payload: {0}")]
    InvalidPhoto(String),

    /// Slot index outside the allocated range of the tag set
    #[error("Slot {slot} is out of range (numberOfTags = {allocated})")]
    SlotOutOfRange {
        /// The requested slot
        slot: usize,
        /// The tag set high-water mark
        allocated: usize,
    },

    /// Login credentials are incomplete
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Tag set arrays disagree in length or are shorter than `numberOfTags`
    #[error("Malformed tag set: {0}")]
    MalformedTagSet(String),
}

/// Failure of a call against the photo server
///
/// The variants map one-to-one onto how the sync engine reacts:
/// `Unreachable` keeps optimistic state and queues the mutation,
/// `Rejected` and `Parse` roll back.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The server could not be reached (connection refused, no route)
    #[error("Server unreachable: {0}")]
    Unreachable(String),

    /// The server answered but did not accept the request
    #[error("Server rejected request: {0}")]
    Rejected(String),

    /// The server answered with a body that could not be decoded
    #[error("Malformed server response: {0}")]
    Parse(String),
}

impl RemoteError {
    /// Returns true if the failure means "server down, retry later"
    pub fn is_connectivity(&self) -> bool {
        matches!(self, RemoteError::Unreachable(_))
    }
}
