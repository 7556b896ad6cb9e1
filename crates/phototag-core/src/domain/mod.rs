//! Domain entities and business rules
//!
//! This module contains the core domain types for PhotoTag:
//! - Newtypes for the user identity and photo payloads
//! - Login credentials and the signed-in user's profile
//! - The slot-indexed tag set shared with the server
//! - Pending-operation sync items
//! - Domain-specific error types

pub mod account;
pub mod errors;
pub mod newtypes;
pub mod sync_item;
pub mod tag_set;

// Re-export commonly used types
pub use account::{Credentials, UserProfile};
pub use errors::{DomainError, RemoteError};
pub use newtypes::{PhotoPayload, UserId};
pub use sync_item::{SyncItem, SyncOperation};
pub use tag_set::{TagEntry, TagSet, DELETED_PHOTO};
