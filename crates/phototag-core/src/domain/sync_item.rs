//! Pending-operation queue entries
//!
//! A [`SyncItem`] records a mutation whose optimistic local effect has been
//! applied but which the server has not confirmed. Items are persisted as
//! a JSON array under the `"unsynchedPosts"` key.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Kind of mutation awaiting replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncOperation {
    /// Upload the photo, then insert a fresh tag
    New,
    /// Upload the photo, then update an existing slot
    Update,
    /// Update tag text only, or mark the slot deleted
    UpdateTagsOrDelete,
}

impl SyncOperation {
    /// Returns true if replaying this operation uploads a photo first
    pub fn uploads_photo(&self) -> bool {
        matches!(self, SyncOperation::New | SyncOperation::Update)
    }

    /// Wire name of the operation
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOperation::New => "NEW",
            SyncOperation::Update => "UPDATE",
            SyncOperation::UpdateTagsOrDelete => "UPDATE_TAGS_OR_DELETE",
        }
    }
}

impl Display for SyncOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued, unconfirmed mutation of one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncItem {
    /// Slot index in the tag set
    pub id: usize,
    /// What to resubmit
    pub operation: SyncOperation,
}

impl SyncItem {
    /// Creates a new sync item
    pub fn new(id: usize, operation: SyncOperation) -> Self {
        Self { id, operation }
    }
}
