//! Local store port (driven/secondary port)
//!
//! Durable key-value persistence for the tag set snapshot, photo blobs and
//! the pending-operations queue. The contract is deliberately small:
//! values are opaque bytes and `put` is last-writer-wins per key.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` for flexibility across storage backends.
//! - `delete` of a missing key is not an error.

/// Well-known keys
pub mod keys {
    /// JSON tag set snapshot
    pub const TAGS: &str = "tags";
    /// JSON array of pending sync items
    pub const PENDING: &str = "unsynchedPosts";
    /// Identity of the signed-in user
    pub const USER_ID: &str = "userId";
    /// JSON profile of the signed-in user
    pub const PROFILE: &str = "userDetails";
}

/// Port trait for the local key-value store
#[async_trait::async_trait]
pub trait ILocalStore: Send + Sync {
    /// Loads the value stored under `key`
    ///
    /// Returns `Ok(None)` if the key is absent.
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous value
    async fn put(&self, key: &str, value: &[u8]) -> anyhow::Result<()>;

    /// Removes `key`
    async fn delete(&self, key: &str) -> anyhow::Result<()>;

    /// Returns every stored key, sorted
    async fn keys(&self) -> anyhow::Result<Vec<String>>;
}
