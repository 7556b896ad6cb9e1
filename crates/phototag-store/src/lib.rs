//! PhotoTag Store - Local key-value persistence
//!
//! Adapters for the `ILocalStore` port from `phototag-core`:
//! - [`SqliteLocalStore`] - durable SQLite-backed store used by the binaries
//! - [`MemoryLocalStore`] - in-process store for embedding and tests
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use phototag_store::DatabasePool;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/phototag/phototag.db")).await?;
//! let store = pool.local_store();
//! // Use store as ILocalStore...
//! # Ok(())
//! # }
//! ```

pub mod memory;
pub mod pool;
pub mod repository;

pub use memory::MemoryLocalStore;
pub use pool::{DatabaseLocation, DatabasePool};
pub use repository::SqliteLocalStore;

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::QueryFailed(e.to_string())
    }
}
