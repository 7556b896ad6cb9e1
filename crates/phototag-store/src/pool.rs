//! SQLite connection pool for the key-value store
//!
//! A [`DatabasePool`] is opened once per process and handed to
//! [`SqliteLocalStore`] instances. Opening a pool also brings the `kv`
//! schema up to date; the schema version lives in `PRAGMA user_version`
//! so a database written by a newer build is refused instead of misread.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::{debug, info};

use crate::{SqliteLocalStore, StoreError};

/// Version stamped into `PRAGMA user_version` after the schema is created
pub const SCHEMA_VERSION: i64 = 1;

const INITIAL_SCHEMA: &str = include_str!("migrations/20261017_initial.sql");

/// Connections for a file database
const FILE_CONNECTIONS: u32 = 5;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    /// Private to the pool; gone when the pool closes
    Memory,
}

impl Display for DatabaseLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseLocation::File(path) => write!(f, "{}", path.display()),
            DatabaseLocation::Memory => write!(f, ":memory:"),
        }
    }
}

/// Open SQLite database holding the `kv` table
pub struct DatabasePool {
    pool: SqlitePool,
    location: DatabaseLocation,
}

impl DatabasePool {
    /// Opens (creating if needed) the database file at `db_path`
    pub async fn new(db_path: &Path) -> Result<Self, StoreError> {
        Self::open(DatabaseLocation::File(db_path.to_path_buf())).await
    }

    /// Opens a fresh in-memory database
    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::open(DatabaseLocation::Memory).await
    }

    pub async fn open(location: DatabaseLocation) -> Result<Self, StoreError> {
        let pool = match &location {
            DatabaseLocation::File(path) => connect_file(path).await?,
            // One connection: every in-memory connection is its own database
            DatabaseLocation::Memory => SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await
                .map_err(|e| StoreError::ConnectionFailed(format!("in-memory database: {}", e)))?,
        };

        ensure_schema(&pool).await?;
        info!(location = %location, "Local store database ready");
        Ok(Self { pool, location })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn location(&self) -> &DatabaseLocation {
        &self.location
    }

    /// Returns a store backed by this pool
    pub fn local_store(&self) -> SqliteLocalStore {
        SqliteLocalStore::new(self.pool.clone())
    }

    /// Closes every connection, flushing the WAL for file databases
    pub async fn close(&self) {
        self.pool.close().await;
        debug!(location = %self.location, "Local store database closed");
    }
}

async fn connect_file(path: &Path) -> Result<SqlitePool, StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            StoreError::ConnectionFailed(format!("cannot create {}: {}", parent.display(), e))
        })?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(BUSY_TIMEOUT);

    SqlitePoolOptions::new()
        .max_connections(FILE_CONNECTIONS)
        .connect_with(options)
        .await
        .map_err(|e| StoreError::ConnectionFailed(format!("{}: {}", path.display(), e)))
}

/// Creates the `kv` table on a fresh database and checks the version of
/// an existing one
async fn ensure_schema(pool: &SqlitePool) -> Result<(), StoreError> {
    let version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("reading schema version: {}", e)))?;

    match version {
        SCHEMA_VERSION => {
            debug!(version, "Schema up to date");
            return Ok(());
        }
        v if v > SCHEMA_VERSION => {
            return Err(StoreError::MigrationFailed(format!(
                "database schema version {} is newer than supported version {}",
                v, SCHEMA_VERSION
            )));
        }
        _ => {}
    }

    let migrate = |e: sqlx::Error| StoreError::MigrationFailed(e.to_string());
    let mut tx = pool.begin().await.map_err(migrate)?;
    sqlx::raw_sql(INITIAL_SCHEMA)
        .execute(&mut *tx)
        .await
        .map_err(migrate)?;
    let stamp = format!("PRAGMA user_version = {}", SCHEMA_VERSION);
    sqlx::raw_sql(&stamp).execute(&mut *tx).await.map_err(migrate)?;
    tx.commit().await.map_err(migrate)?;

    info!(from = version, to = SCHEMA_VERSION, "Local store schema created");
    Ok(())
}
