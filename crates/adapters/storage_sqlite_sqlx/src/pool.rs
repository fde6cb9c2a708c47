//! Connection pool for the device and user tables.
//!
//! File databases run in WAL mode so status reads never wait on the writer.
//! An in-memory database lives inside a single connection, so its pool is
//! pinned to exactly one connection that is never recycled.

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use crate::device_repo::SqliteDeviceRepository;
use crate::error::StorageError;
use crate::user_repo::SqliteUserRepository;

const FILE_MAX_CONNECTIONS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MEMORY_URL: &str = "sqlite::memory:";

/// An open, migrated database.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the database at `url`, creating the file if needed, and apply
    /// pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the URL is malformed, the connection
    /// fails, or a migration fails.
    pub async fn open(url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");

        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(FILE_MAX_CONNECTIONS)
                .connect_with(
                    options
                        .journal_mode(SqliteJournalMode::Wal)
                        .busy_timeout(BUSY_TIMEOUT),
                )
                .await?
        };

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!(in_memory, "database ready");
        Ok(Self { pool })
    }

    /// Open a fresh private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the migrations fail.
    pub async fn in_memory() -> Result<Self, StorageError> {
        Self::open(MEMORY_URL).await
    }

    /// Device repository sharing this pool.
    #[must_use]
    pub fn devices(&self) -> SqliteDeviceRepository {
        SqliteDeviceRepository::new(self.pool.clone())
    }

    /// User repository sharing this pool.
    #[must_use]
    pub fn users(&self) -> SqliteUserRepository {
        SqliteUserRepository::new(self.pool.clone())
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
