//! Database connection and operations for auth.db.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::{debug, info};

use crate::cipher::SecretCipher;
use crate::error::AuthResult;

/// Authentication database handle.
///
/// Manages the SQLite connection pool for auth.db, which stores:
/// - Sealed refresh credentials, one per account handle
/// - User-facing settings (last used handle)
///
/// Cloning is cheap; clones share the pool and the cipher.
#[derive(Debug, Clone)]
pub struct AuthDb {
    pool: SqlitePool,
    cipher: SecretCipher,
}

impl AuthDb {
    /// Open or create an auth database at the given path.
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Run any pending migrations
    /// 3. Configure SQLite for WAL mode
    pub async fn open(path: impl AsRef<Path>, cipher: SecretCipher) -> AuthResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty() && !p.exists()) {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening auth database: {}", path.display());

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .pragma("synchronous", "NORMAL")
            .pragma("temp_store", "MEMORY");

        let pool = SqlitePoolOptions::new()
            .max_connections(3)
            .connect_with(options)
            .await?;

        debug!("Auth database connection established");

        Self::run_migrations(&pool).await?;

        Ok(Self { pool, cipher })
    }

    /// Open `auth.db` and `credential.key` inside `data_dir`.
    pub async fn open_in_dir(data_dir: impl AsRef<Path>) -> AuthResult<Self> {
        let data_dir = data_dir.as_ref();
        let cipher = SecretCipher::load_or_create(data_dir.join("credential.key")).await?;
        Self::open(data_dir.join("auth.db"), cipher).await
    }

    /// Open an in-memory database with an ephemeral key (for testing).
    pub async fn open_in_memory() -> AuthResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1) // In-memory must be single connection to share state
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::run_migrations(&pool).await?;

        Ok(Self {
            pool,
            cipher: SecretCipher::ephemeral(),
        })
    }

    async fn run_migrations(pool: &SqlitePool) -> AuthResult<()> {
        debug!("Running auth database migrations");
        sqlx::migrate!("./migrations").run(pool).await?;
        info!("Auth database migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub(crate) fn cipher(&self) -> &SecretCipher {
        &self.cipher
    }

    /// Close the database connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
