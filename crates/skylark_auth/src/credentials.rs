//! Refresh-credential storage.
//!
//! A credential is the long-lived refresh secret of one account, keyed by its
//! handle. Handles compare case-insensitively, so keys are lower-cased before
//! they reach the database.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::db::AuthDb;
use crate::error::AuthResult;

/// A stored credential as returned by [`CredentialStore::most_recent`].
#[derive(Clone, PartialEq, Eq)]
pub struct StoredCredential {
    pub handle: String,
    pub secret: String,
}

impl std::fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredential")
            .field("handle", &self.handle)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Persistent store for refresh credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync + std::fmt::Debug {
    /// Save (or replace) the secret for `handle`.
    async fn save(&self, handle: &str, secret: &str) -> AuthResult<()>;

    /// Load the secret for `handle`, if one is stored.
    async fn load(&self, handle: &str) -> AuthResult<Option<String>>;

    /// Remove the secret for `handle`. Removing a missing handle is not an error.
    async fn remove(&self, handle: &str) -> AuthResult<()>;

    /// The most recently saved credential, used to restore a session on launch.
    async fn most_recent(&self) -> AuthResult<Option<StoredCredential>>;

    /// Remove every stored credential.
    async fn clear(&self) -> AuthResult<()>;
}

/// Normalise a handle into its storage key.
pub fn credential_key(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_ascii_lowercase()
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    handle: String,
    secret: Vec<u8>,
}

#[async_trait]
impl CredentialStore for AuthDb {
    async fn save(&self, handle: &str, secret: &str) -> AuthResult<()> {
        let key = credential_key(handle);
        let sealed = self.cipher().seal(secret)?;
        let now = chrono::Utc::now().timestamp_millis();

        sqlx::query(
            r#"
            INSERT INTO account_credentials (handle, secret, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (handle) DO UPDATE SET
                secret = excluded.secret,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&key)
        .bind(sealed)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        debug!(handle = %key, "Stored credential");
        Ok(())
    }

    async fn load(&self, handle: &str) -> AuthResult<Option<String>> {
        let key = credential_key(handle);

        let row = sqlx::query_as::<_, CredentialRow>(
            "SELECT handle, secret FROM account_credentials WHERE handle = ?",
        )
        .bind(&key)
        .fetch_optional(self.pool())
        .await?;

        row.map(|row| self.cipher().open(&row.secret)).transpose()
    }

    async fn remove(&self, handle: &str) -> AuthResult<()> {
        let key = credential_key(handle);

        let result = sqlx::query("DELETE FROM account_credentials WHERE handle = ?")
            .bind(&key)
            .execute(self.pool())
            .await?;

        if result.rows_affected() > 0 {
            debug!(handle = %key, "Removed credential");
        }
        Ok(())
    }

    async fn most_recent(&self) -> AuthResult<Option<StoredCredential>> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT handle, secret FROM account_credentials
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(self.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        match self.cipher().open(&row.secret) {
            Ok(secret) => Ok(Some(StoredCredential {
                handle: row.handle,
                secret,
            })),
            Err(e) => {
                warn!(handle = %row.handle, "Stored credential could not be opened: {}", e);
                Err(e)
            }
        }
    }

    async fn clear(&self) -> AuthResult<()> {
        let result = sqlx::query("DELETE FROM account_credentials")
            .execute(self.pool())
            .await?;

        debug!("Cleared {} stored credentials", result.rows_affected());
        Ok(())
    }
}

impl AuthDb {
    /// List the handles that have a stored credential, newest first.
    pub async fn list_credential_handles(&self) -> AuthResult<Vec<String>> {
        let handles = sqlx::query_scalar::<_, String>(
            "SELECT handle FROM account_credentials ORDER BY updated_at DESC",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(handles)
    }
}
