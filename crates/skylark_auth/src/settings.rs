//! User-facing key-value settings.

use async_trait::async_trait;

use crate::db::AuthDb;
use crate::error::AuthResult;

/// Key under which the handle typed on the last successful sign-in is kept.
pub const LAST_USED_HANDLE_KEY: &str = "last_used_user_identifier";

/// Minimal persisted key-value settings.
#[async_trait]
pub trait UserSettings: Send + Sync {
    async fn get(&self, key: &str) -> AuthResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> AuthResult<()>;
}

#[async_trait]
impl UserSettings for AuthDb {
    async fn get(&self, key: &str) -> AuthResult<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM user_settings WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool())
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> AuthResult<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO user_settings (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT (key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(())
    }
}
