//! Skylark Auth - Credential and settings storage for the Skylark client.
//!
//! This crate provides the persistent, security-sensitive half of a session:
//! - Refresh credentials for signed-in accounts (`CredentialStore`)
//! - Small user-facing settings such as the last used handle (`UserSettings`)
//!
//! # Architecture
//!
//! Everything lives in a dedicated `auth.db` next to a `credential.key` file.
//! Secrets are sealed with AES-256-GCM before they are written, so the
//! database alone never exposes a usable credential.

pub mod cipher;
pub mod credentials;
pub mod db;
pub mod error;
pub mod settings;

pub use cipher::SecretCipher;
pub use credentials::{CredentialStore, StoredCredential};
pub use db::AuthDb;
pub use error::{AuthError, AuthResult};
pub use settings::{LAST_USED_HANDLE_KEY, UserSettings};
