//! AES-256-GCM sealing for stored secrets.
//!
//! Sealed format: `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
//! A fresh random nonce is drawn for every seal, so sealing the same secret
//! twice never produces the same bytes.

use std::path::Path;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::Rng;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{AuthError, AuthResult};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Seals and opens credential secrets with a single 256-bit key.
#[derive(Clone)]
pub struct SecretCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCipher").finish_non_exhaustive()
    }
}

impl SecretCipher {
    /// Build a cipher from raw key bytes.
    pub fn from_key(key: &[u8]) -> AuthResult<Self> {
        if key.len() != KEY_LEN {
            return Err(AuthError::Crypto(format!(
                "key must be {KEY_LEN} bytes, got {}",
                key.len()
            )));
        }
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| AuthError::Crypto(e.to_string()))?;
        Ok(Self { cipher })
    }

    /// Build a cipher with a random key that is never written anywhere.
    ///
    /// Used by in-memory databases.
    pub fn ephemeral() -> Self {
        let key: [u8; KEY_LEN] = rand::rng().random();
        Self {
            cipher: Aes256Gcm::new(&key.into()),
        }
    }

    /// Load the key stored at `path`, creating a new random key if the file is missing.
    ///
    /// The key is stored base64-encoded. On unix the file is restricted to the owner.
    pub async fn load_or_create(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref();

        match tokio::fs::read_to_string(path).await {
            Ok(encoded) => {
                debug!("Loading credential key from {}", path.display());
                let key = STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| AuthError::InvalidKey {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    })?;
                Self::from_key(&key).map_err(|e| AuthError::InvalidKey {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Creating new credential key at {}", path.display());
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }

                let key: [u8; KEY_LEN] = rand::rng().random();
                write_key_file(path, &STANDARD.encode(key)).await?;

                Self::from_key(&key)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Seal a secret.
    pub fn seal(&self, secret: &str) -> AuthResult<Vec<u8>> {
        let nonce_bytes: [u8; NONCE_LEN] = rand::rng().random();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, Payload::from(secret.as_bytes()))
            .map_err(|e| AuthError::Crypto(format!("seal failed: {e}")))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Open a sealed secret.
    pub fn open(&self, sealed: &[u8]) -> AuthResult<String> {
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(AuthError::Crypto("sealed secret is truncated".to_string()));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), Payload::from(ciphertext))
            .map_err(|e| AuthError::Crypto(format!("open failed: {e}")))?;

        String::from_utf8(plaintext).map_err(|e| AuthError::Crypto(format!("invalid UTF-8: {e}")))
    }
}

/// Create the key file, owner-only from the first byte on unix.
///
/// Fails if the file already exists.
async fn write_key_file(path: &Path, encoded: &str) -> AuthResult<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(encoded.as_bytes()).await?;
    file.sync_all().await?;
    Ok(())
}
