//! Configuration system for Skylark
//!
//! Configuration is a TOML file with one table per concern. Every field has a
//! default, so an empty or missing file yields a working client.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::error::{ConfigError, CoreError};

/// Default PDS (personal data server) entryway.
pub const DEFAULT_PDS_URL: &str = "https://bsky.social";

/// Upper bound the server accepts for `limit` on feed and notification listings.
pub const MAX_PAGE_SIZE: u8 = 100;

/// Upper bound for `[auth]` durations, one year.
pub const MAX_AUTH_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SkylarkConfig {
    pub service: ServiceConfig,
    pub auth: AuthConfig,
    pub cache: CacheConfig,
    pub feed: FeedConfig,
}

/// Where and how to reach the network
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the PDS that issues sessions and proxies app views.
    pub pds_url: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            pds_url: DEFAULT_PDS_URL.to_string(),
            timeout_secs: 30,
            user_agent: concat!("skylark/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Session and credential settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Directory holding `auth.db` and `credential.key`.
    pub data_dir: PathBuf,
    /// Assumed access token lifetime when the JWT carries no readable `exp`.
    pub access_token_lifetime_secs: u64,
    /// Refresh the access token this long before it expires.
    pub refresh_margin_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("skylark"),
            access_token_lifetime_secs: 2 * 60 * 60,
            refresh_margin_secs: 5 * 60,
        }
    }
}

impl AuthConfig {
    /// Clamped to [`MAX_AUTH_DURATION_SECS`].
    pub fn access_token_lifetime(&self) -> chrono::Duration {
        bounded_secs(self.access_token_lifetime_secs)
    }

    /// Clamped to [`MAX_AUTH_DURATION_SECS`].
    pub fn refresh_margin(&self) -> chrono::Duration {
        bounded_secs(self.refresh_margin_secs)
    }
}

fn bounded_secs(secs: u64) -> chrono::Duration {
    let secs = i64::try_from(secs.min(MAX_AUTH_DURATION_SECS)).unwrap_or_default();
    chrono::Duration::try_seconds(secs).unwrap_or(chrono::Duration::zero())
}

/// Profile cache bounds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub profile_ttl_secs: u64,
    pub profile_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            profile_ttl_secs: 15 * 60,
            profile_capacity: 1000,
        }
    }
}

impl CacheConfig {
    pub fn profile_ttl(&self) -> Duration {
        Duration::from_secs(self.profile_ttl_secs)
    }
}

/// Paging for feed-like listings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeedConfig {
    pub page_size: u8,
    pub notifications_page_size: u8,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            notifications_page_size: 50,
        }
    }
}

impl FeedConfig {
    /// Timeline page size clamped to what the server accepts.
    pub fn timeline_limit(&self) -> u8 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn notifications_limit(&self) -> u8 {
        self.notifications_page_size.clamp(1, MAX_PAGE_SIZE)
    }
}

/// Load configuration from a TOML file
pub async fn load_config(path: &Path) -> Result<SkylarkConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CoreError::ConfigurationError {
            config_path: path.display().to_string(),
            field: "file".to_string(),
            expected: "readable TOML file".to_string(),
            cause: ConfigError::Io(e.to_string()),
        })?;

    let mut config: SkylarkConfig =
        toml::from_str(&content).map_err(|e| CoreError::ConfigurationError {
            config_path: path.display().to_string(),
            field: "content".to_string(),
            expected: "valid TOML configuration".to_string(),
            cause: ConfigError::TomlParse(e.to_string()),
        })?;

    // Relative data directories are relative to the config file
    let base_dir = path.parent().unwrap_or(Path::new("."));
    config.auth.data_dir = resolve_path(base_dir, &config.auth.data_dir);

    validate(&config).map_err(|cause| {
        let field = match &cause {
            ConfigError::InvalidValue { field, .. } => field.clone(),
            _ => "service.pds_url".to_string(),
        };
        let expected = if field.starts_with("auth.") {
            format!("at most {MAX_AUTH_DURATION_SECS} seconds")
        } else {
            "absolute http(s) URL".to_string()
        };
        CoreError::ConfigurationError {
            config_path: path.display().to_string(),
            field,
            expected,
            cause,
        }
    })?;

    Ok(config)
}

/// Save configuration to a TOML file
pub async fn save_config(config: &SkylarkConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CoreError::ConfigurationError {
                config_path: parent.display().to_string(),
                field: "directory".to_string(),
                expected: "writable directory".to_string(),
                cause: ConfigError::Io(e.to_string()),
            })?;
    }

    let content = toml::to_string_pretty(config).map_err(|e| CoreError::ConfigurationError {
        config_path: path.display().to_string(),
        field: "serialization".to_string(),
        expected: "serializable config structure".to_string(),
        cause: ConfigError::TomlSerialize(e.to_string()),
    })?;

    tokio::fs::write(path, content)
        .await
        .map_err(|e| CoreError::ConfigurationError {
            config_path: path.display().to_string(),
            field: "file".to_string(),
            expected: "writable file location".to_string(),
            cause: ConfigError::Io(e.to_string()),
        })?;

    Ok(())
}

fn validate(config: &SkylarkConfig) -> std::result::Result<(), ConfigError> {
    let url = url::Url::parse(&config.service.pds_url).map_err(|e| ConfigError::InvalidValue {
        field: "service.pds_url".to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue {
            field: "service.pds_url".to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    for (field, secs) in [
        ("auth.access_token_lifetime_secs", config.auth.access_token_lifetime_secs),
        ("auth.refresh_margin_secs", config.auth.refresh_margin_secs),
    ] {
        if secs > MAX_AUTH_DURATION_SECS {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                reason: format!("{secs} is more than {MAX_AUTH_DURATION_SECS} seconds"),
            });
        }
    }

    Ok(())
}

fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Standard config file locations
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("skylark.toml")];

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("skylark").join("config.toml"));
    }

    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(".skylark").join("config.toml"));
    }

    paths
}

/// Load configuration from standard locations
pub async fn load_config_from_standard_locations() -> Result<SkylarkConfig> {
    for path in config_paths() {
        if path.exists() {
            return load_config(&path).await;
        }
    }

    Ok(SkylarkConfig::default())
}

impl SkylarkConfig {
    /// Load configuration from standard locations
    pub async fn load() -> Result<Self> {
        load_config_from_standard_locations().await
    }

    /// Load configuration from a specific file
    pub async fn load_from(path: &Path) -> Result<Self> {
        load_config(path).await
    }

    /// Save configuration to a specific file
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        save_config(self, path).await
    }
}
