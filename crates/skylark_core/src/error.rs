use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::ApiError;

/// Configuration-specific errors
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(String),

    #[error("Invalid value for field {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Diagnostic, Debug)]
pub enum CoreError {
    #[error("Configuration error for field '{field}'")]
    #[diagnostic(
        code(skylark_core::configuration_error),
        help("Check configuration file at {config_path}\nExpected: {expected}")
    )]
    ConfigurationError {
        config_path: String,
        field: String,
        expected: String,
        #[source]
        cause: ConfigError,
    },

    #[error("Credential storage failed during {operation}")]
    #[diagnostic(
        code(skylark_core::credential_store),
        help("The local auth database may be locked or corrupted")
    )]
    CredentialStore {
        operation: String,
        #[source]
        cause: skylark_auth::AuthError,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Api(#[from] ApiError),

    #[error("Missing required input: {field}")]
    #[diagnostic(
        code(skylark_core::missing_input),
        help("{field} must be provided and non-empty")
    )]
    MissingInput { field: &'static str },

    #[error("No account is signed in")]
    #[diagnostic(
        code(skylark_core::not_signed_in),
        help("Run `skylark login <handle>` first")
    )]
    NotSignedIn,

    #[error("Post rejected: {reason}")]
    #[diagnostic(code(skylark_core::invalid_post))]
    InvalidPost { reason: String },
}

impl CoreError {
    pub(crate) fn credential_store(
        operation: impl Into<String>,
        cause: skylark_auth::AuthError,
    ) -> Self {
        Self::CredentialStore {
            operation: operation.into(),
            cause,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
