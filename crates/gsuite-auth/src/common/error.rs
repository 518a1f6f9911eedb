//! Common Error Types
//!
//! Error enums for the credential layer, with JSON-RPC error code mapping
//! for the tool-dispatch boundary.

use std::path::PathBuf;

use thiserror::Error;

/// JSON-RPC error codes
///
/// Standard codes: -32768 to -32000
/// Custom codes: -32099 to -32000
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Standard JSON-RPC errors
    MethodNotFound = -32601,
    InvalidParams = -32602,

    // Credential layer
    CredentialUnavailable = -32010,
    TokenRefreshFailed = -32011,
    AuthorizationFailed = -32016,
    StorageFailed = -32017,
    ConfigInvalid = -32018,

    // Generic application error
    GenericError = -32000,
}

impl ErrorCode {
    pub fn code(&self) -> i32 {
        *self as i32
    }
}

/// Failure reading or writing the persisted credential record.
///
/// A record that does not exist is not an error; see `CredentialStore::load`.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read credential record {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write credential record {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode credential record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Missing or invalid configuration / application identity.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine home directory")]
    HomeDirUnavailable,

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Invalid(String),
}

/// Errors produced by the credential lifecycle.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Interactive consent denied, timed out, cancelled, or the code
    /// exchange failed. Requires a human to retry.
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// The authorization server rejected the refresh token.
    #[error("token refresh rejected: {0}")]
    Refresh(String),

    /// No valid credential could be produced by any path.
    #[error("no valid credential available: {source}")]
    Authentication {
        #[source]
        source: Box<AuthError>,
    },
}

impl AuthError {
    /// Wrap a failure as the umbrella error returned to tool handlers.
    pub fn authentication(source: AuthError) -> Self {
        match source {
            already @ AuthError::Authentication { .. } => already,
            other => AuthError::Authentication {
                source: Box::new(other),
            },
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AuthError::Storage(_) => ErrorCode::StorageFailed,
            AuthError::Config(_) => ErrorCode::ConfigInvalid,
            AuthError::Authorization(_) => ErrorCode::AuthorizationFailed,
            AuthError::Refresh(_) => ErrorCode::TokenRefreshFailed,
            AuthError::Authentication { .. } => ErrorCode::CredentialUnavailable,
        }
    }
}
