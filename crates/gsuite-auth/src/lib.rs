//! OAuth2 credential lifecycle and tool dispatch for Google Workspace tools.
//!
//! Tool handlers ask the [`SessionProvider`] for a credential before every
//! Google API call. The provider returns the stored credential when it is
//! still valid, refreshes it when it is about to expire, and falls back to
//! the interactive consent flow when there is nothing usable on disk.

pub mod auth;
pub mod common;
pub mod config;
pub mod tools;

pub use auth::{
    session_from_config, Authorizer, Credential, CredentialStatus, CredentialStore,
    FileCredentialStore, ScopeSet, SessionProvider,
};
pub use common::{AuthError, ConfigError, ErrorCode, StorageError};
pub use config::{ApplicationIdentity, BridgeConfig, DEFAULT_SCOPES};
pub use tools::{AuthorizedSession, ToolDescriptor, ToolDispatcher, ToolError, ToolHandler};
