//! Common Utilities
//!
//! Shared error types, path resolution and HTTP client construction.

pub mod error;
pub mod http;
pub mod paths;

pub use error::{AuthError, ConfigError, ErrorCode, StorageError};
pub use http::create_http_client;
pub use paths::{bridge_dir, bridge_path};
