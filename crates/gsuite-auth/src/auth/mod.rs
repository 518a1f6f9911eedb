//! Credential lifecycle
//!
//! Persisted OAuth credential, the consent flow that creates it, and the
//! session provider that keeps it valid.
//!
//! Credential file: `~/.gsuite-bridge/token.json` (mode 0600)

pub mod authorizer;
pub mod consent;
pub mod credential;
pub mod provider;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use authorizer::{Authorizer, OAuthAuthorizer};
pub use consent::{ConsentChannel, LoopbackConsent, PendingConsent};
pub use credential::{normalize_scope, Credential, CredentialStatus, ScopeSet};
pub use provider::google::GoogleProvider;
pub use provider::{OAuthProvider, OAuthTokens, ProviderError};
pub use session::SessionProvider;
pub use store::{CredentialStore, FileCredentialStore};

use crate::common::{AuthError, ConfigError};
use crate::config::BridgeConfig;

/// Wire the production session provider from configuration.
///
/// Loads the client secrets file; `cancel` aborts a consent wait.
pub fn session_from_config(
    config: &BridgeConfig,
    cancel: CancellationToken,
) -> Result<SessionProvider, AuthError> {
    config.validate()?;

    let identity = config.load_identity()?;
    if !identity.allows_loopback_redirect() {
        return Err(ConfigError::Invalid(format!(
            "OAuth client {} does not allow a loopback redirect; use a Desktop app client",
            identity.client_id
        ))
        .into());
    }

    let provider: Arc<dyn OAuthProvider> = Arc::new(
        GoogleProvider::new(identity)
            .map_err(|e| AuthError::Authorization(format!("HTTP client setup failed: {}", e)))?,
    );

    let channel = Arc::new(LoopbackConsent::new(
        config.callback_host.clone(),
        config.callback_port,
        config.open_browser,
    ));
    let authorizer = OAuthAuthorizer::new(provider.clone(), channel)
        .with_timeout(config.consent_timeout())
        .with_cancellation(cancel);

    let store = Arc::new(FileCredentialStore::new(config.token_path.clone()));

    info!("Credential store at {:?}", config.token_path);
    Ok(
        SessionProvider::new(store, provider, Arc::new(authorizer), config.scope_set())
            .with_refresh_margin(config.refresh_margin()),
    )
}
