//! Authorizer
//!
//! Runs the interactive Authorization Code + PKCE flow and exchanges the
//! resulting code for an initial credential. This is the only operation
//! that waits on a human, so it is bounded by a timeout and can be
//! cancelled.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::consent::ConsentChannel;
use super::credential::{Credential, ScopeSet};
use super::provider::google::{generate_code_challenge, generate_code_verifier, generate_state};
use super::provider::OAuthProvider;
use crate::common::AuthError;

/// Default bound on waiting for the user to finish consent
pub const DEFAULT_CONSENT_TIMEOUT: Duration = Duration::from_secs(120);

/// Produces a brand-new credential through user consent.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Obtain a credential granting every scope in `scopes`.
    ///
    /// Never retries; every failure is an `AuthError::Authorization`.
    async fn authorize(&self, scopes: &ScopeSet) -> Result<Credential, AuthError>;
}

pub struct OAuthAuthorizer {
    provider: Arc<dyn OAuthProvider>,
    channel: Arc<dyn ConsentChannel>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl OAuthAuthorizer {
    pub fn new(provider: Arc<dyn OAuthProvider>, channel: Arc<dyn ConsentChannel>) -> Self {
        Self {
            provider,
            channel,
            timeout: DEFAULT_CONSENT_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts a consent wait in progress.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

#[async_trait]
impl Authorizer for OAuthAuthorizer {
    async fn authorize(&self, scopes: &ScopeSet) -> Result<Credential, AuthError> {
        if self.cancel.is_cancelled() {
            return Err(AuthError::Authorization("consent cancelled".to_string()));
        }

        let mut pending = self.channel.open().await?;
        let redirect_uri = pending.redirect_uri().to_string();

        let code_verifier = generate_code_verifier();
        let code_challenge = generate_code_challenge(&code_verifier);
        let state = generate_state();
        let auth_url = self
            .provider
            .authorize_url(scopes, &state, &code_challenge, &redirect_uri);

        info!(
            "Starting {} consent for {} scope(s)",
            self.provider.name(),
            scopes.len()
        );

        let code = tokio::select! {
            _ = self.cancel.cancelled() => {
                warn!("Consent cancelled");
                return Err(AuthError::Authorization("consent cancelled".to_string()));
            }
            result = tokio::time::timeout(self.timeout, pending.wait_for_code(&auth_url, &state)) => {
                result.map_err(|_| {
                    AuthError::Authorization(format!(
                        "consent timed out after {} seconds",
                        self.timeout.as_secs()
                    ))
                })??
            }
        };

        let tokens = self
            .provider
            .exchange_code(&code, &code_verifier, &redirect_uri)
            .await
            .map_err(|e| AuthError::Authorization(format!("code exchange failed: {}", e)))?;

        let credential =
            Credential::from_grant(&tokens, scopes, Utc::now()).map_err(AuthError::Authorization)?;

        info!("Consent completed; credential expires at {}", credential.expiry);
        Ok(credential)
    }
}
