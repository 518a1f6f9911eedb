//! OAuth Provider Abstraction
//!
//! The token-endpoint operations the session layer needs from an
//! authorization server. Google is the only implementation; tests inject
//! fakes through the trait.

pub mod google;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

use super::credential::ScopeSet;

/// Tokens returned from an OAuth token exchange or refresh.
#[derive(Clone)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expiry: DateTime<Utc>,
    /// Granted scopes, when the server echoed them
    pub scopes: Option<ScopeSet>,
}

impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_type", &self.token_type)
            .field("expiry", &self.expiry)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Token endpoint failures.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an OAuth error (e.g. `invalid_grant`).
    #[error("{error}: {description}")]
    Rejected { error: String, description: String },

    #[error("invalid token response: {0}")]
    InvalidResponse(String),
}

/// OAuth provider trait.
///
/// Each provider implements authorization URL construction, token exchange,
/// token refresh, and revocation.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Provider name (e.g. "google")
    fn name(&self) -> &str;

    /// Build the authorization URL for the PKCE flow.
    fn authorize_url(
        &self,
        scopes: &ScopeSet,
        state: &str,
        code_challenge: &str,
        redirect_uri: &str,
    ) -> String;

    /// Exchange an authorization code for tokens.
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<OAuthTokens, ProviderError>;

    /// Refresh an access token using a refresh token.
    async fn refresh_token(&self, refresh_token: &str) -> Result<OAuthTokens, ProviderError>;

    /// Revoke a token at the provider.
    async fn revoke_token(&self, token: &str) -> Result<(), ProviderError>;
}
