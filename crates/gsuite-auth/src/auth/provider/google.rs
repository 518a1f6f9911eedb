//! Google OAuth2 Provider
//!
//! Implements the PKCE Authorization Code flow for Google APIs. Endpoints
//! and client credentials come from the client secrets file.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tracing::{error, info};

use super::{OAuthProvider, OAuthTokens, ProviderError};
use crate::auth::credential::ScopeSet;
use crate::common::create_http_client;
use crate::config::ApplicationIdentity;

const REVOKE_ENDPOINT: &str = "https://oauth2.googleapis.com/revoke";

/// Assumed access-token lifetime when the server omits `expires_in`
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Longest access-token lifetime accepted from the server (one year)
const MAX_EXPIRES_IN_SECS: i64 = 86_400 * 365;

/// Google OAuth2 provider.
pub struct GoogleProvider {
    identity: ApplicationIdentity,
    revoke_endpoint: String,
    http: reqwest::Client,
}

impl GoogleProvider {
    pub fn new(identity: ApplicationIdentity) -> Result<Self, ProviderError> {
        Ok(Self {
            identity,
            revoke_endpoint: REVOKE_ENDPOINT.to_string(),
            http: create_http_client()?,
        })
    }

    pub fn with_revoke_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.revoke_endpoint = endpoint.into();
        self
    }

    pub fn client_id(&self) -> &str {
        &self.identity.client_id
    }

    /// POST a form-encoded request and return the response body.
    ///
    /// Secrets travel in the request body, never in the URL.
    async fn post_form(
        &self,
        url: &str,
        params: &HashMap<&str, &str>,
    ) -> Result<String, ProviderError> {
        let response = self.http.post(url).form(params).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(match parse_oauth_error(&body) {
                Some(rejected) => {
                    error!("Token endpoint returned HTTP {}: {}", status, rejected);
                    rejected
                }
                None => {
                    error!("Token endpoint returned HTTP {}", status);
                    ProviderError::InvalidResponse(format!("HTTP {} from {}", status, url))
                }
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn authorize_url(
        &self,
        scopes: &ScopeSet,
        state: &str,
        code_challenge: &str,
        redirect_uri: &str,
    ) -> String {
        let scope_str = scopes.to_space_delimited();
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&code_challenge={}&code_challenge_method=S256&access_type=offline&prompt=consent",
            self.identity.auth_uri,
            urlencoding::encode(&self.identity.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope_str),
            urlencoding::encode(state),
            urlencoding::encode(code_challenge),
        )
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<OAuthTokens, ProviderError> {
        info!("Exchanging authorization code for tokens");

        let mut params = HashMap::new();
        params.insert("client_id", self.identity.client_id.as_str());
        params.insert("client_secret", self.identity.client_secret.as_str());
        params.insert("code", code);
        params.insert("code_verifier", code_verifier);
        params.insert("grant_type", "authorization_code");
        params.insert("redirect_uri", redirect_uri);

        let response = self.post_form(&self.identity.token_uri, &params).await?;
        parse_token_response(&response)
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<OAuthTokens, ProviderError> {
        info!("Refreshing access token");

        let mut params = HashMap::new();
        params.insert("client_id", self.identity.client_id.as_str());
        params.insert("client_secret", self.identity.client_secret.as_str());
        params.insert("refresh_token", refresh_token);
        params.insert("grant_type", "refresh_token");

        let response = self.post_form(&self.identity.token_uri, &params).await?;
        parse_token_response(&response)
    }

    async fn revoke_token(&self, token: &str) -> Result<(), ProviderError> {
        info!("Revoking token at Google");

        let mut params = HashMap::new();
        params.insert("token", token);

        // Google returns 200 with an empty body or `{}` on success.
        self.post_form(&self.revoke_endpoint, &params).await?;
        Ok(())
    }
}

// ── Response parsing ────────────────────────────────────────────────────────

/// Extract `{"error": ..., "error_description": ...}` from a response body.
fn parse_oauth_error(body: &str) -> Option<ProviderError> {
    let parsed: serde_json::Value = serde_json::from_str(body).ok()?;
    let err = parsed.get("error").and_then(|v| v.as_str())?;
    let desc = parsed
        .get("error_description")
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown error");
    Some(ProviderError::Rejected {
        error: err.to_string(),
        description: desc.to_string(),
    })
}

/// Parse a Google OAuth2 token response.
fn parse_token_response(body: &str) -> Result<OAuthTokens, ProviderError> {
    if let Some(rejected) = parse_oauth_error(body) {
        return Err(rejected);
    }

    let parsed: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("invalid JSON ({:?})", e.classify())))?;

    let access_token = parsed
        .get("access_token")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProviderError::InvalidResponse("missing access_token".to_string()))?
        .to_string();

    let refresh_token = parsed
        .get("refresh_token")
        .and_then(|v| v.as_str())
        .map(String::from);

    let token_type = parsed
        .get("token_type")
        .and_then(|v| v.as_str())
        .unwrap_or("Bearer")
        .to_string();

    let expires_in = parsed
        .get("expires_in")
        .and_then(|v| v.as_i64())
        .unwrap_or(DEFAULT_EXPIRES_IN_SECS);
    if !(0..=MAX_EXPIRES_IN_SECS).contains(&expires_in) {
        return Err(ProviderError::InvalidResponse(format!(
            "expires_in out of range: {}",
            expires_in
        )));
    }

    let expiry = Utc::now() + chrono::Duration::seconds(expires_in);

    let scopes = parsed
        .get("scope")
        .and_then(|v| v.as_str())
        .map(ScopeSet::from_space_delimited);

    Ok(OAuthTokens {
        access_token,
        refresh_token,
        token_type,
        expiry,
        scopes,
    })
}

// ── PKCE Utilities ──────────────────────────────────────────────────────────

/// Generate a PKCE code verifier (43-128 characters of unreserved URI characters).
pub fn generate_code_verifier() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64_url_encode(&bytes)
}

/// Derive the PKCE code challenge from a code verifier using S256.
pub fn generate_code_challenge(verifier: &str) -> String {
    use sha2::{Digest, Sha256};
    let hash = Sha256::digest(verifier.as_bytes());
    base64_url_encode(&hash)
}

/// Generate a random state string for CSRF protection
pub fn generate_state() -> String {
    use rand::Rng;
    let bytes: [u8; 16] = rand::rngs::OsRng.gen();
    hex::encode(bytes)
}

/// Base64url encoding (no padding) per RFC 4648 §5.
fn base64_url_encode(data: &[u8]) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    URL_SAFE_NO_PAD.encode(data)
}
