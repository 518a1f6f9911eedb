//! Session Provider
//!
//! The single entry point tool handlers call before touching a Google API.
//! Every call loads the persisted credential and decides between returning
//! it, refreshing it, or running consent again. The decide-and-persist
//! sequence runs under one async mutex, so concurrent callers never race a
//! refresh or trigger two consent flows.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::authorizer::Authorizer;
use super::credential::{Credential, CredentialStatus, ScopeSet};
use super::provider::OAuthProvider;
use super::store::CredentialStore;
use crate::common::AuthError;

/// Refresh when the access token expires within this window
pub const DEFAULT_REFRESH_MARGIN_SECS: i64 = 60;

pub struct SessionProvider {
    store: Arc<dyn CredentialStore>,
    provider: Arc<dyn OAuthProvider>,
    authorizer: Arc<dyn Authorizer>,
    default_scopes: ScopeSet,
    refresh_margin: Duration,
    lock: Mutex<()>,
}

impl SessionProvider {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        provider: Arc<dyn OAuthProvider>,
        authorizer: Arc<dyn Authorizer>,
        default_scopes: ScopeSet,
    ) -> Self {
        Self {
            store,
            provider,
            authorizer,
            default_scopes,
            refresh_margin: Duration::seconds(DEFAULT_REFRESH_MARGIN_SECS),
            lock: Mutex::new(()),
        }
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn default_scopes(&self) -> &ScopeSet {
        &self.default_scopes
    }

    pub fn refresh_margin(&self) -> Duration {
        self.refresh_margin
    }

    /// Return a credential that is valid for immediate use and grants every
    /// scope in `required`.
    ///
    /// Refreshes an expiring token, and falls back to consent (at most once)
    /// when there is no usable record or the refresh is rejected. Storage
    /// failures propagate as-is; a failed consent is reported as
    /// `AuthError::Authentication`.
    pub async fn get_valid_credential(&self, required: &ScopeSet) -> Result<Credential, AuthError> {
        let _guard = self.lock.lock().await;

        let stored = self.store.load()?;
        let status =
            CredentialStatus::classify(stored.as_ref(), required, self.refresh_margin, Utc::now());

        match (status, stored) {
            (CredentialStatus::Valid { expires_in_secs, .. }, Some(credential)) => {
                debug!("Stored credential valid for {}s", expires_in_secs);
                Ok(credential)
            }
            (CredentialStatus::NeedsRefresh { .. }, Some(mut credential)) => {
                match self.refresh(&mut credential).await {
                    Ok(()) => Ok(credential),
                    Err(AuthError::Refresh(reason)) => {
                        warn!("Token refresh failed ({}); falling back to consent", reason);
                        self.authorize_and_store(required).await
                    }
                    Err(e) => Err(e),
                }
            }
            (status, _) => {
                info!("No usable credential ({:?}); starting consent", status);
                self.authorize_and_store(required).await
            }
        }
    }

    /// Refresh the stored credential regardless of its expiry.
    ///
    /// Never falls back to consent.
    pub async fn force_refresh(&self) -> Result<Credential, AuthError> {
        let _guard = self.lock.lock().await;

        let mut credential = self
            .store
            .load()?
            .ok_or_else(|| AuthError::Refresh("no stored credential to refresh".to_string()))?;
        self.refresh(&mut credential).await?;
        Ok(credential)
    }

    /// Run consent for the configured scopes and replace the stored record.
    pub async fn reauthorize(&self) -> Result<Credential, AuthError> {
        let _guard = self.lock.lock().await;
        self.authorize_and_store(&ScopeSet::default()).await
    }

    /// Revoke the stored grant at Google (best effort) and delete the record.
    ///
    /// Returns whether a record existed.
    pub async fn revoke(&self) -> Result<bool, AuthError> {
        let _guard = self.lock.lock().await;

        let Some(credential) = self.store.load()? else {
            self.store.clear()?;
            return Ok(false);
        };

        // Revoking the refresh token also invalidates its access tokens.
        match self.provider.revoke_token(&credential.refresh_token).await {
            Ok(()) => info!("Revoked grant at {}", self.provider.name()),
            Err(e) => warn!("Provider-side revocation failed: {}; clearing local record anyway", e),
        }

        self.store.clear()?;
        Ok(true)
    }

    /// Classify the stored record against `required` without network
    /// access or writes.
    pub fn status(&self, required: &ScopeSet) -> Result<CredentialStatus, AuthError> {
        let stored = self.store.inspect()?;
        Ok(CredentialStatus::classify(
            stored.as_ref(),
            required,
            self.refresh_margin,
            Utc::now(),
        ))
    }

    async fn refresh(&self, credential: &mut Credential) -> Result<(), AuthError> {
        info!("Access token expires at {}; refreshing", credential.expiry);

        let tokens = self
            .provider
            .refresh_token(&credential.refresh_token)
            .await
            .map_err(|e| AuthError::Refresh(e.to_string()))?;

        credential.apply_refresh(&tokens, Utc::now());
        self.store.save(credential)?;

        info!("Token refreshed; new expiry {}", credential.expiry);
        Ok(())
    }

    async fn authorize_and_store(&self, required: &ScopeSet) -> Result<Credential, AuthError> {
        // One consent covers the whole catalogue.
        let scopes = required.union(&self.default_scopes);

        let credential = self
            .authorizer
            .authorize(&scopes)
            .await
            .map_err(AuthError::authentication)?;
        self.store.save(&credential)?;

        info!("Stored new credential with {} scope(s)", credential.scopes.len());
        Ok(credential)
    }
}
