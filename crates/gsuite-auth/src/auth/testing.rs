//! In-memory doubles for session-provider tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::authorizer::Authorizer;
use super::credential::{Credential, ScopeSet};
use super::provider::{OAuthProvider, OAuthTokens, ProviderError};
use super::store::CredentialStore;
use crate::common::{AuthError, StorageError};

pub fn tokens(access: &str, refresh: Option<&str>, expires_in_secs: i64) -> OAuthTokens {
    OAuthTokens {
        access_token: access.to_string(),
        refresh_token: refresh.map(String::from),
        token_type: "Bearer".to_string(),
        expiry: Utc::now() + Duration::seconds(expires_in_secs),
        scopes: None,
    }
}

pub fn credential(access: &str, refresh: &str, scopes: &ScopeSet, expiry: DateTime<Utc>) -> Credential {
    Credential {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        scopes: scopes.clone(),
        expiry,
        token_type: "Bearer".to_string(),
        issued_at: None,
        last_refreshed: None,
    }
}

// ── MemoryStore ─────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
    record: Mutex<Option<Credential>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn with(credential: Credential) -> Self {
        Self {
            record: Mutex::new(Some(credential)),
            ..Self::default()
        }
    }

    pub fn current(&self) -> Option<Credential> {
        self.record.lock().unwrap().clone()
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn fail_saves(&self) {
        self.fail_saves.store(true, Ordering::SeqCst);
    }
}

impl CredentialStore for MemoryStore {
    fn load(&self) -> Result<Option<Credential>, StorageError> {
        Ok(self.current())
    }

    fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Write {
                path: "memory".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.record.lock().unwrap() = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.record.lock().unwrap() = None;
        Ok(())
    }
}

// ── FakeProvider ────────────────────────────────────────────────────────────

/// Token endpoint that replays scripted responses in order.
#[derive(Default)]
pub struct FakeProvider {
    exchanges: Mutex<VecDeque<Result<OAuthTokens, ProviderError>>>,
    refreshes: Mutex<VecDeque<Result<OAuthTokens, ProviderError>>>,
    refresh_calls: AtomicUsize,
    revoked: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn push_exchange(&self, result: Result<OAuthTokens, ProviderError>) {
        self.exchanges.lock().unwrap().push_back(result);
    }

    pub fn push_refresh(&self, result: Result<OAuthTokens, ProviderError>) {
        self.refreshes.lock().unwrap().push_back(result);
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn revoked(&self) -> Vec<String> {
        self.revoked.lock().unwrap().clone()
    }
}

pub fn invalid_grant() -> ProviderError {
    ProviderError::Rejected {
        error: "invalid_grant".to_string(),
        description: "Token has been expired or revoked.".to_string(),
    }
}

fn unscripted() -> ProviderError {
    ProviderError::InvalidResponse("no scripted response".to_string())
}

#[async_trait]
impl OAuthProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn authorize_url(
        &self,
        scopes: &ScopeSet,
        state: &str,
        code_challenge: &str,
        redirect_uri: &str,
    ) -> String {
        format!(
            "https://auth.invalid/?scope={}&state={}&code_challenge={}&redirect_uri={}",
            scopes.to_space_delimited(),
            state,
            code_challenge,
            redirect_uri
        )
    }

    async fn exchange_code(
        &self,
        _code: &str,
        _code_verifier: &str,
        _redirect_uri: &str,
    ) -> Result<OAuthTokens, ProviderError> {
        self.exchanges
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(unscripted()))
    }

    async fn refresh_token(&self, _refresh_token: &str) -> Result<OAuthTokens, ProviderError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        // Let concurrent callers pile up on the session lock.
        tokio::task::yield_now().await;
        self.refreshes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(unscripted()))
    }

    async fn revoke_token(&self, token: &str) -> Result<(), ProviderError> {
        self.revoked.lock().unwrap().push(token.to_string());
        Ok(())
    }
}

// ── FakeAuthorizer ──────────────────────────────────────────────────────────

/// Consent flow that replays scripted outcomes and records requested scopes.
#[derive(Default)]
pub struct FakeAuthorizer {
    outcomes: Mutex<VecDeque<Result<Credential, AuthError>>>,
    requests: Mutex<Vec<ScopeSet>>,
}

impl FakeAuthorizer {
    pub fn push(&self, outcome: Result<Credential, AuthError>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ScopeSet> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Authorizer for FakeAuthorizer {
    async fn authorize(&self, scopes: &ScopeSet) -> Result<Credential, AuthError> {
        self.requests.lock().unwrap().push(scopes.clone());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AuthError::Authorization("access_denied".to_string())))
    }
}
