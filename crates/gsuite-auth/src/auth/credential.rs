//! Credential Model
//!
//! The single persisted OAuth credential, its scope set, and the status
//! classification the session provider decides on.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::provider::OAuthTokens;

/// Prefix for Google API scope URIs
const GOOGLE_SCOPE_PREFIX: &str = "https://www.googleapis.com/auth/";

/// OpenID scopes that are not expressed as URIs
const BARE_SCOPES: &[&str] = &["openid", "email", "profile"];

/// Expand a short scope name (`gmail.readonly`) to its full URI.
///
/// Full URIs and the OpenID scopes are returned unchanged.
pub fn normalize_scope(scope: &str) -> String {
    let scope = scope.trim();
    if scope.contains("://") || BARE_SCOPES.contains(&scope) {
        scope.to_string()
    } else {
        format!("{}{}", GOOGLE_SCOPE_PREFIX, scope)
    }
}

// ── ScopeSet ────────────────────────────────────────────────────────────────

/// An ordered, de-duplicated set of normalized scope URIs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ScopeSet(BTreeSet<String>);

impl ScopeSet {
    pub fn new<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            scopes
                .into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .map(|s| normalize_scope(&s))
                .collect(),
        )
    }

    /// Parse the space-delimited `scope` field of a token response.
    pub fn from_space_delimited(scopes: &str) -> Self {
        Self::new(scopes.split_whitespace())
    }

    /// Space-delimited form used in authorization URLs.
    pub fn to_space_delimited(&self) -> String {
        self.0.iter().cloned().collect::<Vec<_>>().join(" ")
    }

    /// Whether every scope in `required` is present in this set.
    pub fn covers(&self, required: &ScopeSet) -> bool {
        required.0.is_subset(&self.0)
    }

    /// Scopes in `required` that this set lacks.
    pub fn missing(&self, required: &ScopeSet) -> Vec<String> {
        required.0.difference(&self.0).cloned().collect()
    }

    pub fn union(&self, other: &ScopeSet) -> ScopeSet {
        Self(self.0.union(&other.0).cloned().collect())
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(&normalize_scope(scope))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for ScopeSet {
    fn from(scopes: Vec<String>) -> Self {
        Self::new(scopes)
    }
}

impl From<ScopeSet> for Vec<String> {
    fn from(set: ScopeSet) -> Self {
        set.0.into_iter().collect()
    }
}

impl<S: AsRef<str>> FromIterator<S> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

// ── Credential ──────────────────────────────────────────────────────────────

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// The user's OAuth credential (decrypted, in-memory form).
///
/// Application identity (`client_id` / `client_secret`) is deliberately not
/// part of this record; it lives in the client secrets file.
#[derive(Clone, PartialEq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    #[zeroize(skip)]
    pub scopes: ScopeSet,
    #[zeroize(skip)]
    pub expiry: DateTime<Utc>,
    #[serde(default = "default_token_type")]
    #[zeroize(skip)]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[zeroize(skip)]
    pub issued_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[zeroize(skip)]
    pub last_refreshed: Option<DateTime<Utc>>,
}

// Custom Debug implementation that redacts sensitive fields
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .field("expiry", &self.expiry)
            .field("token_type", &self.token_type)
            .field("issued_at", &self.issued_at)
            .field("last_refreshed", &self.last_refreshed)
            .finish()
    }
}

impl Credential {
    /// Build the initial credential from a code-exchange response.
    ///
    /// Fails when the server issued no refresh token, or when the user
    /// granted only part of `requested`.
    pub fn from_grant(
        tokens: &OAuthTokens,
        requested: &ScopeSet,
        now: DateTime<Utc>,
    ) -> Result<Self, String> {
        let refresh_token = tokens
            .refresh_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or("token endpoint did not issue a refresh token")?;

        // Google omits `scope` on some grants; treat the request as granted.
        let scopes = tokens
            .scopes
            .clone()
            .unwrap_or_else(|| requested.clone());

        let missing = scopes.missing(requested);
        if !missing.is_empty() {
            return Err(format!(
                "consent granted only part of the requested scopes (missing: {})",
                missing.join(", ")
            ));
        }

        Ok(Self {
            access_token: tokens.access_token.clone(),
            refresh_token,
            scopes,
            expiry: tokens.expiry,
            token_type: tokens.token_type.clone(),
            issued_at: Some(now),
            last_refreshed: None,
        })
    }

    /// Apply a refresh response in place.
    ///
    /// Scopes never change on refresh; the refresh token is replaced only
    /// when the server rotated it.
    pub fn apply_refresh(&mut self, tokens: &OAuthTokens, now: DateTime<Utc>) {
        self.access_token = tokens.access_token.clone();
        if let Some(rt) = tokens.refresh_token.as_ref().filter(|t| !t.is_empty()) {
            self.refresh_token = rt.clone();
        }
        self.token_type = tokens.token_type.clone();
        self.expiry = tokens.expiry;
        self.last_refreshed = Some(now);
    }

    /// Whether the access token expires within `margin` of `now`.
    pub fn is_expiring(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        self.expiry.signed_duration_since(now) < margin
    }

    /// Value for an HTTP `Authorization` header.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    pub fn status(
        &self,
        required: &ScopeSet,
        margin: Duration,
        now: DateTime<Utc>,
    ) -> CredentialStatus {
        let missing = self.scopes.missing(required);
        if !missing.is_empty() {
            return CredentialStatus::InsufficientScopes { missing };
        }

        if self.is_expiring(margin, now) {
            CredentialStatus::NeedsRefresh {
                expiry: self.expiry,
            }
        } else {
            CredentialStatus::Valid {
                expiry: self.expiry,
                expires_in_secs: self.expiry.signed_duration_since(now).num_seconds(),
            }
        }
    }
}

// ── Status ──────────────────────────────────────────────────────────────────

/// Where a stored credential stands relative to a required scope set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CredentialStatus {
    Absent,
    InsufficientScopes {
        missing: Vec<String>,
    },
    NeedsRefresh {
        expiry: DateTime<Utc>,
    },
    Valid {
        expiry: DateTime<Utc>,
        expires_in_secs: i64,
    },
}

impl CredentialStatus {
    pub fn classify(
        stored: Option<&Credential>,
        required: &ScopeSet,
        margin: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        match stored {
            None => CredentialStatus::Absent,
            Some(credential) => credential.status(required, margin, now),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, CredentialStatus::Valid { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(refresh: Option<&str>, scopes: Option<ScopeSet>) -> OAuthTokens {
        OAuthTokens {
            access_token: "ya29.new".to_string(),
            refresh_token: refresh.map(String::from),
            token_type: "Bearer".to_string(),
            expiry: Utc::now() + Duration::seconds(3600),
            scopes,
        }
    }

    fn credential(expiry: DateTime<Utc>) -> Credential {
        Credential {
            access_token: "ya29.old".to_string(),
            refresh_token: "1//refresh".to_string(),
            scopes: ScopeSet::new(["gmail.readonly", "calendar.events"]),
            expiry,
            token_type: "Bearer".to_string(),
            issued_at: None,
            last_refreshed: None,
        }
    }

    #[test]
    fn test_normalize_scope() {
        assert_eq!(
            normalize_scope("gmail.readonly"),
            "https://www.googleapis.com/auth/gmail.readonly"
        );
        assert_eq!(
            normalize_scope("https://mail.google.com/"),
            "https://mail.google.com/"
        );
        assert_eq!(normalize_scope("openid"), "openid");
    }

    #[test]
    fn test_scope_coverage() {
        let granted = ScopeSet::new(["gmail.readonly", "gmail.send", "drive"]);
        assert!(granted.covers(&ScopeSet::new(["gmail.readonly"])));
        assert!(granted.covers(&ScopeSet::default()));
        assert!(!granted.covers(&ScopeSet::new(["calendar.events"])));
        assert_eq!(
            granted.missing(&ScopeSet::new(["drive", "calendar.events"])),
            vec!["https://www.googleapis.com/auth/calendar.events".to_string()]
        );
    }

    #[test]
    fn test_scope_set_serializes_as_list() {
        let set = ScopeSet::from_space_delimited("drive gmail.send  ");
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                "https://www.googleapis.com/auth/drive",
                "https://www.googleapis.com/auth/gmail.send"
            ])
        );
        let back: ScopeSet = serde_json::from_value(json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let c = credential(Utc::now());
        let debug = format!("{:?}", c);
        assert!(!debug.contains("ya29.old"));
        assert!(!debug.contains("1//refresh"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_status_classification() {
        let now = Utc::now();
        let margin = Duration::seconds(60);
        let required = ScopeSet::new(["gmail.readonly"]);

        assert_eq!(
            CredentialStatus::classify(None, &required, margin, now),
            CredentialStatus::Absent
        );

        let expired = credential(now - Duration::seconds(10));
        assert!(matches!(
            expired.status(&required, margin, now),
            CredentialStatus::NeedsRefresh { .. }
        ));

        let near_expiry = credential(now + Duration::seconds(30));
        assert!(matches!(
            near_expiry.status(&required, margin, now),
            CredentialStatus::NeedsRefresh { .. }
        ));

        let fresh = credential(now + Duration::seconds(3600));
        assert!(fresh.status(&required, margin, now).is_valid());

        let wider = ScopeSet::new(["gmail.readonly", "drive"]);
        assert_eq!(
            fresh.status(&wider, margin, now),
            CredentialStatus::InsufficientScopes {
                missing: vec!["https://www.googleapis.com/auth/drive".to_string()]
            }
        );
    }

    #[test]
    fn test_from_grant_requires_refresh_token() {
        let requested = ScopeSet::new(["gmail.readonly"]);
        let err = Credential::from_grant(&tokens(None, None), &requested, Utc::now()).unwrap_err();
        assert!(err.contains("refresh token"));
    }

    #[test]
    fn test_from_grant_uses_requested_scopes_when_not_echoed() {
        let requested = ScopeSet::new(["gmail.readonly", "drive"]);
        let c = Credential::from_grant(&tokens(Some("R1"), None), &requested, Utc::now()).unwrap();
        assert_eq!(c.scopes, requested);
        assert_eq!(c.refresh_token, "R1");
        assert!(c.issued_at.is_some());
    }

    #[test]
    fn test_from_grant_rejects_partial_consent() {
        let requested = ScopeSet::new(["gmail.readonly", "drive"]);
        let granted = Some(ScopeSet::new(["gmail.readonly"]));
        let err = Credential::from_grant(&tokens(Some("R1"), granted), &requested, Utc::now())
            .unwrap_err();
        assert!(err.contains("auth/drive"));
    }

    #[test]
    fn test_apply_refresh_keeps_refresh_token() {
        let now = Utc::now();
        let mut c = credential(now - Duration::seconds(10));
        c.apply_refresh(&tokens(None, None), now);
        assert_eq!(c.access_token, "ya29.new");
        assert_eq!(c.refresh_token, "1//refresh");
        assert_eq!(c.last_refreshed, Some(now));
        assert!(!c.is_expiring(Duration::seconds(60), now));
    }

    #[test]
    fn test_apply_refresh_adopts_rotated_refresh_token() {
        let now = Utc::now();
        let mut c = credential(now);
        c.apply_refresh(&tokens(Some("1//rotated"), None), now);
        assert_eq!(c.refresh_token, "1//rotated");
    }
}
