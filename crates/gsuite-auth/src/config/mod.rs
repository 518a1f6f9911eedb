//! Configuration management
//!
//! Handles the Google client secrets file (application identity) and the
//! optional bridge settings file under `~/.gsuite-bridge/`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::auth::credential::ScopeSet;
use crate::common::{paths, ConfigError};

/// Scopes requested at consent time unless the settings file overrides them.
///
/// Changing this set invalidates stored credentials: the next call re-runs
/// the consent flow.
pub const DEFAULT_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/calendar.events",
    "https://www.googleapis.com/auth/drive",
];

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

// ── Application identity ────────────────────────────────────────────────────

/// OAuth client registration, loaded read-only from the client secrets file.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct ApplicationIdentity {
    #[zeroize(skip)]
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    #[zeroize(skip)]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    #[zeroize(skip)]
    pub token_uri: String,
    #[serde(default)]
    #[zeroize(skip)]
    pub redirect_uris: Vec<String>,
}

impl fmt::Debug for ApplicationIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationIdentity")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("auth_uri", &self.auth_uri)
            .field("token_uri", &self.token_uri)
            .field("redirect_uris", &self.redirect_uris)
            .finish()
    }
}

/// Layouts accepted for the client secrets file: Google Cloud Console
/// downloads (`installed` / `web`) and a flat object.
#[derive(Deserialize)]
#[serde(untagged)]
enum ClientSecretsFile {
    Installed { installed: ApplicationIdentity },
    Web { web: ApplicationIdentity },
    Flat(ApplicationIdentity),
}

impl ApplicationIdentity {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_uri: default_auth_uri(),
            token_uri: default_token_uri(),
            redirect_uris: Vec::new(),
        }
    }

    /// Load and validate a client secrets file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let identity = Self::from_json(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        info!("Loaded OAuth client {} from {:?}", identity.client_id, path);
        Ok(identity)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let file: ClientSecretsFile =
            serde_json::from_str(content).map_err(|source| ConfigError::Parse {
                path: PathBuf::new(),
                source,
            })?;

        let identity = match file {
            ClientSecretsFile::Installed { installed } => installed,
            ClientSecretsFile::Web { web } => web,
            ClientSecretsFile::Flat(identity) => identity,
        };

        if identity.client_id.trim().is_empty() || identity.client_secret.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "Client ID and Client Secret are required".to_string(),
            ));
        }

        Ok(identity)
    }

    /// Whether the registration accepts a loopback redirect
    /// (`http://localhost` or `http://127.0.0.1`, any port).
    pub fn allows_loopback_redirect(&self) -> bool {
        // Desktop clients list no redirect URIs and accept loopback implicitly.
        self.redirect_uris.is_empty()
            || self.redirect_uris.iter().any(|uri| {
                uri.starts_with("http://localhost") || uri.starts_with("http://127.0.0.1")
            })
    }
}

// ── Bridge settings ─────────────────────────────────────────────────────────

/// Bridge settings, read from `~/.gsuite-bridge/config.json` when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Persisted credential record
    pub token_path: PathBuf,
    /// Google client secrets file
    pub client_secrets_path: PathBuf,
    /// Scopes requested at consent time
    pub scopes: Vec<String>,
    /// Refresh when the access token expires within this many seconds
    pub refresh_margin_secs: i64,
    /// Give up on interactive consent after this many seconds
    pub consent_timeout_secs: u64,
    /// Interface the consent callback listener binds to
    pub callback_host: String,
    /// Callback port; 0 picks a free port
    pub callback_port: u16,
    /// Launch the system browser for consent
    pub open_browser: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let base = paths::bridge_dir().unwrap_or_else(|_| PathBuf::from(".gsuite-bridge"));
        Self {
            token_path: base.join("token.json"),
            client_secrets_path: base.join("client_secret.json"),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            refresh_margin_secs: 60,
            consent_timeout_secs: 120,
            callback_host: "127.0.0.1".to_string(),
            callback_port: 0,
            open_browser: true,
        }
    }
}

impl BridgeConfig {
    /// Load settings from `path`, or from the default location.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (paths::config_path()?, false),
        };

        if !required && !path.exists() {
            debug!("No config file at {:?}; using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
        config.validate()?;

        info!("Loaded bridge config from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scopes.iter().all(|s| s.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "at least one scope must be configured".to_string(),
            ));
        }
        if self.refresh_margin_secs < 0 {
            return Err(ConfigError::Invalid(
                "refresh_margin_secs must not be negative".to_string(),
            ));
        }
        if self.consent_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "consent_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn scope_set(&self) -> ScopeSet {
        ScopeSet::new(&self.scopes)
    }

    pub fn refresh_margin(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_margin_secs)
    }

    pub fn consent_timeout(&self) -> Duration {
        Duration::from_secs(self.consent_timeout_secs)
    }

    pub fn load_identity(&self) -> Result<ApplicationIdentity, ConfigError> {
        ApplicationIdentity::load(&self.client_secrets_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_installed_client_secrets() {
        let json = r#"{
            "installed": {
                "client_id": "123.apps.googleusercontent.com",
                "project_id": "demo",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token",
                "client_secret": "GOCSPX-secret",
                "redirect_uris": ["http://localhost"]
            }
        }"#;
        let identity = ApplicationIdentity::from_json(json).unwrap();
        assert_eq!(identity.client_id, "123.apps.googleusercontent.com");
        assert_eq!(identity.auth_uri, "https://accounts.google.com/o/oauth2/auth");
        assert!(identity.allows_loopback_redirect());
    }

    #[test]
    fn test_web_client_secrets_default_endpoints() {
        let json = r#"{"web": {"client_id": "abc", "client_secret": "def",
            "redirect_uris": ["https://example.com/oauth2callback"]}}"#;
        let identity = ApplicationIdentity::from_json(json).unwrap();
        assert_eq!(identity.token_uri, DEFAULT_TOKEN_URI);
        assert!(!identity.allows_loopback_redirect());
    }

    #[test]
    fn test_flat_client_secrets() {
        let identity =
            ApplicationIdentity::from_json(r#"{"client_id": "abc", "client_secret": "def"}"#)
                .unwrap();
        assert_eq!(identity.client_secret, "def");
    }

    #[test]
    fn test_empty_client_secret_rejected() {
        let err = ApplicationIdentity::from_json(r#"{"client_id": "abc", "client_secret": " "}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_identity_debug_redacts_secret() {
        let identity = ApplicationIdentity::new("abc", "GOCSPX-secret");
        assert!(!format!("{:?}", identity).contains("GOCSPX-secret"));
    }

    #[test]
    fn test_load_identity_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client_secret.json");
        std::fs::write(&path, "not json").unwrap();

        match ApplicationIdentity::load(&path) {
            Err(ConfigError::Parse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_config_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"refresh_margin_secs": 300, "scopes": ["drive"]}"#).unwrap();

        let config = BridgeConfig::load(Some(&path)).unwrap();
        assert_eq!(config.refresh_margin(), chrono::Duration::seconds(300));
        assert_eq!(config.consent_timeout(), Duration::from_secs(120));
        assert!(config.scope_set().contains("https://www.googleapis.com/auth/drive"));
        assert_eq!(config.scope_set().len(), 1);
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(
            BridgeConfig::load(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = BridgeConfig {
            consent_timeout_secs: 0,
            ..BridgeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_scopes() {
        let scopes = BridgeConfig::default().scope_set();
        assert_eq!(scopes.len(), 4);
        assert!(scopes.contains("gmail.send"));
        assert!(scopes.contains("calendar.events"));
    }
}
