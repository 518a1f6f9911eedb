//! Credential Store
//!
//! File-based persistence of the single credential record at
//! `~/.gsuite-bridge/token.json`. Writes go to a temp file in the same
//! directory and are renamed into place, so a reader never observes a
//! half-written record. The record is `0600`, its directory `0700`.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

use super::credential::Credential;
use crate::common::StorageError;

/// Suffix appended to a malformed record when it is moved aside
const CORRUPT_SUFFIX: &str = "corrupt";

/// Durable storage for exactly one credential record.
pub trait CredentialStore: Send + Sync {
    /// Read the persisted record.
    ///
    /// Returns `Ok(None)` when no record exists or the record is malformed.
    fn load(&self) -> Result<Option<Credential>, StorageError>;

    /// Read the persisted record without side effects.
    ///
    /// Unlike `load`, a malformed record is left where it is.
    fn inspect(&self) -> Result<Option<Credential>, StorageError> {
        self.load()
    }

    /// Atomically replace the persisted record.
    fn save(&self, credential: &Credential) -> Result<(), StorageError>;

    /// Remove the persisted record. Removing a missing record is not an error.
    fn clear(&self) -> Result<(), StorageError>;
}

// ── FileCredentialStore ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where a malformed record is moved for later inspection.
    pub fn corrupt_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "token.json".to_string());
        self.path
            .with_file_name(format!("{}.{}", name, CORRUPT_SUFFIX))
    }

    fn quarantine(&self) {
        let target = self.corrupt_path();
        match fs::rename(&self.path, &target) {
            Ok(()) => warn!("Moved malformed credential record to {:?}", target),
            Err(e) => warn!("Failed to move malformed credential record aside: {}", e),
        }
    }

    fn write_err(&self, source: std::io::Error) -> StorageError {
        StorageError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl FileCredentialStore {
    fn read_record(&self, quarantine: bool) -> Result<Option<Credential>, StorageError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No credential record at {:?}", self.path);
                return Ok(None);
            }
            Err(source) => {
                return Err(StorageError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        match serde_json::from_slice::<Credential>(&data) {
            Ok(credential) => Ok(Some(credential)),
            Err(e) => {
                // Only position and category: the message itself can quote token values.
                warn!(
                    "Credential record {:?} is malformed ({:?} at line {}, column {}); treating as absent",
                    self.path,
                    e.classify(),
                    e.line(),
                    e.column()
                );
                if quarantine {
                    self.quarantine();
                }
                Ok(None)
            }
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credential>, StorageError> {
        self.read_record(true)
    }

    fn inspect(&self) -> Result<Option<Credential>, StorageError> {
        self.read_record(false)
    }

    fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(credential)?;
        atomic_write(&self.path, &json).map_err(|e| self.write_err(e))?;
        info!("Credential record saved to {:?}", self.path);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Removed credential record {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.write_err(e)),
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn ensure_private_dir(dir: &Path) -> std::io::Result<()> {
    if dir.as_os_str().is_empty() || dir.exists() {
        return Ok(());
    }
    fs::create_dir_all(dir)?;
    #[cfg(unix)]
    fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    Ok(())
}

/// Write `data` to `path` via a sibling temp file and rename.
fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        ensure_private_dir(parent)?;
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| std::io::Error::new(ErrorKind::InvalidInput, "path has no file name"))?;
    let nonce = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let temp_path = path.with_file_name(format!(
        ".{}.tmp-{}-{}",
        file_name.to_string_lossy(),
        std::process::id(),
        nonce
    ));

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let write_result = (|| -> std::io::Result<()> {
        let mut temp_file = options.open(&temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()?;
        Ok(())
    })();

    if let Err(e) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}
