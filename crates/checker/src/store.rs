// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable single-record credential storage (`config.json`).
//!
//! The record holds the bearer token and its expiry as an RFC 3339 timestamp
//! rendered in the civil timezone. Writes go to a unique temp file that is
//! renamed over the target, so a crash never leaves a different valid record
//! behind. Concurrent writers are not serialized: last rename wins.

use std::fmt;
use std::fs;
use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, SecondsFormat, TimeDelta};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::CivilClock;

/// Persisted credential record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(default)]
    pub token: String,
    /// Expiry timestamp formatted in the civil timezone.
    #[serde(default, rename = "expires_in")]
    pub expires_at: String,
}

impl Credential {
    /// Parse the stored expiry into the civil timezone.
    pub fn expires_at(&self, tz: Tz) -> Result<DateTime<Tz>, TokenError> {
        DateTime::parse_from_rfc3339(&self.expires_at)
            .map(|t| t.with_timezone(&tz))
            .map_err(|_| TokenError::InvalidExpiry)
    }
}

/// Why a stored credential cannot be used. Checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    NoToken,
    InvalidExpiry,
    Expired,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoToken => f.write_str("config has no token"),
            Self::InvalidExpiry => f.write_str("expires_in has invalid string"),
            Self::Expired => f.write_str("token expired"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Failure to read or write the credential file.
#[derive(Debug)]
pub enum StoreError {
    /// The path is missing or names a directory.
    NotFound(PathBuf),
    Io { path: PathBuf, source: std::io::Error },
    /// The file exists but does not hold a credential record.
    Parse { path: PathBuf, source: serde_json::Error },
    Encode(serde_json::Error),
    /// `now + expires_in` has no four-digit-year RFC 3339 form.
    ExpiryOutOfRange(u64),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "config file not found: {}", path.display()),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Parse { path, source } => {
                write!(f, "config file {} is corrupt: {source}", path.display())
            }
            Self::Encode(e) => write!(f, "failed to encode config: {e}"),
            Self::ExpiryOutOfRange(secs) => {
                write!(f, "expires_in of {secs} seconds is out of range")
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NotFound(_) | Self::ExpiryOutOfRange(_) => None,
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Encode(e) => Some(e),
        }
    }
}

/// Destination for a freshly exchanged token.
///
/// Implemented by [`ConfigStore`]; the callback validator only depends on
/// this seam so tests can observe or fail persistence.
pub trait TokenSink: Send + Sync {
    fn save(&self, token: &str, expires_in_secs: u64) -> Result<Credential, StoreError>;
}

/// Latest year RFC 3339 can represent.
const MAX_EXPIRY_YEAR: i32 = 9999;

/// File-backed credential store.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    clock: CivilClock,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>, clock: CivilClock) -> Self {
        Self { path: path.into(), clock }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn clock(&self) -> &CivilClock {
        &self.clock
    }

    /// Read the stored credential.
    pub fn load(&self) -> Result<Credential, StoreError> {
        match fs::metadata(&self.path) {
            Ok(meta) if meta.is_dir() => return Err(StoreError::NotFound(self.path.clone())),
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(self.path.clone()));
            }
            Err(e) => return Err(StoreError::Io { path: self.path.clone(), source: e }),
        }
        let contents = fs::read_to_string(&self.path)
            .map_err(|e| StoreError::Io { path: self.path.clone(), source: e })?;
        serde_json::from_str(&contents)
            .map_err(|e| StoreError::Parse { path: self.path.clone(), source: e })
    }

    /// Check that `cred` holds a token that is still usable.
    ///
    /// Returns the parsed expiry on success.
    pub fn validate(&self, cred: &Credential) -> Result<DateTime<Tz>, TokenError> {
        if cred.token.is_empty() {
            return Err(TokenError::NoToken);
        }
        let expires_at = cred.expires_at(self.clock.tz())?;
        if expires_at < self.clock.now() {
            return Err(TokenError::Expired);
        }
        Ok(expires_at)
    }

    /// Remove the whole storage directory. Missing directories are a no-op.
    pub fn reset(&self) -> Result<(), StoreError> {
        let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) else {
            return Ok(());
        };
        match fs::metadata(dir) {
            Ok(meta) if meta.is_dir() => {
                fs::remove_dir_all(dir)
                    .map_err(|e| StoreError::Io { path: dir.to_path_buf(), source: e })?;
                info!(dir = %dir.display(), "removed config directory");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn write_atomic(&self, json: &str) -> Result<(), StoreError> {
        use std::sync::atomic::{AtomicU32, Ordering};
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            ensure_private_dir(dir)?;
        }

        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_name = format!(
            "{}.{}.{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy(),
            std::process::id(),
            seq,
        );
        let tmp_path = self.path.with_file_name(tmp_name);
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| StoreError::Io { path, source }
        };

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&tmp_path)
            .map_err(io_err(&tmp_path))?;
        file.write_all(json.as_bytes()).map_err(io_err(&tmp_path))?;
        file.sync_all().map_err(io_err(&tmp_path))?;
        drop(file);

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(StoreError::Io { path: self.path.clone(), source: e });
        }
        Ok(())
    }
}

impl TokenSink for ConfigStore {
    /// Persist `token` with an expiry of now + `expires_in_secs`, replacing
    /// any previous record. An expiry past year 9999 is refused and the
    /// existing record is left untouched.
    fn save(&self, token: &str, expires_in_secs: u64) -> Result<Credential, StoreError> {
        let expires_at = i64::try_from(expires_in_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|lifetime| self.clock.now().checked_add_signed(lifetime))
            .filter(|at| at.year() <= MAX_EXPIRY_YEAR)
            .ok_or(StoreError::ExpiryOutOfRange(expires_in_secs))?;
        let cred = Credential {
            token: token.to_owned(),
            expires_at: expires_at.to_rfc3339_opts(SecondsFormat::Secs, false),
        };
        let json = serde_json::to_string_pretty(&cred).map_err(StoreError::Encode)?;
        self.write_atomic(&json)?;
        debug!(path = %self.path.display(), expires_at = %cred.expires_at, "saved credential");
        Ok(cred)
    }
}

/// Create `dir` (and parents) with owner-only permissions if it is absent.
pub fn ensure_private_dir(dir: &Path) -> Result<(), StoreError> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
        .map_err(|e| StoreError::Io { path: dir.to_path_buf(), source: e })
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
