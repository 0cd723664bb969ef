// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session key material (`session-config`).
//!
//! A 96-byte file: the 64-byte HMAC key followed by the 32-byte sealing key.
//! Generated on first use and reused afterwards so cookies survive restarts.

use std::fmt;
use std::fs;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use rand::Rng;
use tracing::info;

use crate::store::{ensure_private_dir, StoreError};

pub const HASH_KEY_LEN: usize = 64;
pub const BLOCK_KEY_LEN: usize = 32;
const FILE_LEN: usize = HASH_KEY_LEN + BLOCK_KEY_LEN;

/// Keys for authenticating and sealing session cookies.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKeys {
    hash_key: [u8; HASH_KEY_LEN],
    block_key: [u8; BLOCK_KEY_LEN],
}

impl SessionKeys {
    /// Fresh random keys.
    pub fn generate() -> Self {
        let mut hash_key = [0u8; HASH_KEY_LEN];
        let mut block_key = [0u8; BLOCK_KEY_LEN];
        let mut rng = rand::rng();
        rng.fill(&mut hash_key[..]);
        rng.fill(&mut block_key[..]);
        Self { hash_key, block_key }
    }

    pub fn hash_key(&self) -> &[u8] {
        &self.hash_key
    }

    pub fn block_key(&self) -> &[u8] {
        &self.block_key
    }

    /// Read keys from `path`, generating and writing them if the file is
    /// absent.
    pub fn load_or_create(path: &Path) -> anyhow::Result<Self> {
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => {
                anyhow::bail!("session key path is a directory: {}", path.display())
            }
            Ok(_) => {
                let bytes = fs::read(path)?;
                Self::from_bytes(&bytes).ok_or_else(|| {
                    anyhow::anyhow!(
                        "session key file {} has {} bytes, expected {FILE_LEN}",
                        path.display(),
                        bytes.len()
                    )
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let keys = Self::generate();
                keys.write(path)?;
                info!(path = %path.display(), "generated session keys");
                Ok(keys)
            }
            Err(e) => Err(anyhow::anyhow!("{}: {e}", path.display())),
        }
    }

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != FILE_LEN {
            return None;
        }
        let (hash, block) = bytes.split_at(HASH_KEY_LEN);
        Some(Self { hash_key: hash.try_into().ok()?, block_key: block.try_into().ok()? })
    }

    fn write(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            ensure_private_dir(dir)?;
        }
        let io_err = |source| StoreError::Io { path: path.to_path_buf(), source };
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(path)
            .map_err(io_err)?;
        file.write_all(&self.hash_key).map_err(io_err)?;
        file.write_all(&self.block_key).map_err(io_err)?;
        file.sync_all().map_err(io_err)
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKeys(..)")
    }
}

#[cfg(test)]
#[path = "keys_tests.rs"]
mod tests;
