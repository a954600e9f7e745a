// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk token store.
//!
//! Writers (`save`, `delete`) serialize through the file lock; readers
//! (`load`, `exists`) take no lock and rely on atomic rename to never see a
//! partial file.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::{ensure_dir, TOKEN_FILE};
use crate::error::AuthError;
use crate::lock::{self, LockConfig};
use crate::persist;
use crate::token::Token;

/// Suffix of a token file set aside because it could not be parsed.
pub const CORRUPT_SUFFIX: &str = ".corrupt";

/// Owns the token file inside a configuration directory.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
    lock: LockConfig,
}

impl TokenStore {
    /// Store for `token.json` inside `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self::at(dir.as_ref().join(TOKEN_FILE))
    }

    /// Store for an explicit token file path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: LockConfig::default() }
    }

    pub fn with_lock_config(mut self, lock: LockConfig) -> Self {
        self.lock = lock;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist `token`, replacing whatever is stored.
    pub fn save(&self, token: &Token) -> Result<(), AuthError> {
        if let Some(dir) = self.path.parent() {
            ensure_dir(dir)?;
        }
        let guard = lock::acquire(&self.path, &self.lock)?;
        persist::write_json(&self.path, token)?;
        guard.release()?;
        debug!(path = %self.path.display(), expiry = token.expiry, "token saved");
        Ok(())
    }

    /// Merge `incoming` over the stored token and persist the result, all
    /// under the lock so a refresh token saved concurrently is never lost.
    ///
    /// An unreadable token file is moved to `<file>.corrupt` and replaced.
    pub fn save_merged(&self, incoming: Token) -> Result<Token, AuthError> {
        if let Some(dir) = self.path.parent() {
            ensure_dir(dir)?;
        }
        let guard = lock::acquire(&self.path, &self.lock)?;
        let existing = match self.load() {
            Ok(token) => Some(token),
            Err(AuthError::NotAuthenticated { .. }) => None,
            Err(e @ AuthError::TokenParse { .. }) => {
                let kept = self.corrupt_path();
                warn!(err = %e, kept = %kept.display(), "setting aside unreadable token file");
                std::fs::rename(&self.path, &kept)
                    .map_err(|e| AuthError::io("failed to move aside", &self.path, e))?;
                None
            }
            Err(e) => return Err(e),
        };
        let merged = incoming.merged_over(existing.as_ref());
        persist::write_json(&self.path, &merged)?;
        guard.release()?;
        debug!(path = %self.path.display(), expiry = merged.expiry, "token merged and saved");
        Ok(merged)
    }

    /// Where [`save_merged`](Self::save_merged) keeps an unreadable token file.
    pub fn corrupt_path(&self) -> PathBuf {
        let mut path = self.path.as_os_str().to_owned();
        path.push(CORRUPT_SUFFIX);
        PathBuf::from(path)
    }

    /// Read the stored token without locking.
    pub fn load(&self) -> Result<Token, AuthError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(AuthError::NotAuthenticated { path: self.path.clone() });
            }
            Err(e) => return Err(AuthError::io("failed to read", &self.path, e)),
        };
        serde_json::from_str(&contents)
            .map_err(|source| AuthError::TokenParse { path: self.path.clone(), source })
    }

    /// Remove the stored token. Removing an absent token succeeds.
    pub fn delete(&self) -> Result<(), AuthError> {
        if self.path.parent().is_some_and(|dir| !dir.as_os_str().is_empty() && !dir.is_dir()) {
            return Ok(());
        }
        let guard = lock::acquire(&self.path, &self.lock)?;
        match std::fs::remove_file(&self.path) {
            Ok(()) => info!(path = %self.path.display(), "token deleted"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(AuthError::io("failed to delete", &self.path, e)),
        }
        guard.release()
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
