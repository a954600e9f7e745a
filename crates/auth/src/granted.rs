// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Services the user authorized at last login, kept apart from the token.
//!
//! Written only during login, so it uses the atomic write path without the
//! file lock.

use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;

use crate::config::GRANTED_FILE;
use crate::error::AuthError;
use crate::persist;

#[derive(Debug, Clone)]
pub struct GrantedStore {
    path: PathBuf,
}

impl GrantedStore {
    /// Store for `granted-services.json` inside `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { path: dir.as_ref().join(GRANTED_FILE) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist the ordered service list.
    pub fn save<S: AsRef<str>>(&self, names: &[S]) -> Result<(), AuthError> {
        let names: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
        persist::write_json(&self.path, &names)
    }

    /// The saved list, or `None` if nothing was ever saved.
    ///
    /// `Some(vec![])` means a login that granted no extra services.
    pub fn load(&self) -> Result<Option<Vec<String>>, AuthError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AuthError::io("failed to read", &self.path, e)),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| AuthError::TokenParse { path: self.path.clone(), source })
    }

    /// Forget the saved list. Idempotent.
    pub fn clear(&self) -> Result<(), AuthError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::io("failed to delete", &self.path, e)),
        }
    }
}

/// Order-preserving, deduplicated `previous ∪ requested`.
pub fn union<S: AsRef<str>>(previous: &[String], requested: &[S]) -> Vec<String> {
    let merged: IndexSet<&str> = previous
        .iter()
        .map(String::as_str)
        .chain(requested.iter().map(AsRef::as_ref))
        .collect();
    merged.into_iter().map(str::to_owned).collect()
}

#[cfg(test)]
#[path = "granted_tests.rs"]
mod tests;
