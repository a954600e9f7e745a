// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration directory layout.

use std::path::{Path, PathBuf};

use crate::error::AuthError;

/// Token file name inside the configuration directory.
pub const TOKEN_FILE: &str = "token.json";

/// Granted-services file name inside the configuration directory.
pub const GRANTED_FILE: &str = "granted-services.json";

/// Resolve the per-user configuration directory.
///
/// Checks `GWX_CONFIG_DIR`, then `$XDG_CONFIG_HOME/gwx`,
/// then `$HOME/.config/gwx`.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("GWX_CONFIG_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg).join("gwx");
        }
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".config/gwx");
    }
    PathBuf::from(".gwx")
}

/// Create `dir` (and parents) if missing. New directories are owner-only.
pub(crate) fn ensure_dir(dir: &Path) -> Result<(), AuthError> {
    if dir.as_os_str().is_empty() || dir.is_dir() {
        return Ok(());
    }
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir).map_err(|e| AuthError::io("failed to create directory", dir, e))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
