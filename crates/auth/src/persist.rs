// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic, owner-only JSON writes (write tmp + fsync + rename).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;
use tracing::debug;

use crate::config::ensure_dir;
use crate::error::AuthError;

/// Suffix shared by every temporary file this module creates.
pub const TMP_SUFFIX: &str = ".tmp";

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
///
/// Readers observe either the old or the new complete file. The temporary
/// file is removed if any step fails.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AuthError> {
    let json = serde_json::to_string_pretty(value)?;
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let tmp_path = tmp_path_for(path);
    let result = write_tmp(&tmp_path, json.as_bytes()).and_then(|()| {
        fs::rename(&tmp_path, path).map_err(|e| AuthError::io("failed to replace", path, e))
    });
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result?;

    debug!(path = %path.display(), bytes = json.len(), "wrote file");
    Ok(())
}

/// Unique temporary sibling: `<file>.<pid>.<seq>.tmp`.
fn tmp_path_for(path: &Path) -> PathBuf {
    unique_sibling(path, TMP_SUFFIX)
}

/// Sibling named `<file>.<pid>.<seq><suffix>`.
///
/// PID plus a per-process counter keeps concurrent callers, in this process
/// or another, off each other's path.
pub(crate) fn unique_sibling(path: &Path, suffix: &str) -> PathBuf {
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let name = format!(
        "{}.{}.{}{suffix}",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    path.with_file_name(name)
}

fn write_tmp(tmp_path: &Path, contents: &[u8]) -> Result<(), AuthError> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file =
        options.open(tmp_path).map_err(|e| AuthError::io("failed to create", tmp_path, e))?;
    file.write_all(contents).map_err(|e| AuthError::io("failed to write", tmp_path, e))?;
    file.sync_all().map_err(|e| AuthError::io("failed to sync", tmp_path, e))
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;
