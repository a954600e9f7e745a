// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Errors surfaced by the credential lifecycle manager.
///
/// Nothing in this crate logs-and-swallows one of these; every failure is
/// returned to the caller. The only best-effort path is stale-lock cleanup,
/// which falls through to the normal wait loop instead of raising.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No token file on disk. Recover by logging in.
    #[error("not authenticated: no token at {} (run `gwx auth login`)", path.display())]
    NotAuthenticated { path: PathBuf },

    /// The token file exists but is not a valid token document. The file is
    /// left in place for inspection.
    #[error("{} is corrupt; re-authenticate with `gwx auth login`", path.display())]
    TokenParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Another process held the lock for longer than the wait budget.
    #[error("timed out after {waited:?} waiting for lock {}", path.display())]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error("{context} {}: {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The access token expired and there is no refresh token to renew it.
    #[error("token expired and no refresh token is stored; run `gwx auth login`")]
    TokenExpired,

    /// The identity provider rejected or failed an exchange.
    #[error("oauth: {message}")]
    OAuth { message: String },
}

impl AuthError {
    pub(crate) fn io(
        context: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io { context, path: path.into(), source }
    }

    pub(crate) fn oauth(message: impl Into<String>) -> Self {
        Self::OAuth { message: message.into() }
    }

    /// Whether retrying the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }

    /// Process exit code for a CLI invocation that failed with this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotAuthenticated { .. } | Self::TokenExpired => 4,
            Self::TokenParse { .. } => 65,
            Self::LockTimeout { .. } => 75,
            Self::Io { .. } | Self::Serialize(_) | Self::OAuth { .. } => 1,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
