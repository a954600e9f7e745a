// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use gwx_auth::oauth::{OAuthConfig, DEFAULT_DEVICE_AUTH_URL, DEFAULT_TOKEN_URL};
use gwx_auth::{GrantedStore, LockConfig, TokenStore};

use crate::command::auth::AuthCommand;

/// Google Workspace from the command line.
#[derive(Debug, Parser)]
#[command(name = "gwx", version, about)]
pub struct Config {
    /// Directory holding the token and granted-services files.
    #[arg(long, env = "GWX_CONFIG_DIR", global = true)]
    pub config_dir: Option<PathBuf>,

    /// Age after which an unreleased lock marker may be reclaimed.
    #[arg(long, env = "GWX_LOCK_STALE_MS", global = true)]
    pub lock_stale_ms: Option<u64>,

    /// How long to wait for the token lock before giving up.
    #[arg(long, env = "GWX_LOCK_TIMEOUT_MS", global = true)]
    pub lock_timeout_ms: Option<u64>,

    /// OAuth client ID used for login and refresh.
    #[arg(long, env = "GWX_CLIENT_ID", global = true)]
    pub client_id: Option<String>,

    /// OAuth client secret, for client types that have one.
    #[arg(long, env = "GWX_CLIENT_SECRET", global = true, hide_env_values = true)]
    pub client_secret: Option<String>,

    /// OAuth token endpoint.
    #[arg(long, env = "GWX_TOKEN_URL", default_value = DEFAULT_TOKEN_URL, global = true)]
    pub token_url: String,

    /// OAuth device authorization endpoint.
    #[arg(
        long,
        env = "GWX_DEVICE_AUTH_URL",
        default_value = DEFAULT_DEVICE_AUTH_URL,
        global = true
    )]
    pub device_auth_url: String,

    /// Refresh the access token when it expires within this many seconds.
    #[arg(long, env = "GWX_REFRESH_MARGIN_SECS", default_value_t = 60, global = true)]
    pub refresh_margin_secs: u64,

    /// Log level filter (e.g. warn, debug, gwx_auth=trace).
    #[arg(long, env = "GWX_LOG_LEVEL", default_value = "warn", global = true)]
    pub log_level: String,

    /// Log format: text or json.
    #[arg(long, env = "GWX_LOG_FORMAT", default_value = "text", global = true)]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage stored OAuth credentials.
    #[command(subcommand)]
    Auth(AuthCommand),
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.log_format.as_str() {
            "text" | "json" => {}
            other => anyhow::bail!("invalid log format: {other} (expected text or json)"),
        }
        if self.lock_stale_ms == Some(0) {
            anyhow::bail!("--lock-stale-ms must be greater than zero");
        }
        if let Some(ref id) = self.client_id {
            if id.trim().is_empty() {
                anyhow::bail!("--client-id must not be empty");
            }
        }
        Ok(())
    }

    /// Explicit directory, else the per-user default.
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone().unwrap_or_else(gwx_auth::config::config_dir)
    }

    pub fn lock_config(&self) -> LockConfig {
        let mut lock = LockConfig::default();
        if let Some(ms) = self.lock_stale_ms {
            lock = lock.with_stale_after(Duration::from_millis(ms));
        }
        if let Some(ms) = self.lock_timeout_ms {
            lock = lock.with_timeout(Duration::from_millis(ms));
        }
        lock
    }

    pub fn token_store(&self) -> TokenStore {
        TokenStore::new(self.config_dir()).with_lock_config(self.lock_config())
    }

    pub fn granted_store(&self) -> GrantedStore {
        GrantedStore::new(self.config_dir())
    }

    pub fn refresh_margin(&self) -> Duration {
        Duration::from_secs(self.refresh_margin_secs)
    }

    /// OAuth settings, or `None` when no client ID is configured.
    pub fn oauth_config(&self) -> Option<OAuthConfig> {
        let client_id = self.client_id.as_deref().filter(|id| !id.trim().is_empty())?;
        Some(OAuthConfig {
            client_secret: self.client_secret.clone().filter(|s| !s.is_empty()),
            token_url: self.token_url.clone(),
            device_auth_url: self.device_auth_url.clone(),
            ..OAuthConfig::new(client_id)
        })
    }

    /// Build a `Config` rooted at `dir` for tests.
    #[doc(hidden)]
    pub fn test(dir: &Path) -> Self {
        Self {
            config_dir: Some(dir.to_path_buf()),
            lock_stale_ms: None,
            lock_timeout_ms: Some(2_000),
            client_id: None,
            client_secret: None,
            token_url: DEFAULT_TOKEN_URL.into(),
            device_auth_url: DEFAULT_DEVICE_AUTH_URL.into(),
            refresh_margin_secs: 60,
            log_level: "warn".into(),
            log_format: "text".into(),
            command: Command::Auth(AuthCommand::Services),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
