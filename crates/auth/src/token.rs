// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persisted OAuth2 token and the merge rule that protects its refresh
//! token.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::oauth::TokenResponse;

pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// OAuth2 credential as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry as epoch seconds. 0 when the provider gave none.
    #[serde(default)]
    pub expiry: u64,
}

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_owned()
}

impl Token {
    /// Build a token from a token endpoint response received at `now`
    /// (epoch seconds).
    pub fn from_response(resp: TokenResponse, now: u64) -> Self {
        let token_type = resp.token_type.filter(|t| !t.is_empty());
        Self {
            access_token: resp.access_token,
            token_type: token_type.unwrap_or_else(default_token_type),
            refresh_token: resp.refresh_token.filter(|t| !t.is_empty()),
            expiry: if resp.expires_in == 0 { 0 } else { now.saturating_add(resp.expires_in) },
        }
    }

    /// Non-empty refresh token, if any.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Whether the access token is expired, or will be within `margin`.
    /// Tokens without a known expiry never expire.
    pub fn is_expired_within(&self, margin: Duration, now: u64) -> bool {
        self.expiry != 0 && now.saturating_add(margin.as_secs()) >= self.expiry
    }

    /// `self`, falling back to `existing`'s refresh token when `self` has
    /// none.
    pub fn keep_refresh_from(mut self, existing: &Token) -> Token {
        if self.refresh_token().is_none() {
            self.refresh_token = existing.refresh_token().map(str::to_owned);
        }
        self
    }

    /// [`merge`] with a token known to be present.
    pub fn merged_over(self, existing: Option<&Token>) -> Token {
        match existing {
            Some(existing) => self.keep_refresh_from(existing),
            None => self,
        }
    }

    /// Seconds until expiry, `None` when unknown or already past.
    pub fn expires_in(&self, now: u64) -> Option<u64> {
        (self.expiry > now).then(|| self.expiry - now)
    }
}

/// Reconcile a freshly obtained token with the stored one.
///
/// Access token, type and expiry come from `incoming`. The refresh token
/// comes from `incoming` when it carries one and falls back to `existing`
/// otherwise: providers commonly omit it on refresh-grant responses, and
/// losing it forces a full re-consent.
pub fn merge(existing: Option<Token>, incoming: Option<Token>) -> Option<Token> {
    match incoming {
        Some(incoming) => Some(incoming.merged_over(existing.as_ref())),
        None => existing,
    }
}

/// Current time as epoch seconds.
pub fn now_epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
