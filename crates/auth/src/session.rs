// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token lifecycle glue: login completion and refresh-on-load.

use std::future::Future;
use std::time::Duration;

use tracing::info;

use crate::error::AuthError;
use crate::granted::GrantedStore;
use crate::oauth::OAuthClient;
use crate::store::TokenStore;
use crate::token::{now_epoch_secs, Token};

/// Source of fresh access tokens for a refresh token.
pub trait Refresher {
    fn refresh(&self, refresh_token: &str)
        -> impl Future<Output = Result<Token, AuthError>> + Send;
}

impl Refresher for OAuthClient {
    fn refresh(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<Token, AuthError>> + Send {
        OAuthClient::refresh(self, refresh_token)
    }
}

/// Load the stored token, refreshing and re-saving it first when it expires
/// within `margin`.
pub async fn ensure_fresh<R: Refresher>(
    store: &TokenStore,
    refresher: &R,
    margin: Duration,
) -> Result<Token, AuthError> {
    let current = store.load()?;
    if !current.is_expired_within(margin, now_epoch_secs()) {
        return Ok(current);
    }
    let Some(refresh_token) = current.refresh_token() else {
        return Err(AuthError::TokenExpired);
    };

    info!(expiry = current.expiry, "access token expiring, refreshing");
    let fresh = refresher.refresh(refresh_token).await?;

    let writer = store.clone();
    tokio::task::spawn_blocking(move || writer.save_merged(fresh))
        .await
        .map_err(|e| AuthError::io("token save task failed", store.path(), e.into()))?
}

/// Persist the result of a fresh OAuth exchange and the services it grants.
///
/// The new token is merged over whatever is stored so a provider that omits
/// the refresh token on re-consent does not erase the one we hold. An
/// unreadable token file is kept as `token.json.corrupt`.
pub fn complete_login<S: AsRef<str>>(
    store: &TokenStore,
    granted: &GrantedStore,
    fresh: Token,
    services: &[S],
) -> Result<Token, AuthError> {
    let token = store.save_merged(fresh)?;
    granted.save(services)?;
    info!(services = services.len(), "login complete");
    Ok(token)
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
