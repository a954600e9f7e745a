// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth2 token endpoint client: device authorization grant (RFC 8628) for
//! login and the refresh-token grant for silent renewal.

use std::sync::Once;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::AuthError;
use crate::scopes::ScopeSet;
use crate::token::{now_epoch_secs, Token};

pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_DEVICE_AUTH_URL: &str = "https://oauth2.googleapis.com/device/code";

const DEVICE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Standard OAuth2 token response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// RFC 8628 device authorization response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCodeResponse {
    pub device_code: String,
    pub user_code: String,
    #[serde(alias = "verification_url")]
    pub verification_uri: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
}

fn default_interval() -> u64 {
    5
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl ErrorBody {
    fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Client registration and endpoints.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub token_url: String,
    pub device_auth_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl OAuthConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            token_url: DEFAULT_TOKEN_URL.to_owned(),
            device_auth_url: DEFAULT_DEVICE_AUTH_URL.to_owned(),
            timeout: Duration::from_secs(30),
        }
    }
}

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls. Only the first call
/// has effect.
pub fn install_crypto_provider() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    config: OAuthConfig,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig) -> Result<Self, AuthError> {
        install_crypto_provider();
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AuthError::oauth(format!("failed to build http client: {e}")))?;
        Ok(Self { http, config })
    }

    /// Start a device authorization for `scopes`.
    pub async fn start_device_auth(
        &self,
        scopes: &ScopeSet,
    ) -> Result<DeviceCodeResponse, AuthError> {
        let scope = scopes.to_param();
        let mut form =
            vec![("client_id", self.config.client_id.as_str()), ("scope", scope.as_str())];
        if let Some(ref secret) = self.config.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let resp = self.post(&self.config.device_auth_url, &form).await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AuthError::oauth(format!(
                "device authorization failed ({status}): {text}"
            )));
        }
        resp.json()
            .await
            .map_err(|e| AuthError::oauth(format!("invalid device authorization response: {e}")))
    }

    /// Poll the token endpoint until the user completes authorization or the
    /// device code expires.
    pub async fn poll_device_token(
        &self,
        device: &DeviceCodeResponse,
    ) -> Result<Token, AuthError> {
        let mut poll_interval = Duration::from_secs(device.interval.max(1));
        let started = tokio::time::Instant::now();
        let lifetime = Duration::from_secs(device.expires_in);

        let mut form = vec![
            ("grant_type", DEVICE_GRANT_TYPE),
            ("client_id", self.config.client_id.as_str()),
            ("device_code", device.device_code.as_str()),
        ];
        if let Some(ref secret) = self.config.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        loop {
            tokio::time::sleep(poll_interval).await;

            if started.elapsed() >= lifetime {
                return Err(AuthError::oauth("device code expired before authorization completed"));
            }

            let resp = self.post(&self.config.token_url, &form).await?;
            if resp.status().is_success() {
                let token = self.read_token(resp).await?;
                info!("device authorization completed");
                return Ok(token);
            }

            let text = resp.text().await.unwrap_or_default();
            let code = ErrorBody::parse(&text).map(|b| b.error).unwrap_or_default();
            match code.as_str() {
                "authorization_pending" => continue,
                "slow_down" => {
                    poll_interval = poll_interval.saturating_add(Duration::from_secs(5));
                    debug!(interval_secs = poll_interval.as_secs(), "provider asked to slow down");
                    continue;
                }
                _ => {
                    return Err(AuthError::oauth(format!("device token request failed: {text}")));
                }
            }
        }
    }

    /// Exchange a refresh token for a fresh access token.
    ///
    /// The returned token's `refresh_token` is `None` when the provider did
    /// not rotate it; merge with the stored token before saving.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Token, AuthError> {
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("refresh_token", refresh_token),
        ];
        if let Some(ref secret) = self.config.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let resp = self.post(&self.config.token_url, &form).await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let detail = match ErrorBody::parse(&text) {
                Some(ErrorBody { error, error_description: Some(desc) }) => {
                    format!("{error}: {desc}")
                }
                Some(ErrorBody { error, .. }) => error,
                None => text,
            };
            return Err(AuthError::oauth(format!("refresh failed ({status}): {detail}")));
        }
        self.read_token(resp).await
    }

    async fn post(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<reqwest::Response, AuthError> {
        self.http
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| AuthError::oauth(format!("request to {url} failed: {e}")))
    }

    async fn read_token(&self, resp: reqwest::Response) -> Result<Token, AuthError> {
        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::oauth(format!("invalid token response: {e}")))?;
        Ok(Token::from_response(body, now_epoch_secs()))
    }
}

#[cfg(test)]
#[path = "oauth_tests.rs"]
mod tests;
