// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `gwx auth` subcommands.

use std::future::Future;
use std::io::Write;
use std::time::Duration;

use clap::{Args, Subcommand};
use gwx_auth::oauth::OAuthClient;
use gwx_auth::scopes::{self, BASELINE_SCOPE, BASELINE_SERVICE, SERVICES};
use gwx_auth::session::{self, Refresher};
use gwx_auth::token::{now_epoch_secs, DEFAULT_TOKEN_TYPE};
use gwx_auth::{granted, AuthError, Token};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Authorize through the device flow and store the token
    Login(LoginArgs),
    /// Store an access token obtained elsewhere
    Import(ImportArgs),
    /// Delete the stored token
    Logout(LogoutArgs),
    /// Show the stored credential state
    Status(StatusArgs),
    /// Print a valid access token, refreshing it first if needed
    Token,
    /// Print the scopes a set of services resolves to
    Scopes(ScopesArgs),
    /// List registered services and their scopes
    Services,
    /// Print unknown service names; exits 2 if there are any
    Check(CheckArgs),
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Services to authorize (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub services: Vec<String>,

    /// Authorize exactly these services instead of adding to those already granted
    #[arg(long)]
    pub replace: bool,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    #[arg(long, env = "GWX_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,

    #[arg(long, env = "GWX_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<String>,

    /// Seconds until the access token expires (omit when unknown)
    #[arg(long)]
    pub expires_in: Option<u64>,

    #[arg(long, default_value = DEFAULT_TOKEN_TYPE)]
    pub token_type: String,

    /// Services the token was granted for (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub services: Vec<String>,
}

#[derive(Debug, Args)]
pub struct LogoutArgs {
    /// Also forget which services were granted
    #[arg(long)]
    pub forget_services: bool,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ScopesArgs {
    /// Services to resolve (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub services: Vec<String>,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    #[arg(required = true, value_delimiter = ',')]
    pub names: Vec<String>,
}

pub async fn run(
    config: &Config,
    cmd: &AuthCommand,
    out: &mut impl Write,
) -> anyhow::Result<i32> {
    match cmd {
        AuthCommand::Login(args) => login(config, args, out).await,
        AuthCommand::Import(args) => import(config, args, out),
        AuthCommand::Logout(args) => logout(config, args, out),
        AuthCommand::Status(args) => status(config, args, out),
        AuthCommand::Token => token(config, out).await,
        AuthCommand::Scopes(args) => print_scopes(args, out),
        AuthCommand::Services => print_services(out),
        AuthCommand::Check(args) => check(args, out),
    }
}

fn reject_unknown(names: &[String]) -> anyhow::Result<()> {
    let unknown = scopes::validate_services(names);
    if !unknown.is_empty() {
        anyhow::bail!("unknown services: {} (see `gwx auth services`)", unknown.join(", "));
    }
    Ok(())
}

/// Requested services, added to those already granted unless `replace`.
fn services_to_grant(
    config: &Config,
    requested: &[String],
    replace: bool,
) -> anyhow::Result<Vec<String>> {
    if replace {
        return Ok(granted::union(&[], requested));
    }
    let previous = config.granted_store().load()?.unwrap_or_default();
    Ok(granted::union(&previous, requested))
}

fn describe_services(services: &[String]) -> String {
    if services.is_empty() {
        "(none)".to_owned()
    } else {
        services.join(", ")
    }
}

async fn login(config: &Config, args: &LoginArgs, out: &mut impl Write) -> anyhow::Result<i32> {
    reject_unknown(&args.services)?;
    let Some(oauth) = config.oauth_config() else {
        anyhow::bail!("login needs an OAuth client ID (--client-id or GWX_CLIENT_ID)");
    };
    let services = services_to_grant(config, &args.services, args.replace)?;
    let scopes = scopes::scopes_for_services(&services);

    let client = OAuthClient::new(oauth)?;
    let device = client.start_device_auth(&scopes).await?;
    eprintln!(
        "To authorize gwx, open {} and enter code {}",
        device.verification_uri, device.user_code
    );
    eprintln!("Waiting for authorization... (press Ctrl+C to cancel)");
    let fresh = client.poll_device_token(&device).await?;

    let store = config.token_store();
    let granted = config.granted_store();
    let saved = services.clone();
    tokio::task::spawn_blocking(move || {
        session::complete_login(&store, &granted, fresh, &saved)
    })
    .await??;

    writeln!(out, "logged in; services: {}", describe_services(&services))?;
    Ok(0)
}

fn import(config: &Config, args: &ImportArgs, out: &mut impl Write) -> anyhow::Result<i32> {
    if args.access_token.trim().is_empty() {
        anyhow::bail!("--access-token must not be empty");
    }
    reject_unknown(&args.services)?;
    let services = services_to_grant(config, &args.services, false)?;

    let token = Token {
        access_token: args.access_token.clone(),
        token_type: args.token_type.clone(),
        refresh_token: args.refresh_token.clone().filter(|r| !r.is_empty()),
        expiry: args.expires_in.map_or(0, |secs| now_epoch_secs().saturating_add(secs)),
    };
    session::complete_login(&config.token_store(), &config.granted_store(), token, &services)?;

    writeln!(out, "token saved; services: {}", describe_services(&services))?;
    Ok(0)
}

fn logout(config: &Config, args: &LogoutArgs, out: &mut impl Write) -> anyhow::Result<i32> {
    let store = config.token_store();
    let had_token = store.exists();
    store.delete()?;
    if args.forget_services {
        config.granted_store().clear()?;
    }
    info!(had_token, forget_services = args.forget_services, "logged out");

    writeln!(out, "{}", if had_token { "logged out" } else { "not logged in" })?;
    Ok(0)
}

#[derive(Debug, Serialize)]
struct StatusReport {
    config_dir: String,
    authenticated: bool,
    token_type: Option<String>,
    expiry: Option<u64>,
    expires_in: Option<u64>,
    expired: bool,
    refresh_token: bool,
    services: Option<Vec<String>>,
}

impl StatusReport {
    fn gather(config: &Config) -> anyhow::Result<Self> {
        let store = config.token_store();
        let services = config.granted_store().load()?;
        let mut report = Self {
            config_dir: config.config_dir().display().to_string(),
            authenticated: false,
            token_type: None,
            expiry: None,
            expires_in: None,
            expired: false,
            refresh_token: false,
            services,
        };
        if !store.exists() {
            return Ok(report);
        }

        let token = store.load()?;
        let now = now_epoch_secs();
        report.authenticated = true;
        report.token_type = Some(token.token_type.clone());
        report.expiry = (token.expiry > 0).then_some(token.expiry);
        report.expires_in = token.expires_in(now);
        report.expired = token.is_expired_within(Duration::ZERO, now);
        report.refresh_token = token.refresh_token().is_some();
        Ok(report)
    }

    fn expiry_text(&self) -> String {
        match (self.expiry, self.expires_in) {
            (None, _) => "unknown".to_owned(),
            (Some(_), _) if self.expired => "expired".to_owned(),
            (Some(at), Some(secs)) => format!("in {}m {:02}s (at {at})", secs / 60, secs % 60),
            (Some(at), None) => format!("at {at}"),
        }
    }
}

fn status(config: &Config, args: &StatusArgs, out: &mut impl Write) -> anyhow::Result<i32> {
    let report = StatusReport::gather(config)?;
    if args.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        return Ok(0);
    }

    writeln!(out, "config dir:    {}", report.config_dir)?;
    if report.authenticated {
        writeln!(out, "token:         present")?;
        writeln!(out, "expires:       {}", report.expiry_text())?;
        writeln!(out, "refresh token: {}", if report.refresh_token { "yes" } else { "no" })?;
    } else {
        writeln!(out, "token:         not logged in")?;
    }
    let services = report.services.as_deref().unwrap_or_default();
    writeln!(out, "services:      {}", describe_services(services))?;
    Ok(0)
}

/// Refreshes through the configured OAuth client.
struct ConfiguredRefresher(Option<OAuthClient>);

impl Refresher for ConfiguredRefresher {
    fn refresh(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<Token, AuthError>> + Send {
        async move {
            match self.0 {
                Some(ref client) => client.refresh(refresh_token).await,
                None => Err(AuthError::OAuth {
                    message: "access token needs a refresh but no client ID is configured \
                              (--client-id or GWX_CLIENT_ID)"
                        .to_owned(),
                }),
            }
        }
    }
}

async fn token(config: &Config, out: &mut impl Write) -> anyhow::Result<i32> {
    let client = config.oauth_config().map(OAuthClient::new).transpose()?;
    let refresher = ConfiguredRefresher(client);
    let token =
        session::ensure_fresh(&config.token_store(), &refresher, config.refresh_margin()).await?;
    writeln!(out, "{}", token.access_token)?;
    Ok(0)
}

fn print_scopes(args: &ScopesArgs, out: &mut impl Write) -> anyhow::Result<i32> {
    for name in scopes::validate_services(&args.services) {
        warn!(service = %name, "ignoring unknown service");
    }
    for scope in scopes::scopes_for_services(&args.services).iter() {
        writeln!(out, "{scope}")?;
    }
    Ok(0)
}

fn print_services(out: &mut impl Write) -> anyhow::Result<i32> {
    let name_w = SERVICES.iter().map(|s| s.name.len()).max().unwrap_or(0).max(8);
    writeln!(out, "{BASELINE_SERVICE:<name_w$}  Account identity (always included)")?;
    writeln!(out, "    {BASELINE_SCOPE}")?;
    for service in SERVICES {
        writeln!(out, "{:<name_w$}  {}", service.name, service.description)?;
        for scope in service.scopes {
            writeln!(out, "    {scope}")?;
        }
    }
    Ok(0)
}

fn check(args: &CheckArgs, out: &mut impl Write) -> anyhow::Result<i32> {
    let unknown = scopes::validate_services(&args.names);
    for name in &unknown {
        writeln!(out, "{name}")?;
    }
    Ok(if unknown.is_empty() { 0 } else { 2 })
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
