// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI subcommands: `auth`.

pub mod auth;

use std::io::Write;

use gwx_auth::AuthError;

use crate::config::{Command, Config};

/// Run the parsed subcommand and return the process exit code.
pub async fn run(config: &Config, out: &mut impl Write) -> anyhow::Result<i32> {
    match &config.command {
        Command::Auth(cmd) => auth::run(config, cmd, out).await,
    }
}

/// Exit code for a failed command: the credential error's own code when
/// there is one, 1 otherwise.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<AuthError>().map_or(1, AuthError::exit_code)
}
