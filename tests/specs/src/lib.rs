// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary tests.
//!
//! Spawns the real `gwx` binary against an isolated configuration directory
//! so several processes can contend for the same token file.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use gwx_auth::config::{GRANTED_FILE, TOKEN_FILE};
use gwx_auth::Token;

/// Resolve the path to the compiled `gwx` binary.
///
/// `GWX_BIN` wins; otherwise the debug build under the workspace target dir.
pub fn gwx_binary() -> PathBuf {
    if let Some(bin) = std::env::var_os("GWX_BIN") {
        return PathBuf::from(bin);
    }
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    let target = std::env::var_os("CARGO_TARGET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| workspace.join("target"));
    target.join("debug").join("gwx")
}

/// An isolated configuration directory plus the environment to run `gwx`
/// against it.
pub struct GwxHome {
    dir: tempfile::TempDir,
    env: Vec<(String, String)>,
}

impl GwxHome {
    pub fn new() -> anyhow::Result<Self> {
        let binary = gwx_binary();
        anyhow::ensure!(
            binary.exists(),
            "gwx binary not found at {} (build it with `cargo build -p gwx`)",
            binary.display()
        );
        Ok(Self { dir: tempfile::tempdir()?, env: Vec::new() })
    }

    /// Add an environment variable to every invocation.
    pub fn with_env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.push((key.to_owned(), value.into()));
        self
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn token_path(&self) -> PathBuf {
        self.dir.path().join(TOKEN_FILE)
    }

    pub fn granted_path(&self) -> PathBuf {
        self.dir.path().join(GRANTED_FILE)
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(gwx_binary());
        cmd.args(args)
            .env_remove("GWX_CLIENT_ID")
            .env_remove("GWX_CLIENT_SECRET")
            .env_remove("GWX_ACCESS_TOKEN")
            .env_remove("GWX_REFRESH_TOKEN")
            .env("GWX_CONFIG_DIR", self.dir.path())
            .env("GWX_LOG_LEVEL", "warn");
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }

    /// Run `gwx` to completion.
    pub fn run(&self, args: &[&str]) -> anyhow::Result<GwxOutput> {
        let output = self.command(args).stdin(Stdio::null()).output()?;
        Ok(GwxOutput::from(output))
    }

    /// Start `gwx` without waiting for it.
    pub fn spawn(&self, args: &[&str]) -> anyhow::Result<Child> {
        Ok(self
            .command(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?)
    }

    /// Parse the token file directly.
    pub fn read_token(&self) -> anyhow::Result<Token> {
        let text = std::fs::read_to_string(self.token_path())?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Sorted names of everything in the configuration directory.
    pub fn entries(&self) -> anyhow::Result<Vec<String>> {
        let mut names: Vec<String> = std::fs::read_dir(self.dir.path())?
            .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<Result<_, _>>()?;
        names.sort();
        Ok(names)
    }
}

/// Captured result of one `gwx` invocation.
#[derive(Debug)]
pub struct GwxOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl From<Output> for GwxOutput {
    fn from(output: Output) -> Self {
        Self {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

impl GwxOutput {
    /// Fail with both streams attached unless the exit code is `code`.
    pub fn expect_code(self, code: i32) -> anyhow::Result<Self> {
        anyhow::ensure!(
            self.code == code,
            "expected exit {code}, got {}\nstdout: {}\nstderr: {}",
            self.code,
            self.stdout,
            self.stderr
        );
        Ok(self)
    }
}

/// Token endpoint answering every refresh with the same body. Counts calls.
pub struct MockTokenServer {
    addr: SocketAddr,
    calls: Arc<AtomicU32>,
}

impl MockTokenServer {
    pub async fn start(body: serde_json::Value) -> anyhow::Result<Self> {
        let calls = Arc::new(AtomicU32::new(0));
        let body = Arc::new(body.to_string());
        let app = {
            let calls = Arc::clone(&calls);
            Router::new().route(
                "/token",
                post(move || {
                    let calls = Arc::clone(&calls);
                    let body = Arc::clone(&body);
                    async move {
                        calls.fetch_add(1, Ordering::Relaxed);
                        (StatusCode::OK, [("content-type", "application/json")], (*body).clone())
                    }
                }),
            )
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        Ok(Self { addr, calls })
    }

    pub fn token_url(&self) -> String {
        format!("http://{}/token", self.addr)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }
}
