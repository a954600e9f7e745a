// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end tests that spawn the real `gwx` binary against a throwaway
//! configuration directory.

use std::fs;
use std::time::{Duration, SystemTime};

use gwx_auth::config::{GRANTED_FILE, TOKEN_FILE};
use gwx_auth::lock::{lock_path, marker_contents};
use gwx_specs::{GwxHome, MockTokenServer};

// -- Registry -----------------------------------------------------------------

#[test]
fn check_exits_2_and_lists_unknown_names() -> anyhow::Result<()> {
    let home = GwxHome::new()?;
    let out = home.run(&["auth", "check", "gmail", "gmial", "docs", "sheet"])?.expect_code(2)?;
    assert_eq!(out.stdout, "gmial\nsheet\n");

    let out = home.run(&["auth", "check", "gmail,docs"])?.expect_code(0)?;
    assert!(out.stdout.is_empty());
    Ok(())
}

#[test]
fn scopes_always_start_with_identity() -> anyhow::Result<()> {
    let home = GwxHome::new()?;
    let out = home.run(&["auth", "scopes", "--services", "docs,sheets"])?.expect_code(0)?;
    let lines: Vec<&str> = out.stdout.lines().collect();
    assert_eq!(lines.first().copied(), Some(gwx_auth::scopes::BASELINE_SCOPE));
    assert_eq!(lines.len(), 4, "{}", out.stdout);
    Ok(())
}

// -- Lifecycle ----------------------------------------------------------------

#[test]
fn import_status_token_logout() -> anyhow::Result<()> {
    let home = GwxHome::new()?;
    home.run(&[
        "auth",
        "import",
        "--access-token",
        "access-1",
        "--refresh-token",
        "refresh-1",
        "--expires-in",
        "3600",
        "--services",
        "gmail,drive",
    ])?
    .expect_code(0)?;
    assert_eq!(home.entries()?, vec![GRANTED_FILE.to_owned(), TOKEN_FILE.to_owned()]);

    let out = home.run(&["auth", "status", "--json"])?.expect_code(0)?;
    let status: serde_json::Value = serde_json::from_str(&out.stdout)?;
    assert_eq!(status["authenticated"], true);
    assert_eq!(status["refresh_token"], true);
    assert_eq!(status["services"], serde_json::json!(["gmail", "drive"]));

    let out = home.run(&["auth", "token"])?.expect_code(0)?;
    assert_eq!(out.stdout, "access-1\n");

    home.run(&["auth", "logout"])?.expect_code(0)?;
    home.run(&["auth", "logout"])?.expect_code(0)?;
    assert!(!home.token_path().exists());
    assert!(home.granted_path().exists());

    let out = home.run(&["auth", "token"])?.expect_code(4)?;
    assert!(out.stderr.contains("gwx auth login"), "{}", out.stderr);
    Ok(())
}

#[test]
fn corrupt_token_is_reported_and_kept() -> anyhow::Result<()> {
    let home = GwxHome::new()?;
    fs::write(home.token_path(), "{\"access_token\": \"trunc")?;

    let out = home.run(&["auth", "status"])?.expect_code(65)?;
    assert!(out.stderr.contains("corrupt"), "{}", out.stderr);
    assert_eq!(fs::read_to_string(home.token_path())?, "{\"access_token\": \"trunc");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn token_refreshes_through_the_token_endpoint() -> anyhow::Result<()> {
    let server = MockTokenServer::start(serde_json::json!({
        "access_token": "refreshed",
        "expires_in": 3600,
        "token_type": "Bearer",
    }))
    .await?;
    let home = GwxHome::new()?
        .with_env("GWX_CLIENT_ID", "test-client")
        .with_env("GWX_TOKEN_URL", server.token_url());
    home.run(&[
        "auth",
        "import",
        "--access-token",
        "stale",
        "--refresh-token",
        "refresh-0",
        "--expires-in",
        "5",
    ])?
    .expect_code(0)?;

    let home = std::sync::Arc::new(home);
    let runner = std::sync::Arc::clone(&home);
    let out = tokio::task::spawn_blocking(move || runner.run(&["auth", "token"])).await??;
    let out = out.expect_code(0)?;
    assert_eq!(out.stdout, "refreshed\n");
    assert_eq!(server.calls(), 1);

    let token = home.read_token()?;
    assert_eq!(token.access_token, "refreshed");
    assert_eq!(token.refresh_token.as_deref(), Some("refresh-0"));

    let runner = std::sync::Arc::clone(&home);
    let out = tokio::task::spawn_blocking(move || runner.run(&["auth", "token"])).await??;
    assert_eq!(out.expect_code(0)?.stdout, "refreshed\n");
    assert_eq!(server.calls(), 1);
    Ok(())
}

// -- Lock contention ----------------------------------------------------------

fn write_marker(home: &GwxHome, pid: u32) -> anyhow::Result<std::path::PathBuf> {
    let marker = lock_path(&home.token_path());
    fs::write(&marker, marker_contents(pid))?;
    Ok(marker)
}

#[test]
fn live_lock_holder_makes_writers_time_out() -> anyhow::Result<()> {
    let home = GwxHome::new()?;
    home.run(&["auth", "import", "--access-token", "original"])?.expect_code(0)?;
    let marker = write_marker(&home, std::process::id())?;

    let out = home.run(&["auth", "logout", "--lock-timeout-ms", "300"])?.expect_code(75)?;
    assert!(out.stderr.contains("lock"), "{}", out.stderr);
    home.run(&["auth", "import", "--access-token", "intruder", "--lock-timeout-ms", "300"])?
        .expect_code(75)?;

    assert_eq!(fs::read_to_string(&marker)?, marker_contents(std::process::id()));
    assert_eq!(home.read_token()?.access_token, "original");
    Ok(())
}

#[test]
fn old_marker_is_reclaimed() -> anyhow::Result<()> {
    let home = GwxHome::new()?;
    let marker = write_marker(&home, std::process::id())?;
    let an_hour_ago = SystemTime::now() - Duration::from_secs(3600);
    fs::File::options().write(true).open(&marker)?.set_modified(an_hour_ago)?;

    home.run(&["auth", "import", "--access-token", "after-crash", "--lock-stale-ms", "1000"])?
        .expect_code(0)?;
    assert_eq!(home.read_token()?.access_token, "after-crash");
    assert!(!marker.exists());
    Ok(())
}

#[cfg(unix)]
#[test]
fn marker_of_dead_process_is_reclaimed() -> anyhow::Result<()> {
    let home = GwxHome::new()?;
    let mut child = std::process::Command::new("true").spawn()?;
    let dead_pid = child.id();
    child.wait()?;
    let marker = write_marker(&home, dead_pid)?;

    home.run(&["auth", "import", "--access-token", "after-crash", "--lock-timeout-ms", "5000"])?
        .expect_code(0)?;
    assert_eq!(home.read_token()?.access_token, "after-crash");
    assert!(!marker.exists());
    Ok(())
}

#[test]
fn concurrent_imports_never_expose_partial_files() -> anyhow::Result<()> {
    let home = GwxHome::new()?;
    home.run(&["auth", "import", "--access-token", "seed", "--services", "gmail"])?
        .expect_code(0)?;

    let mut children = Vec::new();
    for i in 0..8 {
        let access = format!("writer-{i}");
        let refresh = format!("refresh-{i}");
        children.push(home.spawn(&[
            "auth",
            "import",
            "--access-token",
            &access,
            "--refresh-token",
            &refresh,
            "--services",
            "gmail",
            "--lock-timeout-ms",
            "20000",
        ])?);
    }

    let mut reads = 0;
    loop {
        let token = home.read_token()?;
        assert!(
            token.access_token == "seed" || token.access_token.starts_with("writer-"),
            "unexpected token {token:?}"
        );
        reads += 1;

        let mut running = false;
        for child in &mut children {
            running |= child.try_wait()?.is_none();
        }
        if !running {
            break;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    assert!(reads > 0);

    for child in children {
        let out = gwx_specs::GwxOutput::from(child.wait_with_output()?);
        out.expect_code(0)?;
    }

    let token = home.read_token()?;
    let writer = token.access_token.trim_start_matches("writer-");
    assert_eq!(token.refresh_token, Some(format!("refresh-{writer}")));
    assert_eq!(home.entries()?, vec![GRANTED_FILE.to_owned(), TOKEN_FILE.to_owned()]);
    Ok(())
}
