// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-process file lock: an exclusive marker file next to the guarded path.
//!
//! The marker (`<path>.lock`) names its owner as `<node>:<pid>`, where the
//! node is the host name plus, on Linux, the PID namespace. Acquisition is
//! `O_CREAT | O_EXCL`; waiters poll with jittered exponential backoff until
//! [`LockConfig::timeout`] elapses. A marker older than
//! [`LockConfig::stale_after`] belongs to a crashed holder and is removed by
//! the next waiter. A younger marker is only reclaimed early when it names a
//! process on this node that no longer exists; owners elsewhere cannot be
//! checked and are judged by age alone.
//!
//! Stale reclamation gives up strict exclusion in the crash case so that a
//! killed process can never wedge every later invocation.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use rand::Rng;
use tracing::{debug, warn};

use crate::error::AuthError;
use crate::persist::unique_sibling;

/// Suffix appended to the guarded path to form the marker path.
pub const LOCK_SUFFIX: &str = ".lock";

const ASIDE_SUFFIX: &str = ".stale";

/// Timing knobs for [`acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockConfig {
    /// Markers older than this are treated as abandoned.
    pub stale_after: Duration,
    /// Total time to wait for a live holder before failing.
    pub timeout: Duration,
    /// First backoff between attempts.
    pub initial_backoff: Duration,
    /// Backoff ceiling.
    pub max_backoff: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(10),
            timeout: Duration::from_secs(15),
            initial_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(250),
        }
    }
}

impl LockConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }
}

/// Marker path guarding `path`.
pub fn lock_path(path: &Path) -> PathBuf {
    let mut marker = path.as_os_str().to_owned();
    marker.push(LOCK_SUFFIX);
    PathBuf::from(marker)
}

/// Marker text naming `pid` on this node.
pub fn marker_contents(pid: u32) -> String {
    format!("{}\n", Owner { node: node_id().to_owned(), pid })
}

/// Held lock. Dropping the guard releases it.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    marker: PathBuf,
    owner: Owner,
    released: bool,
}

impl LockGuard {
    /// Marker file backing this lock.
    pub fn path(&self) -> &Path {
        &self.marker
    }

    /// Release the lock, reporting failures that `Drop` can only log.
    pub fn release(mut self) -> Result<(), AuthError> {
        self.released = true;
        remove_owned(&self.marker, &self.owner)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = remove_owned(&self.marker, &self.owner) {
            warn!(lock = %self.marker.display(), err = %e, "failed to release lock");
        }
    }
}

/// Acquire the lock guarding `path`, blocking up to `config.timeout`.
///
/// On timeout the existing marker is left untouched.
pub fn acquire(path: &Path, config: &LockConfig) -> Result<LockGuard, AuthError> {
    let marker = lock_path(path);
    let owner = Owner::current();
    let contents = format!("{owner}\n");
    let started = Instant::now();
    let deadline = started + config.timeout;
    let mut backoff = config.initial_backoff;

    loop {
        match create_marker(&marker, &contents) {
            Ok(()) => {
                debug!(lock = %marker.display(), pid = owner.pid, "lock acquired");
                return Ok(LockGuard { marker, owner, released: false });
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(AuthError::io("failed to create lock", marker, e)),
        }

        match inspect(&marker, config.stale_after) {
            Holder::Gone => continue,
            Holder::Stale { reason, seen } => {
                warn!(lock = %marker.display(), reason, "reclaiming stale lock");
                match reclaim(&marker, &seen) {
                    Ok(()) => continue,
                    // Best effort: fall through to the normal wait.
                    Err(e) => {
                        warn!(lock = %marker.display(), err = %e, "stale lock cleanup failed");
                    }
                }
            }
            Holder::Live => {}
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(AuthError::LockTimeout { path: marker, waited: now - started });
        }
        let wait = jitter(backoff).min(deadline - now);
        debug!(lock = %marker.display(), wait_ms = wait.as_millis() as u64, "lock busy, waiting");
        thread::sleep(wait);
        backoff = (backoff * 2).min(config.max_backoff);
    }
}

fn create_marker(marker: &Path, contents: &str) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(marker)?;
    if let Err(e) = file.write_all(contents.as_bytes()) {
        let _ = fs::remove_file(marker);
        return Err(e);
    }
    Ok(())
}

/// Lock owner as recorded in the marker.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Owner {
    node: String,
    pid: u32,
}

impl Owner {
    fn current() -> Self {
        Self { node: node_id().to_owned(), pid: std::process::id() }
    }

    fn parse(content: &str) -> Option<Self> {
        let (node, pid) = content.trim().rsplit_once(':')?;
        let pid = pid.parse().ok().filter(|pid| *pid != 0)?;
        if node.is_empty() {
            return None;
        }
        Some(Self { node: node.to_owned(), pid })
    }

    fn is_local(&self) -> bool {
        self.node == node_id()
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.pid)
    }
}

/// Host name, qualified on Linux by the PID namespace: PIDs are only
/// comparable between processes that share both.
fn node_id() -> &'static str {
    static NODE: OnceLock<String> = OnceLock::new();
    NODE.get_or_init(|| {
        let host = host_name().unwrap_or_else(|| "localhost".to_owned());
        match fs::read_link("/proc/self/ns/pid") {
            Ok(ns) => format!("{host}/{}", ns.display()),
            Err(_) => host,
        }
    })
}

#[cfg(unix)]
fn host_name() -> Option<String> {
    nix::unistd::gethostname().ok()?.into_string().ok().filter(|h| !h.is_empty())
}

#[cfg(not(unix))]
fn host_name() -> Option<String> {
    std::env::var("COMPUTERNAME").ok().filter(|h| !h.is_empty())
}

/// Marker content and mtime, as judged by a waiter.
#[derive(Debug, PartialEq, Eq)]
struct Snapshot {
    content: String,
    modified: SystemTime,
}

impl Snapshot {
    fn read(marker: &Path) -> io::Result<Self> {
        let modified = fs::metadata(marker)?.modified()?;
        let content = fs::read_to_string(marker)?;
        Ok(Self { content, modified })
    }
}

enum Holder {
    /// Marker vanished between the create attempt and inspection.
    Gone,
    Stale { reason: &'static str, seen: Snapshot },
    Live,
}

fn inspect(marker: &Path, stale_after: Duration) -> Holder {
    let seen = match Snapshot::read(marker) {
        Ok(seen) => seen,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Holder::Gone,
        Err(_) => return Holder::Live,
    };
    let age = SystemTime::now().duration_since(seen.modified).unwrap_or(Duration::ZERO);
    if age > stale_after {
        return Holder::Stale { reason: "expired", seen };
    }

    // Unparseable markers are still being written, and owners on another
    // node cannot be checked: both are judged by age only.
    match Owner::parse(&seen.content) {
        Some(owner) if owner.is_local() && !process_alive(owner.pid) => {
            Holder::Stale { reason: "holder exited", seen }
        }
        _ => Holder::Live,
    }
}

/// Remove the marker judged stale as `seen`.
///
/// The marker is renamed aside first so the check and the unlink act on the
/// same file. If another waiter already replaced it with a fresh marker, that
/// marker is linked back into place.
fn reclaim(marker: &Path, seen: &Snapshot) -> io::Result<()> {
    let aside = unique_sibling(marker, ASIDE_SUFFIX);
    match fs::rename(marker, &aside) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    }

    let taken = Snapshot::read(&aside);
    if taken.as_ref().is_ok_and(|taken| taken == seen) {
        return fs::remove_file(&aside);
    }

    let restored = fs::hard_link(&aside, marker);
    let _ = fs::remove_file(&aside);
    match restored {
        Ok(()) => debug!(lock = %marker.display(), "lock changed hands before reclaim, restored"),
        Err(e) => warn!(lock = %marker.display(), err = %e, "could not restore replaced lock"),
    }
    Ok(())
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    if pid == std::process::id() {
        return true;
    }
    let Ok(raw) = i32::try_from(pid) else {
        return true;
    };
    // EPERM means the process exists under another user.
    !matches!(kill(Pid::from_raw(raw), None), Err(Errno::ESRCH))
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}

fn jitter(backoff: Duration) -> Duration {
    let ms = backoff.as_millis() as u64;
    if ms == 0 {
        return backoff;
    }
    Duration::from_millis(ms + rand::rng().random_range(0..=ms / 2))
}

/// Remove `marker` only if it still names `owner`.
fn remove_owned(marker: &Path, owner: &Owner) -> Result<(), AuthError> {
    match fs::read_to_string(marker) {
        Ok(content) if Owner::parse(&content).as_ref() == Some(owner) => {}
        Ok(_) => {
            warn!(lock = %marker.display(), "lock was reclaimed by another process, leaving it");
            return Ok(());
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(AuthError::io("failed to read lock", marker, e)),
    }
    match fs::remove_file(marker) {
        Ok(()) => {
            debug!(lock = %marker.display(), "lock released");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AuthError::io("failed to remove lock", marker, e)),
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
