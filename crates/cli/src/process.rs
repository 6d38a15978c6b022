// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Managing the aqd process: spawning, stopping, PID and log inspection

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use aq_daemon::{Config, STARTUP_ERROR_PREFIX, STARTUP_MARKER_PREFIX};

/// Client-side time limits, overridable through `AQ_*_MS` variables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// One request/response exchange
    pub ipc: Duration,
    /// A freshly spawned daemon creating its socket
    pub connect: Duration,
    /// A stopping daemon leaving the process table
    pub exit: Duration,
    pub poll: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            ipc: Duration::from_secs(5),
            connect: Duration::from_secs(5),
            exit: Duration::from_secs(2),
            poll: Duration::from_millis(50),
        }
    }
}

impl Timeouts {
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let ms = |var: &str, default: Duration| {
            lookup(var)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map_or(default, Duration::from_millis)
        };
        Self {
            ipc: ms("AQ_TIMEOUT_IPC_MS", defaults.ipc),
            connect: ms("AQ_TIMEOUT_CONNECT_MS", defaults.connect),
            exit: ms("AQ_TIMEOUT_EXIT_MS", defaults.exit),
            poll: ms("AQ_POLL_INTERVAL_MS", defaults.poll),
        }
    }
}

/// Spawn aqd detached from our stdio; `settings` becomes its first argument
pub fn spawn_daemon(settings: Option<&Path>) -> std::io::Result<Child> {
    let binary = daemon_binary();
    Command::new(&binary)
        .args(settings)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| std::io::Error::new(e.kind(), format!("{}: {e}", binary.display())))
}

/// `AQ_DAEMON_BINARY`, else an `aqd` next to this executable, else `PATH`
fn daemon_binary() -> PathBuf {
    if let Some(path) = std::env::var_os("AQ_DAEMON_BINARY") {
        return PathBuf::from(path);
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("aqd")))
        .filter(|sibling| sibling.exists())
        .unwrap_or_else(|| PathBuf::from("aqd"))
}

/// PID recorded in the lock file, if readable
pub fn read_daemon_pid(config: &Config) -> Option<u32> {
    std::fs::read_to_string(&config.lock_path)
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Remove the PID file unless the process it names is alive.
///
/// A live daemon still holds its lock, so only dead PIDs are removed.
pub fn cleanup_stale_pid(config: &Config) {
    if read_daemon_pid(config).is_some_and(process_exists) {
        return;
    }
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

pub fn process_exists(pid: u32) -> bool {
    send_signal(pid, "-0")
}

pub fn force_kill(pid: u32) -> bool {
    send_signal(pid, "-9")
}

fn send_signal(pid: u32, signal: &str) -> bool {
    Command::new("kill")
        .args([signal, &pid.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

/// Poll until `pid` is gone; false if it outlived `timeouts.exit`
pub async fn wait_for_exit(pid: u32, timeouts: Timeouts) -> bool {
    let deadline = Instant::now() + timeouts.exit;
    while Instant::now() < deadline {
        if !process_exists(pid) {
            return true;
        }
        tokio::time::sleep(timeouts.poll).await;
    }
    !process_exists(pid)
}

/// Startup failure recorded by the most recent aqd run, if any
pub fn read_startup_error(log_path: &Path) -> Option<String> {
    startup_error_in(&std::fs::read_to_string(log_path).ok()?)
}

pub(crate) fn startup_error_in(log: &str) -> Option<String> {
    let (_, attempt) = log.rsplit_once(STARTUP_MARKER_PREFIX)?;
    let errors: Vec<&str> = attempt
        .lines()
        .filter_map(|line| line.strip_prefix(STARTUP_ERROR_PREFIX))
        .collect();
    (!errors.is_empty()).then(|| errors.join("\n"))
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
