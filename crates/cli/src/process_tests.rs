// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use aq_daemon::Settings;
use std::collections::HashMap;
use std::fs;
use tempfile::tempdir;

fn config_in(dir: &Path) -> Config {
    Config::in_dirs(dir.join("state"), dir.join("sock"), Settings::default())
}

#[test]
fn timeouts_read_millisecond_overrides() {
    let env: HashMap<&str, &str> = [("AQ_TIMEOUT_IPC_MS", "250"), ("AQ_POLL_INTERVAL_MS", "oops")]
        .into_iter()
        .collect();

    let timeouts = Timeouts::from_lookup(|var| env.get(var).map(|v| v.to_string()));

    assert_eq!(timeouts.ipc, Duration::from_millis(250));
    // unparsable values keep the default
    assert_eq!(timeouts.poll, Timeouts::default().poll);
    assert_eq!(timeouts.connect, Timeouts::default().connect);
}

#[test]
fn startup_error_is_read_from_the_last_attempt() {
    let log = format!(
        "{m}100) ---\n{e}old failure\n\
         {m}200) ---\n2026-01-01T00:00:00Z  INFO aqd: starting aqd\n\
         {e}Failed to acquire lock: daemon already running?\n",
        m = STARTUP_MARKER_PREFIX,
        e = STARTUP_ERROR_PREFIX,
    );

    assert_eq!(
        startup_error_in(&log).as_deref(),
        Some("Failed to acquire lock: daemon already running?")
    );
}

#[test]
fn clean_startup_has_no_error() {
    let log = format!("{}42) ---\nINFO aqd: aqd ready\n", STARTUP_MARKER_PREFIX);
    assert_eq!(startup_error_in(&log), None);
    assert_eq!(startup_error_in("no marker at all"), None);
}

#[test]
fn missing_log_has_no_startup_error() {
    let temp = tempdir().unwrap();
    assert_eq!(read_startup_error(&temp.path().join("aqd.log")), None);
}

#[test]
fn pid_file_is_parsed_leniently() {
    let temp = tempdir().unwrap();
    let config = config_in(temp.path());
    fs::create_dir_all(&config.state_dir).unwrap();

    assert_eq!(read_daemon_pid(&config), None);
    fs::write(&config.lock_path, " 4242\n").unwrap();
    assert_eq!(read_daemon_pid(&config), Some(4242));
}

#[test]
fn stale_pid_of_a_dead_process_is_removed() {
    let temp = tempdir().unwrap();
    let config = config_in(temp.path());
    fs::create_dir_all(&config.state_dir).unwrap();
    // not a pid at all, so no such process
    fs::write(&config.lock_path, "garbage\n").unwrap();

    cleanup_stale_pid(&config);
    assert!(!config.lock_path.exists());
}

#[test]
fn our_own_process_exists() {
    assert!(process_exists(std::process::id()));
}
