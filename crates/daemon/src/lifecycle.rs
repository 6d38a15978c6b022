// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: configuration, startup, shutdown.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use aq_adapters::{
    DummyExecutor, JsonlSink, LocalBus, MessageBus, ScanExecutor, SimulatedPositioner,
    TracedBus, TracedExecutor,
};
use aq_core::events::SubscriberId;
use aq_core::{AtomRegistry, FailurePolicy, SystemClock, DUMMY_TAG, SCAN_TAG};
use aq_engine::{Engine, EngineConfig, Executors, QueueRegistry};
use fs2::FileExt;
use serde::Deserialize;
use thiserror::Error;
use tokio::net::UnixListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::journal;

/// Startup marker prefix written to the log before anything else.
/// The CLI uses it to find where the current startup attempt begins.
/// Full format: "--- aqd: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- aqd: starting (pid: ";

/// Prefix of the line written synchronously when startup fails
pub const STARTUP_ERROR_PREFIX: &str = "ERROR Failed to start daemon: ";

/// Bus used inside the daemon (wrapped with tracing)
pub type DaemonBus = TracedBus<LocalBus>;

/// Queue registry with the daemon's concrete bus and clock
pub type DaemonQueues = QueueRegistry<DaemonBus, SystemClock>;

/// Settings read from `aq.toml`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Topic prefix for status snapshots; each queue publishes on `{prefix}:{queue}`
    pub status_topic: String,
    /// How long a running atom gets to acknowledge abort/terminate
    #[serde(with = "humantime_serde")]
    pub stop_timeout: Duration,
    pub failure_policy: FailurePolicy,
    /// Keep dequeuing after a top-level atom FAILED
    pub continue_after_failure: bool,
    /// Queues created at startup
    pub queues: Vec<String>,
    /// Travel limit of the simulated positioner, on every axis
    pub positioner_limit: f64,
}

impl Default for Settings {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            status_topic: engine.status_topic,
            stop_timeout: engine.stop_timeout,
            failure_policy: engine.failure_policy,
            continue_after_failure: engine.continue_after_failure,
            queues: vec!["default".to_string()],
            positioner_limit: 1000.0,
        }
    }
}

impl Settings {
    /// Parse settings from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Read settings from `path`; a missing file means defaults
    pub fn load(path: &Path) -> Result<Self, LifecycleError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| LifecycleError::Settings(path.to_path_buf(), e))
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            stop_timeout: self.stop_timeout,
            failure_policy: self.failure_policy,
            continue_after_failure: self.continue_after_failure,
            status_topic: self.status_topic.clone(),
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the log, lock and journal
    pub state_dir: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Path to the status journal
    pub journal_path: PathBuf,
    /// Where ScanAtom samples are appended
    pub scan_path: PathBuf,
    pub settings: Settings,
}

impl Config {
    /// Configuration from the XDG directories, with settings from
    /// `settings_path` or `<state dir>/aq.toml`
    pub fn load(settings_path: Option<&Path>) -> Result<Self, LifecycleError> {
        let state_dir = state_dir()?;
        let settings = match settings_path {
            Some(path) if !path.exists() => {
                return Err(LifecycleError::SettingsNotFound(path.to_path_buf()))
            }
            Some(path) => Settings::load(path)?,
            None => Settings::load(&state_dir.join("aq.toml"))?,
        };
        Ok(Self::in_dirs(state_dir, socket_dir(), settings))
    }

    /// Configuration rooted at explicit directories
    pub fn in_dirs(state_dir: PathBuf, socket_dir: PathBuf, settings: Settings) -> Self {
        Self {
            socket_path: socket_dir.join("aqd.sock"),
            lock_path: state_dir.join("aqd.pid"),
            log_path: state_dir.join("aqd.log"),
            journal_path: state_dir.join("status.jsonl"),
            scan_path: state_dir.join("scans.jsonl"),
            state_dir,
            settings,
        }
    }
}

/// State shared by every connection handler
pub struct DaemonContext {
    pub queues: DaemonQueues,
    pub atoms: AtomRegistry,
    pub bus: DaemonBus,
    pub journal_path: PathBuf,
    pub start_time: Instant,
    shutdown: Notify,
    watchers: AtomicU64,
}

impl DaemonContext {
    pub fn new(config: &Config, bus: DaemonBus) -> Self {
        let settings = &config.settings;
        let positioner = SimulatedPositioner::new(settings.positioner_limit);
        let executors = Executors::new()
            .register(DUMMY_TAG, TracedExecutor::new(DummyExecutor))
            .register(
                SCAN_TAG,
                TracedExecutor::new(ScanExecutor::new(
                    positioner,
                    JsonlSink::new(&config.scan_path),
                )),
            );
        let engine = Engine::new(executors, settings.engine_config(), bus.clone(), SystemClock);
        let queues = QueueRegistry::new(engine);
        for name in &settings.queues {
            queues.create(name);
        }

        Self {
            queues,
            atoms: AtomRegistry::with_defaults(),
            bus,
            journal_path: config.journal_path.clone(),
            start_time: Instant::now(),
            shutdown: Notify::new(),
            watchers: AtomicU64::new(0),
        }
    }

    pub fn request_shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Resolves once a client asked the daemon to shut down
    pub async fn shutdown_requested(&self) {
        self.shutdown.notified().await;
    }

    /// Subscriber id for a new `Watch` connection
    pub fn next_watcher_id(&self) -> String {
        format!("watch-{}", self.watchers.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Daemon state during operation
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Unix socket listener
    pub listener: UnixListener,
    pub ctx: Arc<DaemonContext>,
    journal_subscriber: SubscriberId,
    journal_task: Option<JoinHandle<()>>,
}

impl DaemonState {
    /// Shutdown the daemon gracefully
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        // 1. Abort running queues and wait for their engines to settle
        for summary in self.ctx.queues.shutdown().await {
            info!(
                queue = %summary.queue,
                status = ?summary.status,
                finished = summary.finished,
                "queue stopped"
            );
        }

        // 2. Let the journal writer drain what was published, then close the bus
        if let Err(e) = self.ctx.bus.unsubscribe(&self.journal_subscriber) {
            warn!("Failed to detach journal writer: {}", e);
        }
        if let Some(task) = self.journal_task.take() {
            if let Err(e) = task.await {
                warn!("Journal writer ended abnormally: {}", e);
            }
        }
        self.ctx.bus.inner().close();

        // 3. Remove socket file
        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!("Failed to remove socket file: {}", e);
            }
        }

        // 4. Remove PID file
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        // 5. Lock file is released automatically when self.lock_file is dropped

        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Settings file not found: {0}")]
    SettingsNotFound(PathBuf),

    #[error("Invalid settings in {0}: {1}")]
    Settings(PathBuf, #[source] toml::de::Error),

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("Journal writer failed to start: {0}")]
    Journal(#[from] journal::SpawnError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        // Another daemon owns the socket and PID file
        Err(e @ LifecycleError::LockFailed(_)) => Err(e),
        Err(e) => {
            // Clean up any resources created before failure
            cleanup_on_failure(config);
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<DaemonState, LifecycleError> {
    // 1. Create state directory (needed for lock, journal, etc.)
    std::fs::create_dir_all(&config.state_dir)?;

    // 2. Acquire lock file FIRST - one daemon means one engine per queue
    // Not truncated until locked: the PID may belong to a live daemon
    let mut lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    // 3. Create socket directory
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // 4. Bus, queues and the journal writer
    let bus = TracedBus::new(LocalBus::new());
    let ctx = Arc::new(DaemonContext::new(config, bus.clone()));
    let journal_subscriber = SubscriberId("journal".to_string());
    let journal_task = journal::spawn_writer(
        &bus,
        &journal_subscriber,
        &config.settings.status_topic,
        &config.journal_path,
    )?;

    info!(
        queues = ?ctx.queues.names(),
        stop_timeout = ?config.settings.stop_timeout,
        "Engine configured"
    );

    // 5. Remove stale socket and bind (LAST - only after all validation passes)
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    info!("Daemon started, state in {}", config.state_dir.display());

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        listener,
        ctx,
        journal_subscriber,
        journal_task: Some(journal_task),
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    // Remove socket if we created it
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }

    // Remove PID/lock file
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

/// Get the state directory for aq
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    // Use XDG_STATE_HOME or default to ~/.local/state
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("aq"));
    }

    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/aq"))
}

/// Get the socket directory for aq
///
/// Uses /tmp/aq by default to keep paths short (macOS SUN_LEN = 104).
/// Can be overridden with AQ_SOCKET_DIR for testing.
pub fn socket_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("AQ_SOCKET_DIR") {
        return PathBuf::from(dir);
    }
    PathBuf::from("/tmp/aq")
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
