// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands

use std::path::{Path, PathBuf};
use std::process::Child;
use std::time::{Duration, Instant};

use aq_core::events::JournalRecord;
use aq_core::{AtomId, AtomRecord, StatusSnapshot};
use aq_daemon::lifecycle;
use aq_daemon::protocol::{self, ProtocolError};
use aq_daemon::{Config, DaemonStatus, Query, Request, Response, Settings};
use aq_engine::QueueSnapshot;
use thiserror::Error;
use tokio::net::UnixStream;
use tracing::debug;

use crate::process::{self, Timeouts};

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Daemon not running")]
    DaemonNotRunning,

    #[error("Failed to start daemon: {0}")]
    DaemonStartFailed(String),

    #[error("Connection timeout waiting for daemon to start")]
    DaemonStartTimeout,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A control request was refused; the snapshot shows the queue as it is
    #[error("{message}")]
    Rejected {
        message: String,
        snapshot: Option<Box<QueueSnapshot>>,
    },

    #[error("Daemon error: {0}")]
    Daemon(String),

    #[error("Unexpected response from daemon")]
    UnexpectedResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not determine state directory")]
    NoStateDir,
}

/// Paths shared with the daemon; settings do not matter to the client
pub fn daemon_config() -> Result<Config, ClientError> {
    let state_dir = lifecycle::state_dir().map_err(|_| ClientError::NoStateDir)?;
    Ok(Config::in_dirs(
        state_dir,
        lifecycle::socket_dir(),
        Settings::default(),
    ))
}

/// Daemon client
pub struct DaemonClient {
    socket_path: PathBuf,
    timeouts: Timeouts,
}

impl DaemonClient {
    /// Connect, spawning aqd (handing it `settings`) when it is not running
    pub fn connect_or_start(settings: Option<&Path>) -> Result<Self, ClientError> {
        let config = daemon_config()?;
        match Self::connect(&config) {
            Err(ClientError::DaemonNotRunning) => {
                let child = process::spawn_daemon(settings)
                    .map_err(|e| ClientError::DaemonStartFailed(e.to_string()))?;
                debug!(pid = child.id(), "spawned aqd");
                Self::await_startup(&config, child)
            }
            Err(e) => Err(with_startup_error(e, &config.log_path)),
            ok => ok,
        }
    }

    /// Connect to a running daemon (no auto-start)
    pub fn connect(config: &Config) -> Result<Self, ClientError> {
        if !config.socket_path.exists() {
            return Err(ClientError::DaemonNotRunning);
        }
        Ok(Self {
            socket_path: config.socket_path.clone(),
            timeouts: Timeouts::from_env(),
        })
    }

    /// Poll for the socket of a just-spawned daemon, noticing if it dies
    fn await_startup(config: &Config, mut child: Child) -> Result<Self, ClientError> {
        let timeouts = Timeouts::from_env();
        let deadline = Instant::now() + timeouts.connect;
        while Instant::now() < deadline {
            if let Ok(Some(status)) = child.try_wait() {
                return Err(ClientError::DaemonStartFailed(
                    logged_startup_error(&config.log_path, timeouts)
                        .unwrap_or_else(|| format!("aqd exited with {status}")),
                ));
            }
            match Self::connect(config) {
                Err(ClientError::DaemonNotRunning) => std::thread::sleep(timeouts.poll),
                Err(e) => return Err(with_startup_error(e, &config.log_path)),
                ok => return ok,
            }
        }
        Err(with_startup_error(
            ClientError::DaemonStartTimeout,
            &config.log_path,
        ))
    }

    /// Send a request and receive a response with specific timeouts
    async fn send_with_timeout(
        &self,
        request: Request,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Response, ClientError> {
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (mut reader, mut writer) = stream.into_split();

        // Encode and send request with write timeout
        let data = protocol::encode(&request)?;
        tokio::time::timeout(write_timeout, protocol::write_message(&mut writer, &data))
            .await
            .map_err(|_| ProtocolError::Timeout)??;

        // Read response with read timeout
        let response_bytes =
            tokio::time::timeout(read_timeout, protocol::read_message(&mut reader))
                .await
                .map_err(|_| ProtocolError::Timeout)??;

        let response: Response = protocol::decode(&response_bytes)?;
        debug!(?response, "daemon replied");
        Ok(response)
    }

    /// Send a request and receive a response
    pub async fn send(&self, request: Request) -> Result<Response, ClientError> {
        self.send_with_timeout(request, self.timeouts.ipc, self.timeouts.ipc)
            .await
    }

    /// Send a queue operation; both `Queue` and `Rejected` carry a snapshot
    pub async fn control(&self, request: Request) -> Result<QueueSnapshot, ClientError> {
        queue_result(self.send(request).await?)
    }

    pub async fn submit(
        &self,
        queue: &str,
        atom_json: String,
        start: bool,
    ) -> Result<QueueSnapshot, ClientError> {
        self.control(Request::Submit {
            queue: queue.to_string(),
            atom_json,
            start,
        })
        .await
    }

    pub async fn remove_atom(
        &self,
        queue: &str,
        atom_id: &str,
    ) -> Result<(AtomRecord, QueueSnapshot), ClientError> {
        match self
            .send(Request::RemoveAtom {
                queue: queue.to_string(),
                atom_id: atom_id.to_string(),
            })
            .await?
        {
            Response::Removed { atom, snapshot } => Ok((atom, snapshot)),
            other => Err(unexpected(other)),
        }
    }

    /// Queue a fresh copy of a finished atom; returns the copy's id
    pub async fn resubmit(
        &self,
        queue: &str,
        atom_id: &str,
        start: bool,
    ) -> Result<(AtomId, QueueSnapshot), ClientError> {
        match self
            .send(Request::Resubmit {
                queue: queue.to_string(),
                atom_id: atom_id.to_string(),
                start,
            })
            .await?
        {
            Response::Resubmitted { atom_id, snapshot } => Ok((atom_id, snapshot)),
            other => Err(unexpected(other)),
        }
    }

    pub async fn list_queues(&self) -> Result<Vec<QueueSnapshot>, ClientError> {
        match self.query(Query::ListQueues).await? {
            Response::Queues { queues } => Ok(queues),
            other => Err(unexpected(other)),
        }
    }

    pub async fn get_queue(&self, queue: &str) -> Result<QueueSnapshot, ClientError> {
        self.query(Query::GetQueue {
            queue: queue.to_string(),
        })
        .await
        .and_then(queue_result)
    }

    /// Journaled snapshots of one atom, oldest first
    pub async fn history(&self, atom_id: &str) -> Result<Vec<StatusSnapshot>, ClientError> {
        match self
            .query(Query::History {
                atom_id: atom_id.to_string(),
            })
            .await?
        {
            Response::History { snapshots } => Ok(snapshots),
            other => Err(unexpected(other)),
        }
    }

    pub async fn journal(
        &self,
        after: u64,
        topic: Option<String>,
    ) -> Result<Vec<JournalRecord>, ClientError> {
        match self.query(Query::Journal { after, topic }).await? {
            Response::Journal { records } => Ok(records),
            other => Err(unexpected(other)),
        }
    }

    pub async fn status(&self) -> Result<DaemonStatus, ClientError> {
        match self.query(Query::Status).await? {
            Response::Status { status } => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    async fn query(&self, query: Query) -> Result<Response, ClientError> {
        self.send(Request::Query { query }).await
    }

    /// Request daemon shutdown
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        match self.send(Request::Shutdown).await? {
            Response::ShuttingDown => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn ping(&self) -> Result<Duration, ClientError> {
        let start = Instant::now();
        match self.send(Request::Ping).await? {
            Response::Pong => Ok(start.elapsed()),
            other => Err(unexpected(other)),
        }
    }

    /// Get daemon version via Hello handshake
    pub async fn hello(&self) -> Result<String, ClientError> {
        match self
            .send(Request::Hello {
                version: env!("CARGO_PKG_VERSION").to_string(),
            })
            .await?
        {
            Response::Hello { version } => Ok(version),
            other => Err(unexpected(other)),
        }
    }

    /// Stream status messages for `pattern` until `on_message` returns false
    /// or the daemon closes the connection.
    pub async fn watch<F>(&self, pattern: &str, mut on_message: F) -> Result<(), ClientError>
    where
        F: FnMut(&str, &StatusSnapshot) -> bool,
    {
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (mut reader, mut writer) = stream.into_split();

        let data = protocol::encode(&Request::Watch {
            pattern: pattern.to_string(),
        })?;
        tokio::time::timeout(self.timeouts.ipc, protocol::write_message(&mut writer, &data))
            .await
            .map_err(|_| ProtocolError::Timeout)??;

        loop {
            let bytes = match protocol::read_message(&mut reader).await {
                Ok(bytes) => bytes,
                Err(ProtocolError::ConnectionClosed) => return Ok(()),
                Err(e) => return Err(e.into()),
            };
            match protocol::decode::<Response>(&bytes)? {
                Response::Message { topic, snapshot } => {
                    if !on_message(&topic, &snapshot) {
                        return Ok(());
                    }
                }
                other => return Err(unexpected(other)),
            }
        }
    }
}

fn queue_result(response: Response) -> Result<QueueSnapshot, ClientError> {
    match response {
        Response::Queue { snapshot } => Ok(snapshot),
        other => Err(unexpected(other)),
    }
}

fn unexpected(response: Response) -> ClientError {
    match response {
        Response::Error { message } => ClientError::Daemon(message),
        Response::Rejected { message, snapshot } => ClientError::Rejected {
            message,
            snapshot: snapshot.map(Box::new),
        },
        _ => ClientError::UnexpectedResponse,
    }
}

/// Stop the daemon: graceful shutdown, then SIGKILL if it lingers.
///
/// Returns false if no daemon was running.
pub async fn daemon_stop() -> Result<bool, ClientError> {
    let config = daemon_config()?;
    let client = match DaemonClient::connect(&config) {
        Err(ClientError::DaemonNotRunning) => {
            process::cleanup_stale_pid(&config);
            return Ok(false);
        }
        other => other?,
    };

    let graceful = client.shutdown().await;
    if let Some(pid) = process::read_daemon_pid(&config) {
        let exited = graceful.is_ok() && process::wait_for_exit(pid, client.timeouts).await;
        if !exited && process::process_exists(pid) {
            debug!(pid, "aqd did not exit, killing it");
            process::force_kill(pid);
            process::wait_for_exit(pid, client.timeouts).await;
        }
    }
    process::cleanup_stale_pid(&config);
    Ok(true)
}

/// A dead daemon may still be flushing its log; give it `timeouts.exit`
fn logged_startup_error(log_path: &Path, timeouts: Timeouts) -> Option<String> {
    let deadline = Instant::now() + timeouts.exit;
    loop {
        if let Some(error) = process::read_startup_error(log_path) {
            return Some(error);
        }
        if Instant::now() >= deadline {
            return None;
        }
        std::thread::sleep(timeouts.poll);
    }
}

/// Prefer the daemon's own startup error over a generic connection failure
fn with_startup_error(err: ClientError, log_path: &Path) -> ClientError {
    if matches!(err, ClientError::DaemonStartFailed(_)) {
        return err;
    }
    match process::read_startup_error(log_path) {
        Some(startup_error) => ClientError::DaemonStartFailed(startup_error),
        None => err,
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
