// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol between `aq` and `aqd`.
//!
//! Every message is a 4-byte big-endian length followed by that many bytes of
//! JSON. A connection carries one request and one response, except `Watch`,
//! which answers with a stream of `Message` responses.

use std::time::Duration;

use aq_core::events::JournalRecord;
use aq_core::{AtomId, AtomRecord, StatusSnapshot};
use aq_engine::QueueSnapshot;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version reported by `Hello`
pub const PROTOCOL_VERSION: &str = "1";

/// Default timeout for reading a request or writing a response
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on one message, to reject garbage length prefixes
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Client-to-daemon requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    Ping,
    Hello {
        version: String,
    },
    /// Submit a serialized atom; the queue is created on first use
    Submit {
        queue: String,
        atom_json: String,
        /// Start the queue right after submitting
        #[serde(default)]
        start: bool,
    },
    Start {
        queue: String,
    },
    Pause {
        queue: String,
    },
    Resume {
        queue: String,
    },
    Abort {
        queue: String,
    },
    Terminate {
        queue: String,
    },
    RemoveAtom {
        queue: String,
        atom_id: String,
    },
    /// Submit a fresh copy of a finished atom under new identifiers
    Resubmit {
        queue: String,
        atom_id: String,
        #[serde(default)]
        start: bool,
    },
    Query {
        query: Query,
    },
    /// Stream status messages whose topic matches `pattern`
    Watch {
        pattern: String,
    },
    Shutdown,
}

/// Read-only queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Query {
    ListQueues,
    GetQueue { queue: String },
    /// Journaled snapshots of one atom, oldest first
    History { atom_id: String },
    /// Journal records after a sequence number, optionally for matching topics
    Journal {
        after: u64,
        #[serde(default)]
        topic: Option<String>,
    },
    Status,
}

/// Daemon-to-client responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Pong,
    Hello {
        version: String,
    },
    /// A control operation succeeded
    Queue {
        snapshot: QueueSnapshot,
    },
    /// A control operation failed; the snapshot shows the queue as it is
    Rejected {
        message: String,
        snapshot: Option<QueueSnapshot>,
    },
    Removed {
        atom: AtomRecord,
        snapshot: QueueSnapshot,
    },
    Resubmitted {
        atom_id: AtomId,
        snapshot: QueueSnapshot,
    },
    Queues {
        queues: Vec<QueueSnapshot>,
    },
    History {
        snapshots: Vec<StatusSnapshot>,
    },
    Journal {
        records: Vec<JournalRecord>,
    },
    Status {
        status: DaemonStatus,
    },
    /// One bus message, streamed in answer to `Watch`
    Message {
        topic: String,
        snapshot: StatusSnapshot,
    },
    ShuttingDown,
    Error {
        message: String,
    },
}

/// Daemon-wide summary answered to `Query::Status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub uptime_secs: u64,
    pub queues: usize,
    /// Queues with an engine attached (running or paused)
    pub queues_running: usize,
    /// Type tags the daemon accepts on submit
    pub atom_types: Vec<String>,
}

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout")]
    Timeout,
}

/// Serialize a message to JSON (no length prefix)
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(message)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Read one length-prefixed message
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed)
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut buffer = vec![0u8; len];
    reader.read_exact(&mut buffer).await?;
    Ok(buffer)
}

/// Write one length-prefixed message
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: data.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    let len = data.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Request, ProtocolError> {
    let bytes = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&bytes)
}

pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    let data = encode(response)?;
    tokio::time::timeout(timeout, write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
