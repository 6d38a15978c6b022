// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.

use std::sync::Arc;

use aq_adapters::MessageBus;
use aq_core::events::{StatusJournal, SubscriberId, Subscription, TopicPattern};
use aq_core::{AtomId, StatusSnapshot, UuidIdGen};
use aq_engine::{EngineError, QueueSnapshot, QueueStatus};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::UnixStream;
use tracing::{debug, error, info, warn};

use crate::lifecycle::DaemonContext;
use crate::protocol::{
    self, DaemonStatus, Query, Request, Response, DEFAULT_TIMEOUT, PROTOCOL_VERSION,
};

/// Handle a single client connection
pub async fn handle_connection(
    ctx: Arc<DaemonContext>,
    stream: UnixStream,
) -> Result<(), ServerError> {
    // Split stream for reading/writing
    let (mut reader, mut writer) = stream.into_split();

    // Read request with timeout
    let request = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(req) => req,
        Err(protocol::ProtocolError::Timeout) => {
            error!("Request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(protocol::ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected before sending request");
            return Ok(());
        }
        Err(e) => {
            error!("Failed to read request: {}", e);
            return Err(ServerError::Protocol(e));
        }
    };

    debug!("Received request: {:?}", request);

    if let Request::Watch { pattern } = request {
        return watch(&ctx, &pattern, &mut reader, &mut writer).await;
    }

    let response = handle_request(&ctx, request).await;

    debug!("Sending response: {:?}", response);

    // Write response with timeout
    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT)
        .await
        .map_err(ServerError::Protocol)?;

    Ok(())
}

/// Stream status messages matching `pattern` until the client hangs up
async fn watch<R, W>(
    ctx: &DaemonContext,
    pattern: &str,
    reader: &mut R,
    writer: &mut W,
) -> Result<(), ServerError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let id = ctx.next_watcher_id();
    let mut messages = match ctx.bus.subscribe(Subscription::new(
        id.clone(),
        vec![TopicPattern::new(pattern)],
        format!("watch {pattern}"),
    )) {
        Ok(rx) => rx,
        Err(e) => {
            let response = Response::Error {
                message: e.to_string(),
            };
            return protocol::write_response(writer, &response, DEFAULT_TIMEOUT)
                .await
                .map_err(ServerError::Protocol);
        }
    };
    info!(watcher = %id, pattern, "watch started");

    let mut hangup = [0u8; 1];
    let result = loop {
        tokio::select! {
            message = messages.recv() => {
                // bus closed: daemon is going down
                let Some(message) = message else { break Ok(()) };
                let snapshot: StatusSnapshot = match serde_json::from_str(&message.payload) {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        warn!(topic = %message.topic, "unreadable status payload: {}", e);
                        continue;
                    }
                };
                let response = Response::Message { topic: message.topic, snapshot };
                if let Err(e) = protocol::write_response(writer, &response, DEFAULT_TIMEOUT).await {
                    break Err(ServerError::Protocol(e));
                }
            }
            // Clients never send after Watch; any read result means hang-up
            _ = reader.read(&mut hangup) => break Ok(()),
        }
    };

    if let Err(e) = ctx.bus.unsubscribe(&SubscriberId(id.clone())) {
        debug!(watcher = %id, "unsubscribe failed: {}", e);
    }
    info!(watcher = %id, "watch ended");
    result
}

/// Handle a single request and return a response
pub async fn handle_request(ctx: &DaemonContext, request: Request) -> Response {
    let queues = &ctx.queues;
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version: _ } => Response::Hello {
            version: PROTOCOL_VERSION.to_string(),
        },

        Request::Submit {
            queue,
            atom_json,
            start,
        } => {
            let atom = match ctx.atoms.unmarshal(&atom_json) {
                Ok(atom) => atom,
                Err(e) => return rejected(ctx, &queue, e.to_string()),
            };
            let submitted = queues.submit(&queue, atom);
            if !start || submitted.is_err() {
                return control(ctx, &queue, submitted);
            }
            control(ctx, &queue, start_after_submit(ctx, &queue))
        }

        Request::Resubmit {
            queue,
            atom_id,
            start,
        } => {
            let (atom_id, snapshot) =
                match queues.resubmit(&queue, &AtomId::from(atom_id), &UuidIdGen) {
                    Ok(resubmitted) => resubmitted,
                    Err(e) => return rejected(ctx, &queue, e.to_string()),
                };
            let snapshot = if start {
                match start_after_submit(ctx, &queue) {
                    Ok(snapshot) => snapshot,
                    Err(e) => return rejected(ctx, &queue, e.to_string()),
                }
            } else {
                snapshot
            };
            Response::Resubmitted { atom_id, snapshot }
        }

        Request::Start { queue } => control(ctx, &queue, queues.start(&queue)),
        Request::Pause { queue } => control(ctx, &queue, queues.pause(&queue)),
        Request::Resume { queue } => control(ctx, &queue, queues.resume(&queue)),
        Request::Abort { queue } => control(ctx, &queue, queues.abort(&queue)),
        Request::Terminate { queue } => control(ctx, &queue, queues.terminate(&queue)),

        Request::RemoveAtom { queue, atom_id } => {
            let removed = queues.remove_atom(&queue, &AtomId::from(atom_id));
            match removed.and_then(|atom| Ok((atom, queues.snapshot(&queue)?))) {
                Ok((atom, snapshot)) => Response::Removed {
                    atom: (&atom).into(),
                    snapshot,
                },
                Err(e) => rejected(ctx, &queue, e.to_string()),
            }
        }

        Request::Query { query } => handle_query(ctx, query),

        // Watch streams; only handle_connection can serve it
        Request::Watch { .. } => Response::Error {
            message: "watch needs its own connection".to_string(),
        },

        Request::Shutdown => {
            ctx.request_shutdown();
            Response::ShuttingDown
        }
    }
}

/// Start a queue that just received work
fn start_after_submit(ctx: &DaemonContext, queue: &str) -> Result<QueueSnapshot, EngineError> {
    match ctx.queues.start(queue) {
        // Work lands on the running queue and will be picked up
        Err(EngineError::AlreadyRunning(_)) => ctx.queues.snapshot(queue),
        other => other,
    }
}

fn control(ctx: &DaemonContext, queue: &str, result: Result<QueueSnapshot, EngineError>) -> Response {
    match result {
        Ok(snapshot) => Response::Queue { snapshot },
        Err(e) => rejected(ctx, queue, e.to_string()),
    }
}

fn rejected(ctx: &DaemonContext, queue: &str, message: String) -> Response {
    debug!(queue, "rejected: {}", message);
    Response::Rejected {
        message,
        snapshot: ctx.queues.snapshot(queue).ok(),
    }
}

/// Handle a query request
fn handle_query(ctx: &DaemonContext, query: Query) -> Response {
    match query {
        Query::ListQueues => Response::Queues {
            queues: ctx.queues.snapshots(),
        },

        Query::GetQueue { queue } => match ctx.queues.snapshot(&queue) {
            Ok(snapshot) => Response::Queue { snapshot },
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },

        Query::History { atom_id } => {
            let history = StatusJournal::open(&ctx.journal_path)
                .and_then(|journal| journal.history(&AtomId::from(atom_id)));
            match history {
                Ok(snapshots) => Response::History { snapshots },
                Err(e) => Response::Error {
                    message: format!("journal unreadable: {e}"),
                },
            }
        }

        Query::Journal { after, topic } => {
            let records = StatusJournal::open(&ctx.journal_path).and_then(|journal| match topic {
                Some(pattern) => Ok(journal
                    .query(&TopicPattern::new(&pattern))?
                    .into_iter()
                    .filter(|r| r.sequence > after)
                    .collect::<Vec<_>>()),
                None => journal.after(after),
            });
            match records {
                Ok(records) => Response::Journal { records },
                Err(e) => Response::Error {
                    message: format!("journal unreadable: {e}"),
                },
            }
        }

        Query::Status => {
            let snapshots = ctx.queues.snapshots();
            let queues_running = snapshots
                .iter()
                .filter(|s| matches!(s.status, QueueStatus::Running | QueueStatus::Paused))
                .count();
            Response::Status {
                status: DaemonStatus {
                    uptime_secs: ctx.start_time.elapsed().as_secs(),
                    queues: snapshots.len(),
                    queues_running,
                    atom_types: ctx.atoms.type_tags().into_iter().map(String::from).collect(),
                },
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),

    #[error("Request timeout")]
    Timeout,
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
