// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background task that journals every status snapshot the queues publish

use std::path::Path;

use aq_adapters::{BusError, MessageBus};
use aq_core::events::{MessageReceiver, StatusJournal, SubscriberId, Subscription, TopicPattern};
use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Subscribe to `{prefix}:**` and append each message to the journal at `path`.
///
/// The task ends once `subscriber` is unsubscribed and the backlog is written.
pub fn spawn_writer<B: MessageBus>(
    bus: &B,
    subscriber: &SubscriberId,
    prefix: &str,
    path: &Path,
) -> Result<JoinHandle<()>, SpawnError> {
    let journal = StatusJournal::open(path)?;
    let receiver = bus.subscribe(Subscription::new(
        subscriber.0.clone(),
        vec![TopicPattern::new(&format!("{prefix}:**"))],
        "status journal",
    ))?;
    Ok(tokio::spawn(write_all(journal, receiver)))
}

async fn write_all(mut journal: StatusJournal, mut receiver: MessageReceiver) {
    while let Some(message) = receiver.recv().await {
        match journal.append_message(&message, Utc::now()) {
            Ok(record) => debug!(sequence = record.sequence, topic = %record.topic, "journaled"),
            Err(e) => warn!(topic = %message.topic, "failed to journal status: {}", e),
        }
    }
}

/// Why the journal writer could not start
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("cannot open journal: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Bus(#[from] BusError),
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
