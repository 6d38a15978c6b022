// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message bus adapter
//!
//! The engine publishes status snapshots through a [`MessageBus`]. The
//! in-process [`LocalBus`] is the only production transport; anything that
//! can deliver `(topic, payload)` pairs can stand in for it.

mod local;

pub use local::LocalBus;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeBus;

use aq_core::events::{MessageReceiver, SubscriberId, Subscription};
use thiserror::Error;

/// Errors from bus operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("bus is closed")]
    Closed,
    #[error("publish to {topic} rejected: {reason}")]
    Rejected { topic: String, reason: String },
}

/// Publish/subscribe transport for serialized status messages
pub trait MessageBus: Clone + Send + Sync + 'static {
    /// Publish a payload; returns how many subscribers it reached
    fn publish(&self, topic: &str, payload: &str) -> Result<usize, BusError>;

    fn subscribe(&self, subscription: Subscription) -> Result<MessageReceiver, BusError>;

    fn unsubscribe(&self, id: &SubscriberId) -> Result<(), BusError>;
}
