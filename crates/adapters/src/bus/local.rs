// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process bus backed by a topic router

use super::{BusError, MessageBus};
use aq_core::events::{MessageReceiver, SubscriberId, Subscription, TopicBus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Message bus living inside the daemon process
#[derive(Clone, Default)]
pub struct LocalBus {
    topics: TopicBus,
    closed: Arc<AtomicBool>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Underlying router
    pub fn topics(&self) -> &TopicBus {
        &self.topics
    }

    /// Refuse all further traffic (daemon shutdown)
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> Result<(), BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        Ok(())
    }
}

impl MessageBus for LocalBus {
    fn publish(&self, topic: &str, payload: &str) -> Result<usize, BusError> {
        self.ensure_open()?;
        Ok(self.topics.publish(topic, payload))
    }

    fn subscribe(&self, subscription: Subscription) -> Result<MessageReceiver, BusError> {
        self.ensure_open()?;
        Ok(self.topics.subscribe(subscription))
    }

    fn unsubscribe(&self, id: &SubscriberId) -> Result<(), BusError> {
        self.topics.unsubscribe(id);
        Ok(())
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
