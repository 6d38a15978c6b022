// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake bus for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{BusError, MessageBus};
use aq_core::events::{BusMessage, MessageReceiver, SubscriberId, Subscription, TopicBus};
use aq_core::{AtomId, Status, StatusSnapshot};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Bus that records every publish and can be told to fail
#[derive(Clone, Default)]
pub struct FakeBus {
    published: Arc<Mutex<Vec<BusMessage>>>,
    topics: TopicBus,
    failing: Arc<AtomicBool>,
}

impl FakeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent publishes fail (they are still recorded)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<BusMessage> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Published payloads decoded as status snapshots (others are skipped)
    pub fn snapshots(&self) -> Vec<StatusSnapshot> {
        self.published()
            .iter()
            .filter_map(|m| serde_json::from_str(&m.payload).ok())
            .collect()
    }

    /// Published statuses of one atom, in order
    pub fn statuses_of(&self, id: &str) -> Vec<Status> {
        let id = AtomId::from(id);
        self.snapshots()
            .into_iter()
            .filter(|s| s.id == id)
            .map(|s| s.status)
            .collect()
    }

    /// Latest published snapshot of one atom
    pub fn last_of(&self, id: &str) -> Option<StatusSnapshot> {
        let id = AtomId::from(id);
        self.snapshots().into_iter().rev().find(|s| s.id == id)
    }
}

impl MessageBus for FakeBus {
    fn publish(&self, topic: &str, payload: &str) -> Result<usize, BusError> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(BusMessage {
                topic: topic.to_string(),
                payload: payload.to_string(),
            });
        if self.failing.load(Ordering::SeqCst) {
            return Err(BusError::Rejected {
                topic: topic.to_string(),
                reason: "fake bus failure".to_string(),
            });
        }
        Ok(self.topics.publish(topic, payload))
    }

    fn subscribe(&self, subscription: Subscription) -> Result<MessageReceiver, BusError> {
        Ok(self.topics.subscribe(subscription))
    }

    fn unsubscribe(&self, id: &SubscriberId) -> Result<(), BusError> {
        self.topics.unsubscribe(id);
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
