// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process topic bus

use super::subscription::{SubscriberId, Subscription};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

/// A payload published on a topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusMessage {
    pub topic: String,
    /// Serialized body, usually a JSON status snapshot
    pub payload: String,
}

pub type MessageSender = mpsc::UnboundedSender<BusMessage>;
pub type MessageReceiver = mpsc::UnboundedReceiver<BusMessage>;

/// Routes published messages to every subscriber with a matching pattern.
///
/// Clones share subscribers. Delivery is unbounded and never blocks the
/// publisher; subscribers whose receiver was dropped are pruned lazily.
pub struct TopicBus {
    subscribers: Arc<RwLock<HashMap<SubscriberId, (Subscription, MessageSender)>>>,
}

impl TopicBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Subscribe; an existing subscription with the same id is replaced
    pub fn subscribe(&self, subscription: Subscription) -> MessageReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = subscription.id.clone();
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subs.insert(id, (subscription, tx));
        rx
    }

    pub fn unsubscribe(&self, id: &SubscriberId) -> bool {
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subs.remove(id).is_some()
    }

    /// Deliver to every matching subscriber; returns how many were reached
    pub fn publish(&self, topic: &str, payload: &str) -> usize {
        let message = BusMessage {
            topic: topic.to_string(),
            payload: payload.to_string(),
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        {
            let subs = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
            for (id, (subscription, tx)) in subs.iter() {
                if !subscription.matches(topic) {
                    continue;
                }
                if tx.send(message.clone()).is_ok() {
                    delivered += 1;
                } else {
                    closed.push(id.clone());
                }
            }
        }
        if !closed.is_empty() {
            let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
            for id in closed {
                subs.remove(&id);
            }
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl Default for TopicBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for TopicBus {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
