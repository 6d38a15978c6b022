// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::bus::{BusError, MessageBus};
use crate::executor::{AtomExecutor, Checkpoint, ExecutionError};
use aq_core::events::{MessageReceiver, SubscriberId, Subscription};
use aq_core::Atom;
use async_trait::async_trait;
use tracing::Instrument;

/// Wrapper that adds tracing to any MessageBus
#[derive(Clone)]
pub struct TracedBus<B> {
    inner: B,
}

impl<B> TracedBus<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }
}

impl<B: MessageBus> MessageBus for TracedBus<B> {
    fn publish(&self, topic: &str, payload: &str) -> Result<usize, BusError> {
        let result = self.inner.publish(topic, payload);
        match &result {
            Ok(delivered) => tracing::trace!(topic, delivered, bytes = payload.len(), "published"),
            Err(e) => tracing::warn!(topic, error = %e, "publish failed"),
        }
        result
    }

    fn subscribe(&self, subscription: Subscription) -> Result<MessageReceiver, BusError> {
        let id = subscription.id.clone();
        let patterns: Vec<&str> = subscription.patterns.iter().map(|p| p.as_str()).collect();
        tracing::info!(subscriber = %id, ?patterns, "subscribing");
        let result = self.inner.subscribe(subscription);
        if let Err(e) = &result {
            tracing::error!(subscriber = %id, error = %e, "subscribe failed");
        }
        result
    }

    fn unsubscribe(&self, id: &SubscriberId) -> Result<(), BusError> {
        tracing::info!(subscriber = %id, "unsubscribing");
        self.inner.unsubscribe(id)
    }
}

/// Wrapper that adds tracing to any AtomExecutor
pub struct TracedExecutor<E> {
    inner: E,
}

impl<E> TracedExecutor<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<E: AtomExecutor> AtomExecutor for TracedExecutor<E> {
    async fn execute(
        &self,
        atom: &Atom,
        checkpoint: &mut dyn Checkpoint,
    ) -> Result<(), ExecutionError> {
        let span = tracing::info_span!(
            "atom.execute",
            atom_id = %atom.id(),
            type_tag = atom.type_tag()
        );
        span.in_scope(|| tracing::info!(name = atom.name(), "starting"));

        let start = std::time::Instant::now();
        let result = self
            .inner
            .execute(atom, checkpoint)
            .instrument(span.clone())
            .await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        let _guard = span.enter();

        match &result {
            Ok(()) => tracing::info!(elapsed_ms, "completed"),
            Err(ExecutionError::Interrupted(kind)) => {
                tracing::info!(elapsed_ms, %kind, "interrupted")
            }
            Err(e) => tracing::error!(elapsed_ms, error = %e, "failed"),
        }
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
