// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named active queues and the engine tasks driving them
//!
//! Every control operation returns the queue snapshot that resulted from it.
//! Repeating a pause, resume or stop is a no-op that still succeeds.

use crate::engine::{Engine, RunSummary};
use crate::error::EngineError;
use crate::queue::{ActiveQueue, QueueSnapshot, StopRequest};
use aq_adapters::MessageBus;
use aq_core::{Atom, AtomId, Clock, IdGen, StopKind};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

pub struct QueueRegistry<B, C> {
    engine: Arc<Engine<B, C>>,
    queues: Mutex<BTreeMap<String, ActiveQueue>>,
    tasks: Mutex<HashMap<String, JoinHandle<RunSummary>>>,
}

impl<B: MessageBus, C: Clock> QueueRegistry<B, C> {
    pub fn new(engine: Engine<B, C>) -> Self {
        Self {
            engine: Arc::new(engine),
            queues: Mutex::new(BTreeMap::new()),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &Arc<Engine<B, C>> {
        &self.engine
    }

    /// Get a queue, creating it when missing
    pub fn create(&self, name: &str) -> ActiveQueue {
        let mut queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        queues
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::info!(queue = name, "queue created");
                ActiveQueue::new(name)
            })
            .clone()
    }

    pub fn get(&self, name: &str) -> Result<ActiveQueue, EngineError> {
        self.queues
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::QueueNotFound(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        self.queues
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Append a NEW atom to a queue (created on first use)
    pub fn submit(&self, queue: &str, atom: Atom) -> Result<QueueSnapshot, EngineError> {
        let active = self.create(queue);
        active.submit(atom, self.engine.clock(), &self.engine.broadcaster(queue))?;
        Ok(active.snapshot())
    }

    /// Spawn an engine task for a queue
    pub fn start(&self, queue: &str) -> Result<QueueSnapshot, EngineError> {
        let active = self.get(queue)?;
        let claim = active.claim()?;
        let engine = Arc::clone(&self.engine);
        let handle = tokio::spawn(async move { engine.run_claimed(claim).await });
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(queue.to_string(), handle);
        Ok(active.snapshot())
    }

    pub fn pause(&self, queue: &str) -> Result<QueueSnapshot, EngineError> {
        let active = self.running(queue)?;
        if active.control().pause() {
            tracing::info!(queue, "pause requested");
        }
        Ok(active.snapshot())
    }

    pub fn resume(&self, queue: &str) -> Result<QueueSnapshot, EngineError> {
        let active = self.running(queue)?;
        if active.control().resume() {
            tracing::info!(queue, "resume requested");
        }
        Ok(active.snapshot())
    }

    pub fn abort(&self, queue: &str) -> Result<QueueSnapshot, EngineError> {
        self.stop(queue, StopKind::Abort)
    }

    pub fn terminate(&self, queue: &str) -> Result<QueueSnapshot, EngineError> {
        self.stop(queue, StopKind::Terminate)
    }

    /// Stop a queue. A running queue is signalled and settles on its own task;
    /// an idle one has its waiting atoms stopped right away.
    pub fn stop(&self, queue: &str, kind: StopKind) -> Result<QueueSnapshot, EngineError> {
        let active = self.get(queue)?;
        match active.stop(kind, self.engine.clock(), &self.engine.broadcaster(queue)) {
            StopRequest::Signalled(true) => tracing::info!(queue, %kind, "stop requested"),
            StopRequest::Signalled(false) | StopRequest::Settled(0) => {}
            StopRequest::Settled(stopped) => {
                tracing::info!(queue, %kind, stopped, "idle queue stopped")
            }
        }
        Ok(active.snapshot())
    }

    /// Remove a not-yet-started atom (at any depth) from a queue
    pub fn remove_atom(&self, queue: &str, atom_id: &AtomId) -> Result<Atom, EngineError> {
        let atom = self.get(queue)?.remove_atom(atom_id)?;
        tracing::info!(queue, %atom_id, "atom removed");
        Ok(atom)
    }

    /// Append a fresh copy (new identifiers, NEW status) of a finished atom.
    ///
    /// Returns the copy's identifier with the resulting snapshot.
    pub fn resubmit(
        &self,
        queue: &str,
        atom_id: &AtomId,
        id_gen: &impl IdGen,
    ) -> Result<(AtomId, QueueSnapshot), EngineError> {
        let copy = self.get(queue)?.finished_atom(atom_id)?.fresh_copy(id_gen);
        let new_id = copy.id().clone();
        let snapshot = self.submit(queue, copy)?;
        tracing::info!(queue, %atom_id, %new_id, "atom resubmitted");
        Ok((new_id, snapshot))
    }

    pub fn snapshot(&self, queue: &str) -> Result<QueueSnapshot, EngineError> {
        Ok(self.get(queue)?.snapshot())
    }

    pub fn snapshots(&self) -> Vec<QueueSnapshot> {
        let queues: Vec<ActiveQueue> = self
            .queues
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        queues.iter().map(ActiveQueue::snapshot).collect()
    }

    /// Wait for the latest engine task of a queue. `None` if it was never started.
    pub async fn wait(&self, queue: &str) -> Result<Option<RunSummary>, EngineError> {
        let handle = self
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(queue);
        let Some(handle) = handle else {
            return Ok(None);
        };
        handle.await.map(Some).map_err(|e| EngineError::Task {
            queue: queue.to_string(),
            reason: e.to_string(),
        })
    }

    /// Abort every running queue and wait for the engine tasks to settle
    pub async fn shutdown(&self) -> Vec<RunSummary> {
        for name in self.names() {
            if let Ok(active) = self.get(&name) {
                if active.is_running() {
                    active.control().stop(StopKind::Abort);
                }
            }
        }
        let handles: Vec<(String, JoinHandle<RunSummary>)> = self
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .collect();

        let mut summaries = Vec::with_capacity(handles.len());
        for (queue, handle) in handles {
            match handle.await {
                Ok(summary) => summaries.push(summary),
                Err(e) => tracing::error!(%queue, error = %e, "engine task failed"),
            }
        }
        summaries
    }

    fn running(&self, queue: &str) -> Result<ActiveQueue, EngineError> {
        let active = self.get(queue)?;
        if !active.is_running() {
            return Err(EngineError::NotRunning(queue.to_string()));
        }
        Ok(active)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
