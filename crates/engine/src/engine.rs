// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Active-queue execution engine
//!
//! One engine run drives one queue: atoms are dequeued in FIFO order and run
//! to a terminal status one at a time. Composites run their children with the
//! same logic, recursively, so at most one leaf executes at any instant. The
//! running atom stays inside the queue state and is addressed by an index
//! path from the top-level atom; the state lock is never held across an
//! await.

use crate::broadcast::StatusBroadcaster;
use crate::control::Signal;
use crate::error::{EngineError, StopOutcome};
use crate::queue::{stop_message, ActiveQueue, QueueClaim, QueueState, QueueStatus};
use aq_adapters::{AtomExecutor, Checkpoint, ExecutionError, MessageBus};
use aq_core::{
    aggregate_ancestors, stop_tree, Atom, AtomId, Clock, FailurePolicy, Status, StopKind,
    TransitionError,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::Instrument;

/// Engine behaviour knobs
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// How long an in-flight atom gets to acknowledge abort/terminate
    pub stop_timeout: Duration,
    pub failure_policy: FailurePolicy,
    /// Keep dequeuing after a top-level atom FAILED
    pub continue_after_failure: bool,
    /// Status topic prefix; each queue publishes on `{prefix}:{queue}`
    pub status_topic: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stop_timeout: Duration::from_secs(5),
            failure_policy: FailurePolicy::CascadeAbort,
            continue_after_failure: false,
            status_topic: "aq:status".to_string(),
        }
    }
}

/// Leaf executors keyed by type tag
#[derive(Clone, Default)]
pub struct Executors {
    by_tag: HashMap<String, Arc<dyn AtomExecutor>>,
}

impl Executors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, type_tag: impl Into<String>, executor: impl AtomExecutor) -> Self {
        self.by_tag.insert(type_tag.into(), Arc::new(executor));
        self
    }

    pub fn get(&self, type_tag: &str) -> Option<Arc<dyn AtomExecutor>> {
        self.by_tag.get(type_tag).cloned()
    }
}

/// Result of one engine run over a queue
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub queue: String,
    pub status: QueueStatus,
    /// Top-level atoms that reached a terminal status during this run
    pub finished: usize,
    pub stop: Option<StopOutcome>,
}

/// Per-run context shared down the recursion
struct Run<B> {
    queue: ActiveQueue,
    /// Claim epoch; every release of the queue goes through it
    epoch: u64,
    listener: StatusBroadcaster<B>,
    degraded: Mutex<Option<StopOutcome>>,
}

type BoxFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

pub struct Engine<B, C> {
    executors: Executors,
    config: EngineConfig,
    bus: B,
    clock: C,
}

impl<B: MessageBus, C: Clock> Engine<B, C> {
    pub fn new(executors: Executors, config: EngineConfig, bus: B, clock: C) -> Self {
        Self {
            executors,
            config,
            bus,
            clock,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Broadcaster for one queue's status topic
    pub fn broadcaster(&self, queue: &str) -> StatusBroadcaster<B> {
        StatusBroadcaster::new(
            self.bus.clone(),
            StatusBroadcaster::<B>::queue_topic(&self.config.status_topic, queue),
        )
    }

    /// Claim `queue` and run it until it drains, halts or is stopped
    pub async fn run(&self, queue: &ActiveQueue) -> Result<RunSummary, EngineError> {
        let claim = queue.claim()?;
        Ok(self.run_claimed(claim).await)
    }

    /// Run a queue this caller already claimed
    pub async fn run_claimed(&self, claim: QueueClaim) -> RunSummary {
        let queue = claim.queue().clone();
        let run = Run {
            listener: self.broadcaster(queue.name()),
            epoch: claim.epoch(),
            queue,
            degraded: Mutex::new(None),
        };
        let span = tracing::info_span!("queue.run", queue = run.queue.name());
        let summary = self.drive(&run).instrument(span).await;
        drop(claim);
        summary
    }

    async fn drive(&self, run: &Run<B>) -> RunSummary {
        tracing::info!("queue started");
        let mut finished = 0;

        let status = loop {
            if let Some(kind) = self.boundary(run).await {
                break run.queue.with_state(|state| self.halt(run, state, kind));
            }

            let atom_id = match self.dequeue(run) {
                Ok(atom_id) => atom_id,
                Err(status) => break status,
            };

            tracing::info!(%atom_id, "dequeued");
            self.run_atom(run, Vec::new()).await;
            finished += 1;

            if let Err(status) = self.retire(run, &atom_id) {
                break status;
            }
        };

        let stop = status.stopped_by().map(|kind| {
            run.degraded
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take()
                .unwrap_or(StopOutcome::Acknowledged(kind))
        });
        tracing::info!(?status, finished, "queue finished");
        RunSummary {
            queue: run.queue.name().to_string(),
            status,
            finished,
            stop,
        }
    }

    /// Make the next queued atom current. Stopping and draining release the
    /// queue under the same lock, so a concurrent submit or stop either
    /// reaches this run or finds the queue free.
    fn dequeue(&self, run: &Run<B>) -> Result<AtomId, QueueStatus> {
        run.queue.with_state(|state| {
            if let Some(kind) = run.queue.control().stop_kind() {
                return Err(self.halt(run, state, kind));
            }
            let Some(atom) = state.pending.pop_front() else {
                state.release(run.epoch, QueueStatus::Drained);
                return Err(QueueStatus::Drained);
            };
            let atom_id = atom.id().clone();
            state.current = Some(atom);
            Ok(atom_id)
        })
    }

    /// Move the current atom to the finished list, ending the run on a stop
    /// or on a failure the config does not tolerate
    fn retire(&self, run: &Run<B>, atom_id: &AtomId) -> Result<(), QueueStatus> {
        run.queue.with_state(|state| {
            if let Some(kind) = run.queue.control().stop_kind() {
                return Err(self.halt(run, state, kind));
            }
            let done = state.current.take();
            let failed = done.as_ref().is_some_and(|a| a.status() == Status::Failed);
            state.finished.extend(done);
            if failed && !self.config.continue_after_failure {
                tracing::warn!(%atom_id, "atom failed, halting queue");
                state.release(run.epoch, QueueStatus::Halted);
                return Err(QueueStatus::Halted);
            }
            Ok(())
        })
    }

    /// Settle the in-flight tree and every queued atom after a stop, then
    /// release the queue
    fn halt(&self, run: &Run<B>, state: &mut QueueState, kind: StopKind) -> QueueStatus {
        let clock = &self.clock;
        let listener = &run.listener;
        let policy = self.config.failure_policy;
        let message = Some(stop_message(kind));
        if let Some(mut atom) = state.current.take() {
            if let Err(e) = stop_tree(&mut atom, kind, message, policy, clock, listener) {
                tracing::error!(atom_id = %atom.id(), error = %e, "could not settle stopped atom");
            }
            state.finished.push(atom);
        }
        while let Some(mut atom) = state.pending.pop_front() {
            atom.stop_pending(kind.status(), message, clock, listener);
            state.finished.push(atom);
        }
        let status = QueueStatus::for_stop(kind);
        state.release(run.epoch, status);
        tracing::info!(%kind, "queue stopped");
        status
    }

    /// Honour pause and stop between atoms. Returns the stop, if any.
    async fn boundary(&self, run: &Run<B>) -> Option<StopKind> {
        let control = run.queue.control();
        loop {
            match control.signal() {
                Signal::Run => return None,
                Signal::Stop(kind) => return Some(kind),
                Signal::Pause => {
                    run.queue.set_status(QueueStatus::Paused);
                    tracing::info!("queue paused between atoms");
                    if control.released().await == Signal::Run {
                        run.queue.set_status(QueueStatus::Running);
                        tracing::info!("queue resumed");
                    }
                }
            }
        }
    }

    fn run_atom<'a>(&'a self, run: &'a Run<B>, path: Vec<usize>) -> BoxFuture<'a> {
        Box::pin(async move {
            let composite = run
                .queue
                .with_state(|state| state.current.as_ref()?.at_path(&path).map(Atom::is_composite));
            match composite {
                Some(true) => self.run_composite(run, path).await,
                Some(false) => self.run_leaf(run, &path).await,
                None => tracing::error!(?path, "atom vanished from queue"),
            }
        })
    }

    /// Run pending children in order. The composite turns RUNNING with its
    /// first running child.
    async fn run_composite(&self, run: &Run<B>, path: Vec<usize>) {
        let mut index = 0;
        loop {
            if self.boundary(run).await.is_some() {
                return;
            }
            // Re-read each time: pending children may be removed while running
            let next = run.queue.with_state(|state| {
                let composite = state.current.as_ref()?.at_path(&path)?;
                if composite.status().is_terminal() {
                    return None;
                }
                let child = composite.children()?.get(index)?;
                Some(child.status().is_pending())
            });
            match next {
                None => break,
                Some(false) => {}
                Some(true) => {
                    let mut child = path.clone();
                    child.push(index);
                    self.run_atom(run, child).await;
                }
            }
            index += 1;
        }

        // Picks up empty composites and children settled without running
        let policy = self.config.failure_policy;
        let clock = &self.clock;
        let listener = &run.listener;
        let result = run.queue.with_state(|state| match state.current.as_mut() {
            Some(root) => aggregate_ancestors(root, &path, policy, clock, listener),
            None => Ok(Status::New),
        });
        if let Err(e) = result {
            tracing::error!(?path, error = %e, "composite aggregation failed");
        }
    }

    async fn run_leaf(&self, run: &Run<B>, path: &[usize]) {
        if let Err(e) = self.transition_at(run, path, Status::Running, None) {
            tracing::error!(?path, error = %e, "leaf could not start");
            return;
        }
        let Some(atom) = run
            .queue
            .with_state(|state| state.current.as_ref()?.at_path(path).cloned())
        else {
            return;
        };

        let Some(executor) = self.executors.get(atom.type_tag()) else {
            let message = format!("no executor for type tag {}", atom.type_tag());
            tracing::warn!(atom_id = %atom.id(), "{message}");
            self.finish_leaf(run, path, Status::Failed, Some(&message));
            return;
        };

        let control = run.queue.control().clone();
        let mut checkpoint = LeafRun {
            engine: self,
            run,
            path,
        };
        let mut execution = executor.execute(&atom, &mut checkpoint);

        let first = tokio::select! {
            result = &mut execution => Ok(result),
            kind = control.stopped() => Err(kind),
        };
        // A stop gives the atom until the next checkpoint, bounded by the timeout
        let outcome = match first {
            Ok(result) => Ok(result),
            Err(kind) => tokio::time::timeout(self.config.stop_timeout, &mut execution)
                .await
                .map_err(|_| kind),
        };
        drop(execution);

        match outcome {
            Ok(Ok(())) => self.finish_leaf(run, path, Status::Complete, None),
            Ok(Err(ExecutionError::Interrupted(kind))) => {
                self.finish_leaf(run, path, kind.status(), Some(stop_message(kind)))
            }
            Ok(Err(e)) => {
                tracing::warn!(atom_id = %atom.id(), error = %e, "atom failed");
                self.finish_leaf(run, path, Status::Failed, Some(&e.to_string()));
            }
            Err(kind) => {
                let waited = self.config.stop_timeout;
                tracing::warn!(
                    atom_id = %atom.id(),
                    %kind,
                    waited_ms = waited.as_millis() as u64,
                    "atom did not acknowledge stop, forcing"
                );
                let message = format!("{} (forced after {}ms)", stop_message(kind), waited.as_millis());
                self.finish_leaf(run, path, kind.status(), Some(&message));
                *run.degraded.lock().unwrap_or_else(|e| e.into_inner()) =
                    Some(StopOutcome::Degraded {
                        kind,
                        atom_id: atom.id().clone(),
                        waited,
                    });
            }
        }
    }

    /// Move a leaf to its terminal status, resuming it first if it was paused
    fn finish_leaf(&self, run: &Run<B>, path: &[usize], status: Status, message: Option<&str>) {
        let paused = run.queue.with_state(|state| {
            state
                .current
                .as_ref()
                .and_then(|root| root.at_path(path))
                .is_some_and(|a| a.status() == Status::Paused)
        });
        if paused && matches!(status, Status::Complete | Status::Failed) {
            if let Err(e) = self.transition_at(run, path, Status::Running, None) {
                tracing::error!(?path, error = %e, "could not resume atom before finishing");
            }
        }
        if let Err(e) = self.transition_at(run, path, status, message) {
            tracing::error!(?path, error = %e, "could not finish atom");
        }
    }

    /// Transition the atom at `path` and re-aggregate its ancestors, under one lock
    fn transition_at(
        &self,
        run: &Run<B>,
        path: &[usize],
        status: Status,
        message: Option<&str>,
    ) -> Result<(), TransitionError> {
        let policy = self.config.failure_policy;
        run.queue.with_state(|state| {
            let Some(root) = state.current.as_mut() else {
                return Ok(());
            };
            root.transition_at(path, status, message, &self.clock, &run.listener)?;
            aggregate_ancestors(root, path, policy, &self.clock, &run.listener)?;
            Ok(())
        })
    }
}

/// Checkpoint handed to a leaf executor
struct LeafRun<'a, B, C> {
    engine: &'a Engine<B, C>,
    run: &'a Run<B>,
    path: &'a [usize],
}

#[async_trait]
impl<B: MessageBus, C: Clock> Checkpoint for LeafRun<'_, B, C> {
    async fn checkpoint(&mut self) -> Result<(), ExecutionError> {
        let control = self.run.queue.control();
        match control.signal() {
            Signal::Run => Ok(()),
            Signal::Stop(kind) => Err(ExecutionError::Interrupted(kind)),
            Signal::Pause => {
                if let Err(e) = self.engine.transition_at(self.run, self.path, Status::Paused, None) {
                    tracing::error!(error = %e, "could not pause atom");
                }
                self.run.queue.set_status(QueueStatus::Paused);
                tracing::info!(path = ?self.path, "paused at checkpoint");

                match control.released().await {
                    Signal::Stop(kind) => Err(ExecutionError::Interrupted(kind)),
                    _ => {
                        if let Err(e) =
                            self.engine
                                .transition_at(self.run, self.path, Status::Running, None)
                        {
                            tracing::error!(error = %e, "could not resume atom");
                        }
                        self.run.queue.set_status(QueueStatus::Running);
                        tracing::info!(path = ?self.path, "resumed");
                        Ok(())
                    }
                }
            }
        }
    }

    fn report_progress(&mut self, percent: f64) {
        let policy = self.engine.config.failure_policy;
        let clock = &self.engine.clock;
        let listener = &self.run.listener;
        let path = self.path;
        self.run.queue.with_state(|state| {
            let Some(root) = state.current.as_mut() else {
                return;
            };
            if let Err(e) = root.report_progress_at(path, percent, listener) {
                tracing::debug!(error = %e, "progress ignored");
                return;
            }
            if let Err(e) = aggregate_ancestors(root, path, policy, clock, listener) {
                tracing::error!(error = %e, "progress aggregation failed");
            }
        });
    }

    fn note(&mut self, message: &str) {
        let listener = &self.run.listener;
        let path = self.path;
        self.run.queue.with_state(|state| {
            if let Some(root) = state.current.as_mut() {
                if let Err(e) = root.note_at(path, message, listener) {
                    tracing::debug!(error = %e, "note ignored");
                }
            }
        });
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
