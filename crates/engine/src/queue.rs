// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Active queues: ordered atoms waiting for, or under, one engine

use crate::control::{ControlToken, Signal};
use crate::error::EngineError;
use aq_core::{Atom, AtomId, AtomRecord, Clock, ConfigError, StatusListener, StopKind};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Lifecycle of a whole queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// Never started, or waiting for a new start
    #[default]
    Idle,
    Running,
    /// Suspended at a checkpoint or between atoms
    Paused,
    /// Ran out of atoms
    Drained,
    /// Stopped after a FAILED atom; later atoms are still queued
    Halted,
    Aborted,
    Terminated,
}

impl QueueStatus {
    pub fn for_stop(kind: StopKind) -> Self {
        match kind {
            StopKind::Abort => QueueStatus::Aborted,
            StopKind::Terminate => QueueStatus::Terminated,
        }
    }

    /// The stop that left a queue in this status, if any
    pub fn stopped_by(self) -> Option<StopKind> {
        match self {
            QueueStatus::Aborted => Some(StopKind::Abort),
            QueueStatus::Terminated => Some(StopKind::Terminate),
            _ => None,
        }
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            QueueStatus::Idle => "idle",
            QueueStatus::Running => "running",
            QueueStatus::Paused => "paused",
            QueueStatus::Drained => "drained",
            QueueStatus::Halted => "halted",
            QueueStatus::Aborted => "aborted",
            QueueStatus::Terminated => "terminated",
        })
    }
}

/// Point-in-time view of a queue, as returned by every control operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub name: String,
    pub status: QueueStatus,
    pub signal: Signal,
    pub pending: Vec<AtomRecord>,
    pub current: Option<AtomRecord>,
    pub finished: Vec<AtomRecord>,
}

#[derive(Debug, Default)]
pub(crate) struct QueueState {
    pub(crate) status: QueueStatus,
    pub(crate) pending: VecDeque<Atom>,
    /// Top-level atom being executed; nested atoms are reached by index path
    pub(crate) current: Option<Atom>,
    pub(crate) finished: Vec<Atom>,
    /// Epoch of the claim that owns the queue
    owner: Option<u64>,
    epochs: u64,
}

impl QueueState {
    /// Give up the ownership taken under `epoch`, leaving the queue in
    /// `status`. A stale epoch changes nothing.
    pub(crate) fn release(&mut self, epoch: u64, status: QueueStatus) {
        if self.owner == Some(epoch) {
            self.owner = None;
            self.status = status;
        }
    }

    fn contains(&self, id: &AtomId) -> bool {
        self.pending
            .iter()
            .chain(self.current.iter())
            .chain(self.finished.iter())
            .any(|atom| atom.find(id).is_some())
    }
}

struct QueueInner {
    name: String,
    state: Mutex<QueueState>,
    control: ControlToken,
}

/// Shared handle to one named queue
#[derive(Clone)]
pub struct ActiveQueue {
    inner: Arc<QueueInner>,
}

impl std::fmt::Debug for ActiveQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveQueue")
            .field("name", &self.inner.name)
            .field("running", &self.is_running())
            .finish()
    }
}

impl ActiveQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                name: name.into(),
                state: Mutex::new(QueueState::default()),
                control: ControlToken::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn control(&self) -> &ControlToken {
        &self.inner.control
    }

    /// Whether an engine currently owns this queue
    pub fn is_running(&self) -> bool {
        self.with_state(|state| state.owner.is_some())
    }

    pub fn status(&self) -> QueueStatus {
        self.with_state(|state| state.status)
    }

    pub(crate) fn set_status(&self, status: QueueStatus) {
        self.with_state(|state| state.status = status);
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut QueueState) -> R) -> R {
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    /// Take exclusive ownership for one engine run
    pub fn claim(&self) -> Result<QueueClaim, EngineError> {
        let epoch = self.with_state(|state| {
            if state.owner.is_some() {
                return Err(EngineError::AlreadyRunning(self.name().to_string()));
            }
            state.epochs += 1;
            state.owner = Some(state.epochs);
            state.status = QueueStatus::Running;
            self.control().reset();
            Ok(state.epochs)
        })?;
        Ok(QueueClaim {
            queue: self.clone(),
            epoch,
        })
    }

    /// Put a NEW atom at the back of the queue, marking its tree SUBMITTED
    pub fn submit(
        &self,
        mut atom: Atom,
        clock: &impl Clock,
        listener: &dyn StatusListener,
    ) -> Result<(), EngineError> {
        self.with_state(|state| {
            let mut duplicate = None;
            atom.visit(&mut |a| {
                if duplicate.is_none() && state.contains(a.id()) {
                    duplicate = Some(a.id().clone());
                }
            });
            if let Some(atom_id) = duplicate {
                return Err(EngineError::DuplicateAtom {
                    queue: self.name().to_string(),
                    atom_id,
                });
            }
            atom.submit(clock, listener)?;
            tracing::info!(queue = self.name(), atom_id = %atom.id(), "atom submitted");
            state.pending.push_back(atom);
            Ok(())
        })
    }

    /// Remove a not-yet-started atom, at any depth, from this queue
    pub fn remove_atom(&self, id: &AtomId) -> Result<Atom, EngineError> {
        self.with_state(|state| {
            if let Some(index) = state.pending.iter().position(|a| a.id() == id) {
                if let Some(atom) = state.pending.remove(index) {
                    return Ok(atom);
                }
            }
            for atom in state.pending.iter_mut().chain(state.current.iter_mut()) {
                if atom.id() == id {
                    return Err(ConfigError::Protected {
                        id: id.clone(),
                        status: atom.status(),
                    }
                    .into());
                }
                match atom.remove_descendant(id) {
                    Err(ConfigError::NotFound(_)) | Err(ConfigError::NotComposite(_)) => {}
                    other => return other.map_err(EngineError::from),
                }
            }
            if let Some(atom) = state.finished.iter().find_map(|a| a.find(id)) {
                return Err(ConfigError::Protected {
                    id: id.clone(),
                    status: atom.status(),
                }
                .into());
            }
            Err(ConfigError::NotFound(id.clone()).into())
        })
    }

    /// Copy of a finished atom (top level or nested) for resubmission
    pub fn finished_atom(&self, id: &AtomId) -> Result<Atom, EngineError> {
        self.with_state(|state| {
            if let Some(atom) = state.finished.iter().find_map(|a| a.find(id)) {
                return Ok(atom.clone());
            }
            if state.contains(id) {
                return Err(EngineError::NotFinished {
                    queue: self.name().to_string(),
                    atom_id: id.clone(),
                });
            }
            Err(ConfigError::NotFound(id.clone()).into())
        })
    }

    /// Stop the queue. An owning engine is signalled and settles the atoms
    /// itself; otherwise every waiting atom is stopped without running.
    pub(crate) fn stop(
        &self,
        kind: StopKind,
        clock: &impl Clock,
        listener: &dyn StatusListener,
    ) -> StopRequest {
        self.with_state(|state| {
            if state.owner.is_some() {
                return StopRequest::Signalled(self.control().stop(kind));
            }
            let mut stopped = 0;
            while let Some(mut atom) = state.pending.pop_front() {
                stopped += atom.stop_pending(kind.status(), Some(stop_message(kind)), clock, listener);
                state.finished.push(atom);
            }
            if stopped > 0 {
                state.status = QueueStatus::for_stop(kind);
            }
            StopRequest::Settled(stopped)
        })
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let signal = self.control().signal();
        self.with_state(|state| QueueSnapshot {
            name: self.name().to_string(),
            status: state.status,
            signal,
            pending: state.pending.iter().map(AtomRecord::from).collect(),
            current: state.current.as_ref().map(AtomRecord::from),
            finished: state.finished.iter().map(AtomRecord::from).collect(),
        })
    }
}

/// Outcome of [`ActiveQueue::stop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopRequest {
    /// An engine owns the queue; `false` when an earlier stop was already pending
    Signalled(bool),
    /// No engine owned the queue; this many atoms were stopped in place
    Settled(usize),
}

pub(crate) fn stop_message(kind: StopKind) -> &'static str {
    match kind {
        StopKind::Abort => "aborted by operator",
        StopKind::Terminate => "terminated by operator",
    }
}

/// Exclusive right to drive a queue; released on drop
pub struct QueueClaim {
    queue: ActiveQueue,
    epoch: u64,
}

impl QueueClaim {
    pub fn queue(&self) -> &ActiveQueue {
        &self.queue
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl Drop for QueueClaim {
    fn drop(&mut self) {
        let epoch = self.epoch;
        self.queue.with_state(|state| {
            if state.owner == Some(epoch) {
                state.owner = None;
            }
        });
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
