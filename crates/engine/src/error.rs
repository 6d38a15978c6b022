// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the queue engine

use aq_adapters::BusError;
use aq_core::{AtomId, ConfigError, StopKind, TransitionError};
use std::time::Duration;
use thiserror::Error;

/// Errors returned by queue operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("queue {0} is already running")]
    AlreadyRunning(String),
    #[error("queue {0} is not running")]
    NotRunning(String),
    #[error("queue not found: {0}")]
    QueueNotFound(String),
    #[error("atom {atom_id} is already on queue {queue}")]
    DuplicateAtom { queue: String, atom_id: AtomId },
    #[error("atom {atom_id} on queue {queue} has not finished")]
    NotFinished { queue: String, atom_id: AtomId },
    #[error("transition error: {0}")]
    Transition(#[from] TransitionError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("bus error: {0}")]
    Bus(#[from] BusError),
    #[error("engine task for queue {queue} failed: {reason}")]
    Task { queue: String, reason: String },
}

/// How a stop request ended.
///
/// A degraded stop is reported, never fatal: the atom was forced terminal and
/// the queue moved on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// The in-flight atom reached a checkpoint in time (or nothing was running)
    Acknowledged(StopKind),
    /// The in-flight atom ignored the stop and was cut off after `waited`
    Degraded {
        kind: StopKind,
        atom_id: AtomId,
        waited: Duration,
    },
}

impl StopOutcome {
    pub fn kind(&self) -> StopKind {
        match self {
            StopOutcome::Acknowledged(kind) | StopOutcome::Degraded { kind, .. } => *kind,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StopOutcome::Degraded { .. })
    }
}
