// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Leaf executors
//!
//! An [`AtomExecutor`] does the actual work of one leaf kind. It must call
//! [`Checkpoint::checkpoint`] between units of work: that is where a pause
//! blocks and where an abort or terminate surfaces as
//! [`ExecutionError::Interrupted`]. An executor that stops checkpointing can
//! only be cancelled by the engine's stop timeout.

mod dummy;
mod scan;

pub use dummy::DummyExecutor;
pub use scan::ScanExecutor;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{CheckpointCall, FakeCheckpoint, Script, ScriptedExecutor};

use crate::position::PositionError;
use crate::sink::SinkError;
use aq_core::{Atom, StopKind};
use async_trait::async_trait;
use thiserror::Error;

/// Why a leaf did not complete
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("interrupted by {0}")]
    Interrupted(StopKind),
    #[error("{0}")]
    Failed(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("positioner: {0}")]
    Position(#[from] PositionError),
    #[error("result sink: {0}")]
    Sink(#[from] SinkError),
}

/// The engine's side of a running leaf
#[async_trait]
pub trait Checkpoint: Send {
    /// Cooperative control point: waits out a pause, fails on a stop
    async fn checkpoint(&mut self) -> Result<(), ExecutionError>;

    /// Report progress in percent; values below the current one are ignored
    fn report_progress(&mut self, percent: f64);

    /// Append a line to the atom's status message
    fn note(&mut self, message: &str);
}

/// Runs leaf atoms of one kind
#[async_trait]
pub trait AtomExecutor: Send + Sync + 'static {
    async fn execute(
        &self,
        atom: &Atom,
        checkpoint: &mut dyn Checkpoint,
    ) -> Result<(), ExecutionError>;
}
