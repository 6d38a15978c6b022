// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atom status state machine
//!
//! ```text
//! NEW -> SUBMITTED -> RUNNING -> COMPLETE | FAILED | ABORTED | TERMINATED
//!                     RUNNING <-> PAUSED
//! NEW | SUBMITTED | PAUSED -> ABORTED | TERMINATED
//! ```
//!
//! Everything is forward-only apart from the RUNNING/PAUSED pair, and the
//! four terminal states are absorbing.

use crate::error::TransitionError;
use crate::id::AtomId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an atom
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    New,
    Submitted,
    Running,
    Paused,
    Complete,
    Failed,
    /// Stopped by a cascade after a failure, or by an operator abort
    Aborted,
    /// Operator-forced stop
    Terminated,
}

impl Status {
    /// Absorbing states: nothing may follow them
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Status::Complete | Status::Failed | Status::Aborted | Status::Terminated
        )
    }

    /// Queued but never started
    pub fn is_pending(self) -> bool {
        matches!(self, Status::New | Status::Submitted)
    }

    /// Started and not yet finished
    pub fn is_active(self) -> bool {
        matches!(self, Status::Running | Status::Paused)
    }

    pub fn can_transition_to(self, next: Status) -> bool {
        use Status::*;
        match self {
            New => matches!(next, Submitted | Running | Aborted | Terminated),
            Submitted => matches!(next, Running | Aborted | Terminated),
            Running => matches!(next, Paused | Complete | Failed | Aborted | Terminated),
            Paused => matches!(next, Running | Aborted | Terminated),
            Complete | Failed | Aborted | Terminated => false,
        }
    }

    /// Validate a transition for the atom `id`
    pub fn check_transition(self, id: &AtomId, next: Status) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::Terminal {
                id: id.clone(),
                status: self,
            });
        }
        if !self.can_transition_to(next) {
            return Err(TransitionError::Invalid {
                id: id.clone(),
                from: self,
                to: next,
            });
        }
        Ok(())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::New => "NEW",
            Status::Submitted => "SUBMITTED",
            Status::Running => "RUNNING",
            Status::Paused => "PAUSED",
            Status::Complete => "COMPLETE",
            Status::Failed => "FAILED",
            Status::Aborted => "ABORTED",
            Status::Terminated => "TERMINATED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Kind of stop requested against a running queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopKind {
    Abort,
    Terminate,
}

impl StopKind {
    /// Terminal status given to atoms caught by this stop
    pub fn status(self) -> Status {
        match self {
            StopKind::Abort => Status::Aborted,
            StopKind::Terminate => Status::Terminated,
        }
    }
}

impl fmt::Display for StopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopKind::Abort => f.write_str("abort"),
            StopKind::Terminate => f.write_str("terminate"),
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
