// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composite status aggregation
//!
//! A composite never decides its own COMPLETE, FAILED or PAUSED status: it is
//! derived from the children after every child change. Rules, first match
//! wins:
//!
//! - no children, or every child COMPLETE: COMPLETE
//! - a FAILED child under [`FailurePolicy::CascadeAbort`]: not-yet-started
//!   siblings become ABORTED and the composite FAILED
//! - a FAILED child under [`FailurePolicy::ContinueOnFailure`]: FAILED once
//!   every child is terminal
//! - an ABORTED or TERMINATED child: pending siblings get the same tag and
//!   the composite follows (TERMINATED wins over ABORTED)
//! - any RUNNING child: RUNNING, otherwise any PAUSED child: PAUSED
//!
//! Progress is the mean of child progress and never decreases while the
//! composite is unfinished.

use crate::atom::{Atom, StatusListener};
use crate::clock::Clock;
use crate::error::TransitionError;
use crate::status::{Status, StopKind};
use crate::subtask::SubTaskQueue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a composite does when one of its children fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the remaining siblings and fail immediately
    #[default]
    CascadeAbort,
    /// Keep running siblings; fail once everything has finished
    ContinueOnFailure,
}

/// Status a composite should hold given its children, or `None` to keep
/// whatever it has (for example while every child is still pending).
pub fn derive_status(children: &SubTaskQueue, policy: FailurePolicy) -> Option<Status> {
    if children.iter().all(|c| c.status() == Status::Complete) {
        return Some(Status::Complete);
    }

    let has = |status: Status| children.iter().any(|c| c.status() == status);
    let all_terminal = children.iter().all(|c| c.status().is_terminal());

    if has(Status::Failed) {
        match policy {
            FailurePolicy::CascadeAbort => return Some(Status::Failed),
            FailurePolicy::ContinueOnFailure if all_terminal => return Some(Status::Failed),
            FailurePolicy::ContinueOnFailure => {}
        }
    }
    if has(Status::Running) {
        return Some(Status::Running);
    }
    if has(Status::Paused) {
        return Some(Status::Paused);
    }
    if has(Status::Terminated) {
        return Some(Status::Terminated);
    }
    if has(Status::Aborted) {
        return Some(Status::Aborted);
    }
    None
}

/// Mean of child progress; COMPLETE children count as 100
pub fn derive_percent(children: &SubTaskQueue) -> f64 {
    if children.is_empty() {
        return 100.0;
    }
    let total: f64 = children
        .iter()
        .map(|c| {
            if c.status() == Status::Complete {
                100.0
            } else {
                c.percent_complete()
            }
        })
        .sum();
    total / children.len() as f64
}

/// Recompute a composite's status and progress from its children.
///
/// Publishes a snapshot for every change (cascaded siblings first, then the
/// composite). Returns the composite's resulting status. Leaves and terminal
/// composites are returned unchanged.
pub fn aggregate(
    composite: &mut Atom,
    policy: FailurePolicy,
    clock: &impl Clock,
    listener: &dyn StatusListener,
) -> Result<Status, TransitionError> {
    aggregate_at(composite, policy, clock.now(), listener)
}

fn aggregate_at(
    composite: &mut Atom,
    policy: FailurePolicy,
    now: DateTime<Utc>,
    listener: &dyn StatusListener,
) -> Result<Status, TransitionError> {
    let current = composite.status();
    if current.is_terminal() {
        return Ok(current);
    }
    let Some(children) = composite.children() else {
        return Ok(current);
    };
    let derived = derive_status(children, policy);
    let percent = derive_percent(children);

    // Siblings that never started inherit the stop; failure cascades as ABORTED
    let cascade = match derived {
        Some(Status::Failed) => Some(Status::Aborted),
        Some(status @ (Status::Aborted | Status::Terminated)) => Some(status),
        _ => None,
    };
    if let (Some(cascade), Some(children)) = (cascade, composite.children_mut()) {
        for child in children.iter_mut() {
            child.stop_pending_at(cascade, None, now, listener);
        }
    }

    let percent_changed = composite.raise_progress(percent);

    match derived {
        Some(target) if target != current => {
            step_to(composite, target, now, listener)?;
        }
        _ if percent_changed => listener.status_changed(&composite.snapshot()),
        _ => {}
    }
    Ok(composite.status())
}

/// Move a composite to `target`, starting it first when the state machine
/// requires a RUNNING step in between (e.g. SUBMITTED -> COMPLETE for an
/// empty composite).
fn step_to(
    composite: &mut Atom,
    target: Status,
    now: DateTime<Utc>,
    listener: &dyn StatusListener,
) -> Result<(), TransitionError> {
    let current = composite.status();
    if !current.can_transition_to(target)
        && current != Status::Running
        && current.can_transition_to(Status::Running)
    {
        composite.apply_status(Status::Running, None, now, listener)?;
    }
    composite.apply_status(target, None, now, listener)
}

/// Re-aggregate every composite on `path` (child indices from `root`),
/// deepest first, ending with `root` itself.
pub fn aggregate_ancestors(
    root: &mut Atom,
    path: &[usize],
    policy: FailurePolicy,
    clock: &impl Clock,
    listener: &dyn StatusListener,
) -> Result<Status, TransitionError> {
    let now = clock.now();
    for depth in (0..=path.len()).rev() {
        if let Some(atom) = root.at_path_mut(&path[..depth]) {
            if atom.is_composite() {
                aggregate_at(atom, policy, now, listener)?;
            }
        }
    }
    Ok(root.status())
}

/// Force a stopped tree terminal: active leaves take the stop status,
/// untouched atoms are stopped without running, composites aggregate last.
pub fn stop_tree(
    atom: &mut Atom,
    kind: StopKind,
    message: Option<&str>,
    policy: FailurePolicy,
    clock: &impl Clock,
    listener: &dyn StatusListener,
) -> Result<Status, TransitionError> {
    stop_tree_at(atom, kind, message, policy, clock.now(), listener)
}

fn stop_tree_at(
    atom: &mut Atom,
    kind: StopKind,
    message: Option<&str>,
    policy: FailurePolicy,
    now: DateTime<Utc>,
    listener: &dyn StatusListener,
) -> Result<Status, TransitionError> {
    let status = atom.status();
    if status.is_terminal() {
        return Ok(status);
    }
    if status.is_pending() {
        atom.stop_pending_at(kind.status(), message, now, listener);
        return Ok(atom.status());
    }

    if let Some(children) = atom.children_mut() {
        for child in children.iter_mut() {
            stop_tree_at(child, kind, message, policy, now, listener)?;
        }
    }
    if atom.is_composite() {
        aggregate_at(atom, policy, now, listener)?;
    }
    if !atom.status().is_terminal() {
        atom.apply_status(kind.status(), message, now, listener)?;
    }
    Ok(atom.status())
}

#[cfg(test)]
#[path = "aggregate_tests.rs"]
mod tests;
