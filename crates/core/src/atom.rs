// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atoms: the unit of queued work
//!
//! Every atom carries a [`StatusRecord`] (identity, status, progress and
//! timestamps) and a body that is either a leaf with kind-specific
//! configuration or a composite ("sub-task") owning an ordered queue of
//! child atoms. The engine never keeps side tables: it mutates the atom's own
//! record, so every published [`StatusSnapshot`] is self-describing.

use crate::clock::Clock;
use crate::error::{ConfigError, TransitionError};
use crate::id::{AtomId, IdGen};
use crate::status::{Status, StopKind};
use crate::subtask::SubTaskQueue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Type tag of composite atoms
pub const SUB_TASK_TAG: &str = "SubTaskAtom";

/// Full status view of one atom, as published on the status topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub id: AtomId,
    pub type_tag: String,
    pub name: String,
    pub status: Status,
    pub previous_status: Status,
    pub message: String,
    pub percent_complete: f64,
    pub submit_time: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Receives a snapshot after every status or progress mutation.
///
/// Called synchronously, before the mutating call returns.
pub trait StatusListener: Send + Sync {
    fn status_changed(&self, snapshot: &StatusSnapshot);
}

/// Listener for atoms nobody is watching yet (built before submission)
#[derive(Debug, Clone, Copy, Default)]
pub struct Unobserved;

impl StatusListener for Unobserved {
    fn status_changed(&self, _snapshot: &StatusSnapshot) {}
}

/// Listener that keeps every snapshot it sees, in order
#[derive(Debug, Default)]
pub struct StatusRecorder {
    seen: Mutex<Vec<StatusSnapshot>>,
}

impl StatusRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<StatusSnapshot> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Statuses published for one atom, in publication order
    pub fn statuses_of(&self, id: &AtomId) -> Vec<Status> {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|s| &s.id == id)
            .map(|s| s.status)
            .collect()
    }
}

impl StatusListener for StatusRecorder {
    fn status_changed(&self, snapshot: &StatusSnapshot) {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(snapshot.clone());
    }
}

/// The nameable, status-bearing part shared by every atom
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRecord {
    id: AtomId,
    name: String,
    status: Status,
    previous_status: Status,
    message: String,
    percent_complete: f64,
    submit_time: Option<DateTime<Utc>>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
}

impl StatusRecord {
    pub fn new(id: AtomId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: Status::New,
            previous_status: Status::New,
            message: String::new(),
            percent_complete: 0.0,
            submit_time: None,
            start_time: None,
            end_time: None,
        }
    }

    /// Rebuild a record from its wire fields
    pub(crate) fn restore(
        id: AtomId,
        name: String,
        status: Status,
        previous_status: Status,
        message: String,
        percent_complete: f64,
        times: [Option<DateTime<Utc>>; 3],
    ) -> Self {
        let [submit_time, start_time, end_time] = times;
        Self {
            id,
            name,
            status,
            previous_status,
            message,
            percent_complete,
            submit_time,
            start_time,
            end_time,
        }
    }

    pub fn id(&self) -> &AtomId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn previous_status(&self) -> Status {
        self.previous_status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn percent_complete(&self) -> f64 {
        self.percent_complete
    }

    pub fn submit_time(&self) -> Option<DateTime<Utc>> {
        self.submit_time
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    fn ensure_mutable(&self) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::Terminal {
                id: self.id.clone(),
                status: self.status,
            });
        }
        Ok(())
    }

    fn append_message(&mut self, message: &str) {
        if message.is_empty() {
            return;
        }
        if !self.message.is_empty() {
            self.message.push('\n');
        }
        self.message.push_str(message);
    }

    fn apply(
        &mut self,
        next: Status,
        message: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.status.check_transition(&self.id, next)?;

        self.previous_status = self.status;
        self.status = next;
        if let Some(message) = message {
            self.append_message(message);
        }

        match next {
            Status::Submitted => self.submit_time = Some(now),
            Status::Running if self.start_time.is_none() => self.start_time = Some(now),
            _ => {}
        }
        if next == Status::Complete {
            self.percent_complete = 100.0;
        }
        if next.is_terminal() {
            self.end_time = Some(now);
        }
        Ok(())
    }

    fn report_progress(&mut self, percent: f64) -> Result<bool, TransitionError> {
        if self.status != Status::Running {
            return Err(TransitionError::NotRunning {
                id: self.id.clone(),
                status: self.status,
            });
        }
        // NaN fails this comparison as well
        if !(percent >= self.percent_complete) {
            return Err(TransitionError::ProgressRegression {
                id: self.id.clone(),
                current: self.percent_complete,
                requested: percent,
            });
        }
        let percent = percent.min(100.0);
        let changed = percent > self.percent_complete;
        self.percent_complete = percent;
        Ok(changed)
    }

    /// Derived progress only ever moves forward and is frozen once terminal
    fn raise_progress(&mut self, percent: f64) -> bool {
        if self.status.is_terminal() || !(percent > self.percent_complete) {
            return false;
        }
        self.percent_complete = percent.min(100.0);
        true
    }
}

/// Kind-specific part of a leaf atom
#[derive(Debug, Clone, PartialEq)]
pub struct LeafAtom {
    pub type_tag: String,
    pub config: serde_json::Value,
}

/// What an atom is: directly executable, or a queue of child atoms
#[derive(Debug, Clone, PartialEq)]
pub enum AtomBody {
    Leaf(LeafAtom),
    SubTask(SubTaskQueue),
}

/// A unit of queued, executable work
#[derive(Debug, Clone)]
pub struct Atom {
    record: StatusRecord,
    body: AtomBody,
}

impl Atom {
    /// Create a NEW leaf atom of the given kind
    pub fn leaf(
        id: impl Into<AtomId>,
        name: impl Into<String>,
        type_tag: impl Into<String>,
        config: serde_json::Value,
    ) -> Self {
        Self {
            record: StatusRecord::new(id.into(), name),
            body: AtomBody::Leaf(LeafAtom {
                type_tag: type_tag.into(),
                config,
            }),
        }
    }

    /// Create a NEW, empty composite atom
    pub fn sub_task(id: impl Into<AtomId>, name: impl Into<String>) -> Self {
        Self {
            record: StatusRecord::new(id.into(), name),
            body: AtomBody::SubTask(SubTaskQueue::new()),
        }
    }

    pub(crate) fn from_parts(record: StatusRecord, body: AtomBody) -> Self {
        Self { record, body }
    }

    pub fn id(&self) -> &AtomId {
        self.record.id()
    }

    pub fn name(&self) -> &str {
        self.record.name()
    }

    pub fn status(&self) -> Status {
        self.record.status()
    }

    pub fn percent_complete(&self) -> f64 {
        self.record.percent_complete()
    }

    pub fn record(&self) -> &StatusRecord {
        &self.record
    }

    pub fn body(&self) -> &AtomBody {
        &self.body
    }

    pub fn type_tag(&self) -> &str {
        match &self.body {
            AtomBody::Leaf(leaf) => &leaf.type_tag,
            AtomBody::SubTask(_) => SUB_TASK_TAG,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.body, AtomBody::SubTask(_))
    }

    pub fn leaf_body(&self) -> Option<&LeafAtom> {
        match &self.body {
            AtomBody::Leaf(leaf) => Some(leaf),
            AtomBody::SubTask(_) => None,
        }
    }

    /// The ordered child queue, for composites
    pub fn children(&self) -> Option<&SubTaskQueue> {
        match &self.body {
            AtomBody::SubTask(queue) => Some(queue),
            AtomBody::Leaf(_) => None,
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut SubTaskQueue> {
        match &mut self.body {
            AtomBody::SubTask(queue) => Some(queue),
            AtomBody::Leaf(_) => None,
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let r = &self.record;
        StatusSnapshot {
            id: r.id.clone(),
            type_tag: self.type_tag().to_string(),
            name: r.name.clone(),
            status: r.status,
            previous_status: r.previous_status,
            message: r.message.clone(),
            percent_complete: r.percent_complete,
            submit_time: r.submit_time,
            start_time: r.start_time,
            end_time: r.end_time,
        }
    }

    /// Rename the atom; terminal atoms are read-only
    pub fn rename(&mut self, name: impl Into<String>) -> Result<(), TransitionError> {
        self.record.ensure_mutable()?;
        self.record.name = name.into();
        Ok(())
    }

    /// Append a progress note without changing status
    pub fn note(
        &mut self,
        message: &str,
        listener: &dyn StatusListener,
    ) -> Result<(), TransitionError> {
        self.record.ensure_mutable()?;
        self.record.append_message(message);
        listener.status_changed(&self.snapshot());
        Ok(())
    }

    /// Move this leaf to `next` and publish the new snapshot.
    ///
    /// A composite's status is derived from its children (see
    /// [`crate::aggregate`]); the only ways to stop one directly are
    /// [`Atom::stop_pending`] and [`crate::aggregate::stop_tree`].
    pub fn transition(
        &mut self,
        next: Status,
        message: Option<&str>,
        clock: &impl Clock,
        listener: &dyn StatusListener,
    ) -> Result<(), TransitionError> {
        if self.is_composite() {
            return Err(TransitionError::Derived {
                id: self.id().clone(),
                to: next,
            });
        }
        self.apply_status(next, message, clock.now(), listener)
    }

    pub(crate) fn apply_status(
        &mut self,
        next: Status,
        message: Option<&str>,
        now: DateTime<Utc>,
        listener: &dyn StatusListener,
    ) -> Result<(), TransitionError> {
        let from = self.record.status;
        self.record.apply(next, message, now)?;
        tracing::debug!(atom_id = %self.id(), %from, to = %next, "status transition");
        listener.status_changed(&self.snapshot());
        Ok(())
    }

    /// Report leaf progress; only allowed while RUNNING and never backwards
    pub fn report_progress(
        &mut self,
        percent: f64,
        listener: &dyn StatusListener,
    ) -> Result<(), TransitionError> {
        if self.is_composite() {
            return Err(TransitionError::Derived {
                id: self.id().clone(),
                to: self.status(),
            });
        }
        if self.record.report_progress(percent)? {
            listener.status_changed(&self.snapshot());
        }
        Ok(())
    }

    pub(crate) fn raise_progress(&mut self, percent: f64) -> bool {
        self.record.raise_progress(percent)
    }

    /// Mark this atom and its whole subtree SUBMITTED
    pub fn submit(
        &mut self,
        clock: &impl Clock,
        listener: &dyn StatusListener,
    ) -> Result<(), TransitionError> {
        if self.status() != Status::New {
            return Err(TransitionError::Invalid {
                id: self.id().clone(),
                from: self.status(),
                to: Status::Submitted,
            });
        }
        self.submit_tree(clock.now(), listener)
    }

    fn submit_tree(
        &mut self,
        now: DateTime<Utc>,
        listener: &dyn StatusListener,
    ) -> Result<(), TransitionError> {
        if self.status() == Status::New {
            self.apply_status(Status::Submitted, None, now, listener)?;
        }
        if let Some(children) = self.children_mut() {
            for child in children.iter_mut() {
                child.submit_tree(now, listener)?;
            }
        }
        Ok(())
    }

    /// Stop every not-yet-started atom in this subtree without running it.
    ///
    /// Children are marked before their parent. Returns how many atoms were
    /// stopped.
    pub fn stop_pending(
        &mut self,
        status: Status,
        message: Option<&str>,
        clock: &impl Clock,
        listener: &dyn StatusListener,
    ) -> usize {
        self.stop_pending_at(status, message, clock.now(), listener)
    }

    pub(crate) fn stop_pending_at(
        &mut self,
        status: Status,
        message: Option<&str>,
        now: DateTime<Utc>,
        listener: &dyn StatusListener,
    ) -> usize {
        if !self.status().is_pending() {
            return 0;
        }
        let mut stopped = 0;
        if let Some(children) = self.children_mut() {
            for child in children.iter_mut() {
                stopped += child.stop_pending_at(status, message, now, listener);
            }
        }
        if self.apply_status(status, message, now, listener).is_ok() {
            stopped += 1;
        }
        stopped
    }

    /// Append a child to this composite.
    ///
    /// Fails without touching either atom if this atom is not a composite,
    /// is terminal, or would end up (transitively) containing itself.
    pub fn append(&mut self, child: Atom) -> Result<(), ConfigError> {
        let id = self.id().clone();
        let status = self.status();
        if child.id() == &id || child.contains(&id) {
            return Err(ConfigError::Cycle {
                parent: id,
                child: child.id().clone(),
            });
        }
        let Some(children) = self.children_mut() else {
            return Err(ConfigError::NotComposite(id));
        };
        if status.is_terminal() {
            return Err(ConfigError::TerminalComposite { id, status });
        }
        children.push(child);
        Ok(())
    }

    /// Remove the first not-yet-started direct child with this identifier
    pub fn remove_child(&mut self, id: &AtomId) -> Result<Atom, ConfigError> {
        let own_id = self.id().clone();
        let Some(children) = self.children_mut() else {
            return Err(ConfigError::NotComposite(own_id));
        };
        children.remove_pending(id)
    }

    /// Remove a not-yet-started atom anywhere below this one
    pub fn remove_descendant(&mut self, id: &AtomId) -> Result<Atom, ConfigError> {
        let own_id = self.id().clone();
        let Some(children) = self.children_mut() else {
            return Err(ConfigError::NotComposite(own_id));
        };
        match children.remove_pending(id) {
            Err(ConfigError::NotFound(_)) => {}
            other => return other,
        }
        for child in children.iter_mut().filter(|c| c.is_composite()) {
            match child.remove_descendant(id) {
                Err(ConfigError::NotFound(_)) => continue,
                other => return other,
            }
        }
        Err(ConfigError::NotFound(id.clone()))
    }

    /// Whether an atom with this identifier exists strictly below this one
    pub fn contains(&self, id: &AtomId) -> bool {
        self.children()
            .is_some_and(|children| children.iter().any(|c| c.id() == id || c.contains(id)))
    }

    /// Find this atom or a descendant by identifier (pre-order, first match)
    pub fn find(&self, id: &AtomId) -> Option<&Atom> {
        if self.id() == id {
            return Some(self);
        }
        self.children()?.iter().find_map(|c| c.find(id))
    }

    /// Navigate by child indices from this atom
    pub fn at_path(&self, path: &[usize]) -> Option<&Atom> {
        match path.split_first() {
            None => Some(self),
            Some((index, rest)) => self.children()?.get(*index)?.at_path(rest),
        }
    }

    pub(crate) fn at_path_mut(&mut self, path: &[usize]) -> Option<&mut Atom> {
        match path.split_first() {
            None => Some(self),
            Some((index, rest)) => self.children_mut()?.get_mut(*index)?.at_path_mut(rest),
        }
    }

    fn descendant_mut(&mut self, path: &[usize]) -> Result<&mut Atom, TransitionError> {
        let id = self.id().clone();
        self.at_path_mut(path).ok_or_else(|| TransitionError::NoSuchPath {
            id,
            path: path.to_vec(),
        })
    }

    /// [`Atom::transition`] for the leaf at `path` below this atom
    pub fn transition_at(
        &mut self,
        path: &[usize],
        next: Status,
        message: Option<&str>,
        clock: &impl Clock,
        listener: &dyn StatusListener,
    ) -> Result<(), TransitionError> {
        self.descendant_mut(path)?
            .transition(next, message, clock, listener)
    }

    /// [`Atom::report_progress`] for the leaf at `path` below this atom
    pub fn report_progress_at(
        &mut self,
        path: &[usize],
        percent: f64,
        listener: &dyn StatusListener,
    ) -> Result<(), TransitionError> {
        self.descendant_mut(path)?.report_progress(percent, listener)
    }

    /// [`Atom::note`] for the atom at `path` below this atom
    pub fn note_at(
        &mut self,
        path: &[usize],
        message: &str,
        listener: &dyn StatusListener,
    ) -> Result<(), TransitionError> {
        self.descendant_mut(path)?.note(message, listener)
    }

    /// Append `child` to the composite at `path` below this atom.
    ///
    /// Every atom on the path counts as an ancestor: none of their identifiers
    /// may appear in `child`'s subtree.
    pub fn append_at(&mut self, path: &[usize], child: Atom) -> Result<(), ConfigError> {
        let mut lineage = Vec::with_capacity(path.len() + 1);
        for depth in 0..=path.len() {
            let atom = self
                .at_path(&path[..depth])
                .ok_or_else(|| ConfigError::NoSuchPath {
                    id: self.id().clone(),
                    path: path.to_vec(),
                })?;
            lineage.push(atom.id().clone());
        }
        let nests_ancestor = lineage
            .iter()
            .any(|id| child.id() == id || child.contains(id));
        let root = self.id().clone();
        match self.at_path_mut(path) {
            Some(parent) if nests_ancestor => Err(ConfigError::Cycle {
                parent: parent.id().clone(),
                child: child.id().clone(),
            }),
            Some(parent) => parent.append(child),
            None => Err(ConfigError::NoSuchPath {
                id: root,
                path: path.to_vec(),
            }),
        }
    }

    /// Visit this atom and every descendant in pre-order
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Atom)) {
        f(self);
        if let Some(children) = self.children() {
            for child in children.iter() {
                child.visit(f);
            }
        }
    }

    /// Number of executable (leaf) atoms in this subtree with `status`
    pub fn count_leaves(&self, status: Status) -> usize {
        let mut count = 0;
        self.visit(&mut |atom| {
            if !atom.is_composite() && atom.status() == status {
                count += 1;
            }
        });
        count
    }

    /// Copy this atom as a brand-new submission: fresh identifiers, NEW status
    pub fn fresh_copy(&self, id_gen: &impl IdGen) -> Atom {
        let record = StatusRecord::new(id_gen.next_id(), self.name());
        let body = match &self.body {
            AtomBody::Leaf(leaf) => AtomBody::Leaf(leaf.clone()),
            AtomBody::SubTask(children) => AtomBody::SubTask(SubTaskQueue::from_children(
                children.iter().map(|c| c.fresh_copy(id_gen)).collect(),
            )),
        };
        Atom { record, body }
    }

    /// Terminal tag for atoms caught by a queue stop
    pub fn stop_status(kind: StopKind) -> Status {
        kind.status()
    }
}

/// Atoms are equal when identifier, name and body (leaf kind and
/// configuration, or the ordered children, recursively) are equal.
impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        self.record.id == other.record.id
            && self.record.name == other.record.name
            && self.body == other.body
    }
}

#[cfg(test)]
#[path = "atom_tests.rs"]
mod tests;
