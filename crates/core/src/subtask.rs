// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered child queue owned by a composite atom

use crate::atom::Atom;
use crate::error::ConfigError;
use crate::id::AtomId;

/// Children of a composite, in insertion (execution) order.
///
/// Only the owning [`Atom`] can add children so the cycle and terminal
/// checks in [`Atom::append`] cannot be bypassed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubTaskQueue {
    children: Vec<Atom>,
}

impl SubTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_children(children: Vec<Atom>) -> Self {
        Self { children }
    }

    pub(crate) fn push(&mut self, child: Atom) {
        self.children.push(child);
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// First child that has not started yet
    pub fn peek_next(&self) -> Option<&Atom> {
        self.children.iter().find(|c| c.status().is_pending())
    }

    /// Most recently appended child
    pub fn peek_last(&self) -> Option<&Atom> {
        self.children.last()
    }

    pub fn get(&self, index: usize) -> Option<&Atom> {
        self.children.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Atom> {
        self.children.get_mut(index)
    }

    /// Children in order. Calling again restarts from the first child.
    pub fn iter(&self) -> std::slice::Iter<'_, Atom> {
        self.children.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Atom> {
        self.children.iter_mut()
    }

    /// Remove the first child with this identifier, provided it never started
    pub(crate) fn remove_pending(&mut self, id: &AtomId) -> Result<Atom, ConfigError> {
        let Some(index) = self.children.iter().position(|c| c.id() == id) else {
            return Err(ConfigError::NotFound(id.clone()));
        };
        let status = self.children[index].status();
        if !status.is_pending() {
            return Err(ConfigError::Protected {
                id: id.clone(),
                status,
            });
        }
        Ok(self.children.remove(index))
    }
}

impl<'a> IntoIterator for &'a SubTaskQueue {
    type Item = &'a Atom;
    type IntoIter = std::slice::Iter<'a, Atom>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
#[path = "subtask_tests.rs"]
mod tests;
