// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atom registry and wire marshalling
//!
//! Atoms travel as [`AtomRecord`] JSON objects with camelCase keys. Leaves
//! carry a `config` object, composites a `children` array; a record never
//! has both. Decoding checks type tags, leaf configuration and acyclicity, so
//! anything an [`AtomRegistry`] returns can go straight onto a queue.

use crate::atom::{Atom, AtomBody, LeafAtom, StatusRecord, SUB_TASK_TAG};
use crate::error::{ConfigError, MarshalError};
use crate::id::AtomId;
use crate::kinds::{DummyKind, LeafKind, ScanKind};
use crate::status::Status;
use crate::subtask::SubTaskQueue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Serialized form of an atom tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomRecord {
    pub id: AtomId,
    pub type_tag: String,
    pub name: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub previous_status: Status,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub percent_complete: f64,
    #[serde(default)]
    pub submit_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<AtomRecord>>,
}

impl From<&Atom> for AtomRecord {
    fn from(atom: &Atom) -> Self {
        let r = atom.record();
        let (config, children) = match atom.body() {
            AtomBody::Leaf(leaf) => (Some(leaf.config.clone()), None),
            AtomBody::SubTask(queue) => (None, Some(queue.iter().map(AtomRecord::from).collect())),
        };
        AtomRecord {
            id: r.id().clone(),
            type_tag: atom.type_tag().to_string(),
            name: r.name().to_string(),
            status: r.status(),
            previous_status: r.previous_status(),
            message: r.message().to_string(),
            percent_complete: r.percent_complete(),
            submit_time: r.submit_time(),
            start_time: r.start_time(),
            end_time: r.end_time(),
            config,
            children,
        }
    }
}

/// Known leaf kinds, keyed by type tag
#[derive(Clone, Default)]
pub struct AtomRegistry {
    kinds: BTreeMap<String, Arc<dyn LeafKind>>,
}

impl std::fmt::Debug for AtomRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomRegistry")
            .field("kinds", &self.kinds.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AtomRegistry {
    /// Registry with no leaf kinds (composites are always known)
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in leaf kinds
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ScanKind);
        registry.register(DummyKind);
        registry
    }

    pub fn register(&mut self, kind: impl LeafKind + 'static) {
        self.kinds.insert(kind.type_tag().to_string(), Arc::new(kind));
    }

    pub fn is_known(&self, type_tag: &str) -> bool {
        type_tag == SUB_TASK_TAG || self.kinds.contains_key(type_tag)
    }

    pub fn type_tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.kinds.keys().map(String::as_str).collect();
        tags.push(SUB_TASK_TAG);
        tags
    }

    /// Check every leaf in an already-built tree
    pub fn validate(&self, atom: &Atom) -> Result<(), ConfigError> {
        let mut result = Ok(());
        atom.visit(&mut |a| {
            if result.is_err() {
                return;
            }
            if let Some(leaf) = a.leaf_body() {
                result = self.validate_leaf(a.id(), leaf);
            }
        });
        result
    }

    fn validate_leaf(&self, id: &AtomId, leaf: &LeafAtom) -> Result<(), ConfigError> {
        let Some(kind) = self.kinds.get(&leaf.type_tag) else {
            return Err(ConfigError::UnknownTypeTag(leaf.type_tag.clone()));
        };
        kind.validate(&leaf.config)
            .map_err(|reason| ConfigError::InvalidConfig {
                id: id.clone(),
                type_tag: leaf.type_tag.clone(),
                reason,
            })
    }

    pub fn marshal(&self, atom: &Atom) -> Result<String, MarshalError> {
        Ok(serde_json::to_string(&AtomRecord::from(atom))?)
    }

    pub fn unmarshal(&self, json: &str) -> Result<Atom, MarshalError> {
        let record: AtomRecord = serde_json::from_str(json)?;
        Ok(self.from_record(record)?)
    }

    /// Build and validate an atom tree from its record
    pub fn from_record(&self, record: AtomRecord) -> Result<Atom, ConfigError> {
        let atom = self.build(record)?;
        check_acyclic(&atom, &mut HashSet::new())?;
        Ok(atom)
    }

    fn build(&self, record: AtomRecord) -> Result<Atom, ConfigError> {
        let shape = |reason: &str| ConfigError::Shape {
            id: record.id.clone(),
            type_tag: record.type_tag.clone(),
            reason: reason.to_string(),
        };
        if !(0.0..=100.0).contains(&record.percent_complete) {
            return Err(shape("percentComplete must be within 0..=100"));
        }

        let body = if record.type_tag == SUB_TASK_TAG {
            if record.config.is_some() {
                return Err(shape("composites take no config"));
            }
            let Some(children) = record.children else {
                return Err(shape("composites need a children array"));
            };
            let children = children
                .into_iter()
                .map(|child| self.build(child))
                .collect::<Result<Vec<_>, _>>()?;
            AtomBody::SubTask(SubTaskQueue::from_children(children))
        } else {
            if record.children.is_some() {
                return Err(shape("leaf atoms cannot have children"));
            }
            let leaf = LeafAtom {
                type_tag: record.type_tag.clone(),
                config: record
                    .config
                    .unwrap_or_else(|| Value::Object(Default::default())),
            };
            self.validate_leaf(&record.id, &leaf)?;
            AtomBody::Leaf(leaf)
        };

        let status = StatusRecord::restore(
            record.id,
            record.name,
            record.status,
            record.previous_status,
            record.message,
            record.percent_complete,
            [record.submit_time, record.start_time, record.end_time],
        );
        Ok(Atom::from_parts(status, body))
    }
}

/// An atom may not appear inside its own subtree
fn check_acyclic(atom: &Atom, ancestors: &mut HashSet<AtomId>) -> Result<(), ConfigError> {
    let Some(children) = atom.children() else {
        return Ok(());
    };
    ancestors.insert(atom.id().clone());
    for child in children {
        if ancestors.contains(child.id()) {
            return Err(ConfigError::Cycle {
                parent: atom.id().clone(),
                child: child.id().clone(),
            });
        }
        check_acyclic(child, ancestors)?;
    }
    ancestors.remove(atom.id());
    Ok(())
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
