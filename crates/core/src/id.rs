// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atom identifiers and their generators

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Opaque, immutable identifier assigned to an atom at creation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AtomId(pub String);

impl AtomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AtomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AtomId {
    fn from(s: String) -> Self {
        AtomId(s)
    }
}

impl From<&str> for AtomId {
    fn from(s: &str) -> Self {
        AtomId(s.to_string())
    }
}

impl PartialEq<str> for AtomId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for AtomId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Generates unique atom identifiers
pub trait IdGen: Clone + Send + Sync {
    fn next_id(&self) -> AtomId;
}

/// UUID-based ID generator for production use
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next_id(&self) -> AtomId {
        AtomId(uuid::Uuid::new_v4().to_string())
    }
}

/// Sequential ID generator for testing
#[derive(Clone, Debug)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new("atom")
    }
}

impl IdGen for SequentialIdGen {
    fn next_id(&self) -> AtomId {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        AtomId(format!("{}-{}", self.prefix, n))
    }
}
