// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the atom model

use crate::id::AtomId;
use crate::status::Status;
use thiserror::Error;

/// A rejected status or progress mutation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransitionError {
    #[error("atom {id}: invalid transition {from} -> {to}")]
    Invalid { id: AtomId, from: Status, to: Status },
    #[error("atom {id} is {status} and read-only")]
    Terminal { id: AtomId, status: Status },
    #[error("atom {id}: composite status {to} is derived from its children")]
    Derived { id: AtomId, to: Status },
    #[error("atom {id}: progress may not go from {current} to {requested}")]
    ProgressRegression {
        id: AtomId,
        current: f64,
        requested: f64,
    },
    #[error("atom {id}: progress reported while {status}")]
    NotRunning { id: AtomId, status: Status },
    #[error("atom {id} has no descendant at {path:?}")]
    NoSuchPath { id: AtomId, path: Vec<usize> },
}

/// Invalid atom composition, rejected before anything reaches the engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("inserting {child} into {parent} would create a cycle")]
    Cycle { parent: AtomId, child: AtomId },
    #[error("atom {0} is not a composite")]
    NotComposite(AtomId),
    #[error("composite {id} is {status} and accepts no more children")]
    TerminalComposite { id: AtomId, status: Status },
    #[error("atom {0} not found")]
    NotFound(AtomId),
    #[error("atom {id} has no descendant at {path:?}")]
    NoSuchPath { id: AtomId, path: Vec<usize> },
    #[error("atom {id} is {status} and cannot be removed")]
    Protected { id: AtomId, status: Status },
    #[error("unknown atom type tag: {0}")]
    UnknownTypeTag(String),
    #[error("{type_tag} atom {id}: {reason}")]
    InvalidConfig {
        id: AtomId,
        type_tag: String,
        reason: String,
    },
    #[error("{type_tag} atom {id}: {reason}")]
    Shape {
        id: AtomId,
        type_tag: String,
        reason: String,
    },
}

/// Failure to marshal or unmarshal an atom record
#[derive(Debug, Error)]
pub enum MarshalError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
