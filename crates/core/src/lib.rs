// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! aq-core: atom model for the active queue
//!
//! This crate provides:
//! - The atom status state machine and the atom hierarchy (leaves and
//!   composite sub-tasks with ordered child queues)
//! - Composite status and progress aggregation
//! - The atom registry and JSON wire records
//! - Topic routing and the status journal

pub mod aggregate;
pub mod atom;
pub mod clock;
pub mod error;
pub mod events;
pub mod id;
pub mod kinds;
pub mod registry;
pub mod status;
pub mod subtask;

pub use aggregate::{aggregate, aggregate_ancestors, stop_tree, FailurePolicy};
pub use atom::{
    Atom, AtomBody, LeafAtom, StatusListener, StatusRecord, StatusRecorder, StatusSnapshot,
    Unobserved, SUB_TASK_TAG,
};
pub use clock::{Clock, FakeClock, SystemClock};
pub use error::{ConfigError, MarshalError, TransitionError};
pub use id::{AtomId, IdGen, SequentialIdGen, UuidIdGen};
pub use kinds::{
    DummyConfig, LeafKind, ScanConfig, ScanPoints, DUMMY_TAG, MAX_SCAN_POINTS, SCAN_TAG,
};
pub use registry::{AtomRecord, AtomRegistry};
pub use status::{Status, StopKind};
pub use subtask::SubTaskQueue;
