// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Active-queue execution engine

mod broadcast;
mod control;
mod engine;
mod error;
mod queue;
mod registry;

pub use broadcast::StatusBroadcaster;
pub use control::{ControlToken, Signal};
pub use engine::{Engine, EngineConfig, Executors, RunSummary};
pub use error::{EngineError, StopOutcome};
pub use queue::{ActiveQueue, QueueClaim, QueueSnapshot, QueueStatus};
pub use registry::QueueRegistry;
