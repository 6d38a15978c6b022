// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for the queue's outside world: status bus, leaf executors,
//! positioners and result sinks

pub mod bus;
pub mod executor;
pub mod position;
pub mod sink;
pub mod traced;

pub use bus::{BusError, LocalBus, MessageBus};
pub use executor::{AtomExecutor, Checkpoint, DummyExecutor, ExecutionError, ScanExecutor};
pub use position::{PositionError, PositionSource, SimulatedPositioner};
pub use sink::{JsonlSink, ResultSink, ScanSample, SinkError};
pub use traced::{TracedBus, TracedExecutor};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use bus::FakeBus;
#[cfg(any(test, feature = "test-support"))]
pub use executor::{CheckpointCall, FakeCheckpoint, Script, ScriptedExecutor};
#[cfg(any(test, feature = "test-support"))]
pub use sink::FakeSink;
