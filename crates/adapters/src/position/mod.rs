// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Positioner adapter used by scans

mod simulated;

pub use simulated::SimulatedPositioner;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from positioner operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PositionError {
    #[error("expected {expected} axes, got {actual}")]
    AxisCount { expected: usize, actual: usize },
    #[error("position {0:?} is outside the travel range")]
    OutOfRange(Vec<f64>),
    #[error("positioner fault: {0}")]
    Fault(String),
}

/// Something that can move to a point and read back a measurement there
#[async_trait]
pub trait PositionSource: Clone + Send + Sync + 'static {
    /// Move to `target` and return the position actually reached
    async fn move_to(&self, target: &[f64]) -> Result<Vec<f64>, PositionError>;

    /// Acquire one reading at the current position
    async fn acquire(&self) -> Result<f64, PositionError>;
}
