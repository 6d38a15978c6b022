// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Simulated positioner: instant moves within a travel range

use super::{PositionError, PositionSource};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct State {
    position: Vec<f64>,
    moves: Vec<Vec<f64>>,
    fault: Option<String>,
}

/// Positioner with no hardware behind it.
///
/// Readings are a deterministic function of position, so scan results are
/// reproducible.
#[derive(Clone, Debug)]
pub struct SimulatedPositioner {
    state: Arc<Mutex<State>>,
    limit: f64,
    settle: Duration,
}

impl Default for SimulatedPositioner {
    fn default() -> Self {
        Self::new(1_000.0)
    }
}

impl SimulatedPositioner {
    /// Positioner whose every axis travels within `-limit..=limit`
    pub fn new(limit: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            limit,
            settle: Duration::ZERO,
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn position(&self) -> Vec<f64> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .position
            .clone()
    }

    /// Every target reached, in order
    pub fn moves(&self) -> Vec<Vec<f64>> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .moves
            .clone()
    }

    /// Make every following move fail
    pub fn inject_fault(&self, reason: impl Into<String>) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).fault = Some(reason.into());
    }
}

#[async_trait]
impl PositionSource for SimulatedPositioner {
    async fn move_to(&self, target: &[f64]) -> Result<Vec<f64>, PositionError> {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(fault) = &state.fault {
                return Err(PositionError::Fault(fault.clone()));
            }
            if !state.position.is_empty() && state.position.len() != target.len() {
                return Err(PositionError::AxisCount {
                    expected: state.position.len(),
                    actual: target.len(),
                });
            }
            if target.iter().any(|v| v.abs() > self.limit) {
                return Err(PositionError::OutOfRange(target.to_vec()));
            }
            state.position = target.to_vec();
            state.moves.push(target.to_vec());
        }
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
        Ok(target.to_vec())
    }

    async fn acquire(&self) -> Result<f64, PositionError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(fault) = &state.fault {
            return Err(PositionError::Fault(fault.clone()));
        }
        Ok(state.position.iter().map(|v| v * v).sum::<f64>().sqrt())
    }
}
