// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pause/stop token shared by a queue's engine and its controllers
//!
//! Control requests arrive on other tasks; the engine only reacts at
//! checkpoints and between atoms. The first stop wins and is sticky until
//! the queue is started again.

use aq_core::StopKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Current control request for a queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    #[default]
    Run,
    Pause,
    Stop(StopKind),
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::Run => f.write_str("run"),
            Signal::Pause => f.write_str("pause"),
            Signal::Stop(kind) => write!(f, "stop ({kind})"),
        }
    }
}

/// Cloneable handle to one queue's control state
#[derive(Clone, Debug)]
pub struct ControlToken {
    tx: Arc<watch::Sender<Signal>>,
}

impl Default for ControlToken {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Signal::Run);
        Self { tx: Arc::new(tx) }
    }

    pub fn signal(&self) -> Signal {
        *self.tx.borrow()
    }

    pub fn stop_kind(&self) -> Option<StopKind> {
        match self.signal() {
            Signal::Stop(kind) => Some(kind),
            _ => None,
        }
    }

    /// Request a pause; false if already paused or stopping
    pub fn pause(&self) -> bool {
        self.tx.send_if_modified(|signal| {
            if *signal == Signal::Run {
                *signal = Signal::Pause;
                return true;
            }
            false
        })
    }

    /// Lift a pause; false if not paused
    pub fn resume(&self) -> bool {
        self.tx.send_if_modified(|signal| {
            if *signal == Signal::Pause {
                *signal = Signal::Run;
                return true;
            }
            false
        })
    }

    /// Request a stop; false if a stop was already requested
    pub fn stop(&self, kind: StopKind) -> bool {
        self.tx.send_if_modified(|signal| {
            if matches!(signal, Signal::Stop(_)) {
                return false;
            }
            *signal = Signal::Stop(kind);
            true
        })
    }

    /// Back to `Run` for a fresh start of the queue
    pub fn reset(&self) {
        self.tx.send_replace(Signal::Run);
    }

    /// Resolves once a stop has been requested
    pub async fn stopped(&self) -> StopKind {
        let mut rx = self.tx.subscribe();
        let signal = rx
            .wait_for(|s| matches!(s, Signal::Stop(_)))
            .await
            .map(|s| *s);
        match signal {
            Ok(Signal::Stop(kind)) => kind,
            // the sender lives as long as `self`, so this never resolves
            _ => std::future::pending().await,
        }
    }

    /// Wait out a pause; returns `Run` or the stop that ended it
    pub async fn released(&self) -> Signal {
        let mut rx = self.tx.subscribe();
        let signal = rx
            .wait_for(|s| *s != Signal::Pause)
            .await
            .map(|s| *s);
        signal.unwrap_or(Signal::Run)
    }
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
