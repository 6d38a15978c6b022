// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake executor and checkpoint for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{AtomExecutor, Checkpoint, ExecutionError};
use aq_core::{Atom, AtomId, StopKind};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Recorded checkpoint call
#[derive(Debug, Clone, PartialEq)]
pub enum CheckpointCall {
    Checkpoint,
    Progress(f64),
    Note(String),
}

/// Checkpoint that records calls and can interrupt at the n-th checkpoint
#[derive(Debug, Default)]
pub struct FakeCheckpoint {
    calls: Vec<CheckpointCall>,
    interrupt: Option<(usize, StopKind)>,
}

impl FakeCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`-th (1-based) checkpoint with `kind`
    pub fn interrupt_at(mut self, n: usize, kind: StopKind) -> Self {
        self.interrupt = Some((n, kind));
        self
    }

    pub fn calls(&self) -> &[CheckpointCall] {
        &self.calls
    }

    pub fn checkpoints(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, CheckpointCall::Checkpoint))
            .count()
    }

    pub fn progress(&self) -> Vec<f64> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                CheckpointCall::Progress(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    pub fn notes(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                CheckpointCall::Note(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Checkpoint for FakeCheckpoint {
    async fn checkpoint(&mut self) -> Result<(), ExecutionError> {
        self.calls.push(CheckpointCall::Checkpoint);
        match self.interrupt {
            Some((n, kind)) if self.checkpoints() >= n => Err(ExecutionError::Interrupted(kind)),
            _ => Ok(()),
        }
    }

    fn report_progress(&mut self, percent: f64) {
        self.calls.push(CheckpointCall::Progress(percent));
    }

    fn note(&mut self, message: &str) {
        self.calls.push(CheckpointCall::Note(message.to_string()));
    }
}

/// Behaviour of one atom under [`ScriptedExecutor`]
#[derive(Debug, Clone, PartialEq)]
pub enum Script {
    /// Checkpoint `steps` times, then succeed
    Complete { steps: u32 },
    /// Checkpoint `after` times, then fail
    Fail { after: u32, reason: String },
    /// Never checkpoint and never return
    Hang,
}

impl Default for Script {
    fn default() -> Self {
        Script::Complete { steps: 1 }
    }
}

/// Decrements the running count even when the execution is cancelled
struct RunningGuard(Arc<AtomicUsize>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Executor whose behaviour is scripted per atom id.
///
/// When gated, every step waits for a permit from [`ScriptedExecutor::release`]
/// before checkpointing, so tests can hold an atom mid-run.
#[derive(Clone, Default)]
pub struct ScriptedExecutor {
    scripts: Arc<Mutex<HashMap<AtomId, Script>>>,
    gate: Option<Arc<Semaphore>>,
    started: Arc<Mutex<Vec<AtomId>>>,
    running: Arc<AtomicUsize>,
    max_running: Arc<AtomicUsize>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor whose steps only proceed when released
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    pub fn script(&self, id: &str, script: Script) -> &Self {
        self.scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(AtomId::from(id), script);
        self
    }

    /// Let `steps` more gated steps proceed
    pub fn release(&self, steps: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(steps);
        }
    }

    /// Atom ids in the order they started executing
    pub fn started(&self) -> Vec<AtomId> {
        self.started.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Highest number of executions that were ever in flight together
    pub fn max_concurrent(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` executions have started
    pub async fn wait_started(&self, count: usize) {
        loop {
            let started = self.started.lock().unwrap_or_else(|e| e.into_inner()).len();
            if started >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    async fn step(&self, checkpoint: &mut dyn Checkpoint) -> Result<(), ExecutionError> {
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| ExecutionError::Failed(e.to_string()))?
                .forget();
        }
        checkpoint.checkpoint().await
    }
}

#[async_trait]
impl AtomExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        atom: &Atom,
        checkpoint: &mut dyn Checkpoint,
    ) -> Result<(), ExecutionError> {
        self.started
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(atom.id().clone());
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        let _running = RunningGuard(Arc::clone(&self.running));

        let script = self
            .scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(atom.id())
            .cloned()
            .unwrap_or_default();

        match script {
            Script::Complete { steps } => {
                for i in 1..=steps {
                    self.step(checkpoint).await?;
                    checkpoint.report_progress(f64::from(i) * 100.0 / f64::from(steps));
                }
                Ok(())
            }
            Script::Fail { after, reason } => {
                for _ in 0..after {
                    self.step(checkpoint).await?;
                }
                Err(ExecutionError::Failed(reason))
            }
            Script::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
