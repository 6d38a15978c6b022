// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor for DummyAtom: timed steps, optional failure

use super::{AtomExecutor, Checkpoint, ExecutionError};
use aq_core::{Atom, DummyConfig};
use async_trait::async_trait;
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default)]
pub struct DummyExecutor;

#[async_trait]
impl AtomExecutor for DummyExecutor {
    async fn execute(
        &self,
        atom: &Atom,
        checkpoint: &mut dyn Checkpoint,
    ) -> Result<(), ExecutionError> {
        let leaf = atom
            .leaf_body()
            .ok_or_else(|| ExecutionError::Config("not a leaf atom".to_string()))?;
        let config = DummyConfig::from_value(&leaf.config).map_err(ExecutionError::Config)?;

        for step in 1..=config.steps {
            checkpoint.checkpoint().await?;
            if config.step_ms > 0 {
                tokio::time::sleep(Duration::from_millis(config.step_ms)).await;
            }
            if config.fail_at == Some(step) {
                return Err(ExecutionError::Failed(format!(
                    "step {step} of {} failed",
                    config.steps
                )));
            }
            checkpoint.report_progress(f64::from(step) * 100.0 / f64::from(config.steps));
        }
        Ok(())
    }
}
