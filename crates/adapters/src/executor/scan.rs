// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor for ScanAtom: move, acquire, record, for every point

use super::{AtomExecutor, Checkpoint, ExecutionError};
use crate::position::PositionSource;
use crate::sink::{ResultSink, ScanSample};
use aq_core::{Atom, ScanConfig};
use async_trait::async_trait;

#[derive(Clone, Debug)]
pub struct ScanExecutor<P, S> {
    positioner: P,
    sink: S,
}

impl<P, S> ScanExecutor<P, S> {
    pub fn new(positioner: P, sink: S) -> Self {
        Self { positioner, sink }
    }
}

#[async_trait]
impl<P: PositionSource, S: ResultSink> AtomExecutor for ScanExecutor<P, S> {
    async fn execute(
        &self,
        atom: &Atom,
        checkpoint: &mut dyn Checkpoint,
    ) -> Result<(), ExecutionError> {
        let leaf = atom
            .leaf_body()
            .ok_or_else(|| ExecutionError::Config("not a leaf atom".to_string()))?;
        let config = ScanConfig::from_value(&leaf.config).map_err(ExecutionError::Config)?;
        let points = config.points();
        let total = points.len();

        for (index, target) in points.enumerate() {
            checkpoint.checkpoint().await?;
            let position = self.positioner.move_to(&target).await?;
            let value = self.positioner.acquire().await?;
            self.sink
                .record(&ScanSample {
                    atom_id: atom.id().clone(),
                    index,
                    position,
                    value,
                })
                .await?;
            checkpoint.report_progress((index + 1) as f64 * 100.0 / total as f64);
        }
        checkpoint.note(&format!("{total} points acquired"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::FakeCheckpoint;
    use crate::position::SimulatedPositioner;
    use crate::sink::FakeSink;
    use aq_core::StopKind;
    use serde_json::json;

    fn scan(config: serde_json::Value) -> Atom {
        Atom::leaf("s", "S", "ScanAtom", config)
    }

    #[tokio::test]
    async fn line_scan_visits_every_point() {
        let positioner = SimulatedPositioner::default();
        let sink = FakeSink::new();
        let executor = ScanExecutor::new(positioner.clone(), sink.clone());
        let mut cp = FakeCheckpoint::new();

        executor
            .execute(
                &scan(json!({"axis": "x", "start": 0.0, "stop": 2.0, "step": 1.0})),
                &mut cp,
            )
            .await
            .unwrap();

        assert_eq!(positioner.moves(), vec![vec![0.0], vec![1.0], vec![2.0]]);
        let samples = sink.samples();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[2].value, 2.0);
        assert_eq!(cp.progress().last(), Some(&100.0));
        assert_eq!(cp.notes(), vec!["3 points acquired".to_string()]);
    }

    #[tokio::test]
    async fn sink_failure_fails_the_scan() {
        let sink = FakeSink::new();
        sink.reject_from(1);
        let executor = ScanExecutor::new(SimulatedPositioner::default(), sink.clone());
        let err = executor
            .execute(
                &scan(json!({"positions": [[0.0], [1.0], [2.0]]})),
                &mut FakeCheckpoint::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Sink(_)));
        assert_eq!(sink.samples().len(), 1);
    }

    #[tokio::test]
    async fn abort_stops_before_next_move() {
        let positioner = SimulatedPositioner::default();
        let executor = ScanExecutor::new(positioner.clone(), FakeSink::new());
        let mut cp = FakeCheckpoint::new().interrupt_at(3, StopKind::Abort);
        let err = executor
            .execute(&scan(json!({"positions": [[0.0], [1.0], [2.0], [3.0]]})), &mut cp)
            .await
            .unwrap_err();
        assert_eq!(err, ExecutionError::Interrupted(StopKind::Abort));
        assert_eq!(positioner.moves().len(), 2);
    }
}
