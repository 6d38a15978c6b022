// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Result sink adapter: where scan samples go

mod jsonl;

pub use jsonl::JsonlSink;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeSink;

use aq_core::AtomId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from sink operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(String),
    #[error("sink rejected sample: {0}")]
    Rejected(String),
}

/// One measurement taken by a scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSample {
    pub atom_id: AtomId,
    /// 0-based point index within the scan
    pub index: usize,
    pub position: Vec<f64>,
    pub value: f64,
}

#[async_trait]
pub trait ResultSink: Clone + Send + Sync + 'static {
    async fn record(&self, sample: &ScanSample) -> Result<(), SinkError>;
}
