// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake sink for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ResultSink, ScanSample, SinkError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Records every sample; can reject from a given sample index on
#[derive(Clone, Default)]
pub struct FakeSink {
    samples: Arc<Mutex<Vec<ScanSample>>>,
    reject_from: Arc<Mutex<Option<usize>>>,
}

impl FakeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> Vec<ScanSample> {
        self.samples.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn reject_from(&self, index: usize) {
        *self.reject_from.lock().unwrap_or_else(|e| e.into_inner()) = Some(index);
    }
}

#[async_trait]
impl ResultSink for FakeSink {
    async fn record(&self, sample: &ScanSample) -> Result<(), SinkError> {
        let reject_from = *self.reject_from.lock().unwrap_or_else(|e| e.into_inner());
        if reject_from.is_some_and(|from| sample.index >= from) {
            return Err(SinkError::Rejected(format!("sample {}", sample.index)));
        }
        self.samples
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(sample.clone());
        Ok(())
    }
}
