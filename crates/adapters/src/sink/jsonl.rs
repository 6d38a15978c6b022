// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSONL result file

use super::{ResultSink, ScanSample, SinkError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Writes one JSON sample per line
#[derive(Clone, Debug)]
pub struct JsonlSink {
    path: Arc<PathBuf>,
    // serializes appends so lines never interleave
    write_lock: Arc<Mutex<()>>,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ResultSink for JsonlSink {
    async fn record(&self, sample: &ScanSample) -> Result<(), SinkError> {
        let mut line = serde_json::to_string(sample).map_err(|e| SinkError::Rejected(e.to_string()))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path.as_path())
            .await
            .map_err(|e| SinkError::Io(e.to_string()))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| SinkError::Io(e.to_string()))?;
        file.flush().await.map_err(|e| SinkError::Io(e.to_string()))
    }
}
