// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSONL journal of published status snapshots

use super::bus::BusMessage;
use super::subscription::TopicPattern;
use crate::atom::StatusSnapshot;
use crate::id::AtomId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// One journaled snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalRecord {
    /// Monotonic, 1-based, continues across reopen
    pub sequence: u64,
    pub recorded_at: DateTime<Utc>,
    pub topic: String,
    pub snapshot: StatusSnapshot,
}

/// Append-only status history, one JSON record per line
pub struct StatusJournal {
    path: PathBuf,
    sequence: u64,
}

fn invalid_data(e: serde_json::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, e)
}

impl StatusJournal {
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let sequence = if path.exists() {
            let file = File::open(&path)?;
            BufReader::new(file)
                .lines()
                .map_while(Result::ok)
                .filter(|line| !line.is_empty())
                .count() as u64
        } else {
            0
        };
        Ok(Self { path, sequence })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(
        &mut self,
        topic: &str,
        snapshot: StatusSnapshot,
        recorded_at: DateTime<Utc>,
    ) -> std::io::Result<JournalRecord> {
        let record = JournalRecord {
            sequence: self.sequence + 1,
            recorded_at,
            topic: topic.to_string(),
            snapshot,
        };
        let json = serde_json::to_string(&record).map_err(invalid_data)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", json)?;

        self.sequence = record.sequence;
        Ok(record)
    }

    /// Journal a bus message whose payload is a status snapshot
    pub fn append_message(
        &mut self,
        message: &BusMessage,
        recorded_at: DateTime<Utc>,
    ) -> std::io::Result<JournalRecord> {
        let snapshot: StatusSnapshot =
            serde_json::from_str(&message.payload).map_err(invalid_data)?;
        self.append(&message.topic, snapshot, recorded_at)
    }

    pub fn read_all(&self) -> std::io::Result<Vec<JournalRecord>> {
        if !self.path.exists() {
            return Ok(vec![]);
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line).map_err(invalid_data)?);
        }
        Ok(records)
    }

    pub fn query(&self, pattern: &TopicPattern) -> std::io::Result<Vec<JournalRecord>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|r| pattern.matches(&r.topic))
            .collect())
    }

    pub fn after(&self, sequence: u64) -> std::io::Result<Vec<JournalRecord>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|r| r.sequence > sequence)
            .collect())
    }

    /// Every journaled snapshot of one atom, oldest first
    pub fn history(&self, id: &AtomId) -> std::io::Result<Vec<StatusSnapshot>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|r| &r.snapshot.id == id)
            .map(|r| r.snapshot)
            .collect())
    }

    pub fn current_sequence(&self) -> u64 {
        self.sequence
    }
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
