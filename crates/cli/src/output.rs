// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output formatting for CLI commands

use std::fmt;

use aq_core::events::JournalRecord;
use aq_core::{AtomRecord, StatusSnapshot};
use aq_engine::QueueSnapshot;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Print output in the specified format
pub fn print<T: Serialize + fmt::Display>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", value),
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(value) {
                println!("{}", json);
            }
        }
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + fmt::Display>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            for item in items {
                println!("{}", item);
            }
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(items) {
                println!("{}", json);
            }
        }
    }
}

/// A queue with its atoms, one line per atom, children indented
#[derive(Serialize)]
#[serde(transparent)]
pub struct QueueView(pub QueueSnapshot);

impl fmt::Display for QueueView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let q = &self.0;
        write!(f, "queue {}: {}", q.name, q.status)?;
        if q.signal != aq_engine::Signal::Run {
            write!(f, " (signal: {})", q.signal)?;
        }
        if q.pending.is_empty() && q.current.is_none() && q.finished.is_empty() {
            return write!(f, "\n  (empty)");
        }
        for record in &q.finished {
            write_atom(f, record, "done", 1)?;
        }
        if let Some(record) = &q.current {
            write_atom(f, record, "  =>", 1)?;
        }
        for record in &q.pending {
            write_atom(f, record, "", 1)?;
        }
        Ok(())
    }
}

fn write_atom(
    f: &mut fmt::Formatter<'_>,
    record: &AtomRecord,
    marker: &str,
    depth: usize,
) -> fmt::Result {
    write!(
        f,
        "\n{:>4} {}{:<16} {:<20} {:<10} {:>5.1}%",
        marker,
        "  ".repeat(depth - 1),
        record.id.to_string(),
        truncate(&record.name, 20),
        record.status,
        record.percent_complete
    )?;
    if !record.message.is_empty() {
        write!(f, "  {}", record.message)?;
    }
    for child in record.children.iter().flatten() {
        write_atom(f, child, "", depth + 1)?;
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// One status change as a single line
#[derive(Serialize)]
pub struct StatusLine {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(flatten)]
    pub snapshot: StatusSnapshot,
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(topic) = &self.topic {
            write!(f, "{} ", topic)?;
        }
        write_snapshot(f, &self.snapshot)
    }
}

/// A journaled snapshot, prefixed with its sequence number and time
#[derive(Serialize)]
#[serde(transparent)]
pub struct JournalLine(pub JournalRecord);

impl fmt::Display for JournalLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.0;
        write!(
            f,
            "{:>6} {} ",
            r.sequence,
            r.recorded_at.format("%H:%M:%S%.3f")
        )?;
        write!(f, "{} ", r.topic)?;
        write_snapshot(f, &r.snapshot)
    }
}

fn write_snapshot(f: &mut fmt::Formatter<'_>, s: &StatusSnapshot) -> fmt::Result {
    write!(
        f,
        "{} {} -> {} {:.1}%",
        s.id, s.previous_status, s.status, s.percent_complete
    )?;
    if !s.message.is_empty() {
        write!(f, " ({})", s.message)?;
    }
    Ok(())
}
