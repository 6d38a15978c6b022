// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::atom::{Atom, Unobserved};
use crate::clock::{Clock, FakeClock};
use crate::status::Status;
use serde_json::json;
use tempfile::TempDir;

fn journal() -> (StatusJournal, TempDir) {
    let tmp = TempDir::new().unwrap();
    let journal = StatusJournal::open(tmp.path().join("status.jsonl")).unwrap();
    (journal, tmp)
}

fn snapshot(id: &str, status: Status) -> StatusSnapshot {
    let clock = FakeClock::new();
    let mut atom = Atom::leaf(id, id, "DummyAtom", json!({}));
    if status != Status::New {
        atom.transition(status, None, &clock, &Unobserved).unwrap();
    }
    atom.snapshot()
}

#[test]
fn append_assigns_increasing_sequence() {
    let (mut journal, _tmp) = journal();
    let now = FakeClock::new().now();
    journal
        .append("aq:status:default", snapshot("a", Status::Submitted), now)
        .unwrap();
    journal
        .append("aq:status:default", snapshot("a", Status::Running), now)
        .unwrap();

    let records = journal.read_all().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].sequence, 1);
    assert_eq!(records[1].sequence, 2);
    assert_eq!(records[1].snapshot.status, Status::Running);
}

#[test]
fn query_filters_by_topic() {
    let (mut journal, _tmp) = journal();
    let now = FakeClock::new().now();
    journal.append("aq:status:default", snapshot("a", Status::Running), now).unwrap();
    journal.append("aq:status:beamline", snapshot("b", Status::Running), now).unwrap();
    journal.append("aq:status:default", snapshot("c", Status::Running), now).unwrap();

    let hits = journal.query(&TopicPattern::new("aq:status:default")).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(journal.after(2).unwrap().len(), 1);
}

#[test]
fn history_follows_one_atom() {
    let (mut journal, _tmp) = journal();
    let now = FakeClock::new().now();
    for (id, status) in [("a", Status::Submitted), ("b", Status::Submitted), ("a", Status::Running)] {
        journal.append("t", snapshot(id, status), now).unwrap();
    }
    let statuses: Vec<Status> = journal
        .history(&AtomId::from("a"))
        .unwrap()
        .iter()
        .map(|s| s.status)
        .collect();
    assert_eq!(statuses, vec![Status::Submitted, Status::Running]);
}

#[test]
fn bus_messages_must_carry_snapshots() {
    let (mut journal, _tmp) = journal();
    let now = FakeClock::new().now();
    let good = BusMessage {
        topic: "t".to_string(),
        payload: serde_json::to_string(&snapshot("a", Status::Running)).unwrap(),
    };
    assert_eq!(journal.append_message(&good, now).unwrap().sequence, 1);

    let bad = BusMessage {
        topic: "t".to_string(),
        payload: "not json".to_string(),
    };
    assert!(journal.append_message(&bad, now).is_err());
    assert_eq!(journal.current_sequence(), 1);
}

#[test]
fn sequence_continues_after_reopen() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("status.jsonl");
    let now = FakeClock::new().now();
    {
        let mut journal = StatusJournal::open(&path).unwrap();
        journal.append("t", snapshot("a", Status::Running), now).unwrap();
        journal.append("t", snapshot("b", Status::Running), now).unwrap();
    }
    let mut journal = StatusJournal::open(&path).unwrap();
    assert_eq!(journal.current_sequence(), 2);
    let record = journal.append("t", snapshot("c", Status::Running), now).unwrap();
    assert_eq!(record.sequence, 3);
}
