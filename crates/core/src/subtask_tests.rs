// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::atom::Unobserved;
use crate::clock::FakeClock;
use crate::status::Status;
use serde_json::json;

fn leaf(id: &str) -> Atom {
    Atom::leaf(id, id, "DummyAtom", json!({}))
}

fn queue(ids: &[&str]) -> SubTaskQueue {
    SubTaskQueue::from_children(ids.iter().map(|id| leaf(id)).collect())
}

fn ids(queue: &SubTaskQueue) -> Vec<String> {
    queue.iter().map(|a| a.id().to_string()).collect()
}

#[test]
fn iteration_follows_insertion_order_and_restarts() {
    let mut q = SubTaskQueue::new();
    for id in ["a", "b", "c"] {
        q.push(leaf(id));
    }
    assert_eq!(ids(&q), vec!["a", "b", "c"]);
    assert_eq!(ids(&q), vec!["a", "b", "c"]);
    assert_eq!(q.len(), 3);
    assert_eq!(q.peek_last().map(|a| a.id().to_string()), Some("c".into()));
}

#[test]
fn peek_next_skips_started_children() {
    let clock = FakeClock::new();
    let mut q = queue(&["a", "b"]);
    assert_eq!(q.peek_next().unwrap().id(), "a");

    q.get_mut(0)
        .unwrap()
        .transition(Status::Running, None, &clock, &Unobserved)
        .unwrap();
    assert_eq!(q.peek_next().unwrap().id(), "b");

    q.get_mut(1)
        .unwrap()
        .transition(Status::Aborted, None, &clock, &Unobserved)
        .unwrap();
    assert!(q.peek_next().is_none());
}

#[test]
fn remove_takes_the_first_pending_match_only() {
    let clock = FakeClock::new();
    let mut q = queue(&["a", "b", "c"]);

    let removed = q.remove_pending(&AtomId::from("b")).unwrap();
    assert_eq!(removed.id(), "b");
    assert_eq!(ids(&q), vec!["a", "c"]);

    q.get_mut(0)
        .unwrap()
        .transition(Status::Running, None, &clock, &Unobserved)
        .unwrap();
    let err = q.remove_pending(&AtomId::from("a")).unwrap_err();
    assert!(matches!(err, ConfigError::Protected { .. }));
    assert_eq!(ids(&q), vec!["a", "c"]);

    let err = q.remove_pending(&AtomId::from("b")).unwrap_err();
    assert_eq!(err, ConfigError::NotFound(AtomId::from("b")));
}

#[test]
fn empty_queue_has_nothing_to_peek() {
    let q = SubTaskQueue::new();
    assert!(q.is_empty());
    assert!(q.peek_next().is_none());
    assert!(q.peek_last().is_none());
    assert_eq!((&q).into_iter().count(), 0);
}
