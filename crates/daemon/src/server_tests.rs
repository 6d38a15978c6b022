// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::lifecycle::{Config, DaemonBus, Settings};
use aq_adapters::{LocalBus, TracedBus};
use aq_core::Status;
use serde_json::json;
use std::time::Duration;

struct TestDaemon {
    ctx: Arc<DaemonContext>,
    _dir: tempfile::TempDir,
}

fn daemon() -> TestDaemon {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::in_dirs(
        dir.path().to_path_buf(),
        dir.path().to_path_buf(),
        Settings::default(),
    );
    let bus: DaemonBus = TracedBus::new(LocalBus::new());
    TestDaemon {
        ctx: Arc::new(DaemonContext::new(&config, bus)),
        _dir: dir,
    }
}

fn dummy(id: &str, step_ms: u64) -> String {
    json!({
        "id": id,
        "typeTag": "DummyAtom",
        "name": id.to_uppercase(),
        "config": { "steps": 3, "stepMs": step_ms }
    })
    .to_string()
}

fn submit(queue: &str, atom_json: String, start: bool) -> Request {
    Request::Submit {
        queue: queue.to_string(),
        atom_json,
        start,
    }
}

fn queue_snapshot(response: Response) -> QueueSnapshot {
    match response {
        Response::Queue { snapshot } => snapshot,
        other => panic!("expected Queue, got {other:?}"),
    }
}

#[tokio::test]
async fn ping_and_hello() {
    let d = daemon();
    assert_eq!(handle_request(&d.ctx, Request::Ping).await, Response::Pong);
    let hello = handle_request(
        &d.ctx,
        Request::Hello {
            version: "0".to_string(),
        },
    )
    .await;
    assert_eq!(
        hello,
        Response::Hello {
            version: PROTOCOL_VERSION.to_string()
        }
    );
}

#[tokio::test]
async fn submit_queues_the_atom_as_submitted() {
    let d = daemon();
    let snapshot = queue_snapshot(handle_request(&d.ctx, submit("default", dummy("a", 0), false)).await);

    assert_eq!(snapshot.status, QueueStatus::Idle);
    assert_eq!(snapshot.pending.len(), 1);
    assert_eq!(snapshot.pending[0].status, Status::Submitted);
}

#[tokio::test]
async fn malformed_atom_is_rejected_with_the_queue_snapshot() {
    let d = daemon();
    let response = handle_request(&d.ctx, submit("default", "{\"id\":".to_string(), false)).await;

    match response {
        Response::Rejected { snapshot, .. } => {
            let snapshot = snapshot.unwrap();
            assert_eq!(snapshot.name, "default");
            assert!(snapshot.pending.is_empty());
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_type_tag_is_rejected() {
    let d = daemon();
    let json = json!({"id": "x", "typeTag": "LaserAtom", "name": "X", "config": {}}).to_string();
    let response = handle_request(&d.ctx, submit("default", json, false)).await;
    assert!(matches!(response, Response::Rejected { .. }));
}

#[tokio::test]
async fn submit_and_start_runs_the_queue() {
    let d = daemon();
    handle_request(&d.ctx, submit("q", dummy("a", 0), true)).await;
    // submitting to the running queue is fine
    let response = handle_request(&d.ctx, submit("q", dummy("b", 0), true)).await;
    assert!(matches!(response, Response::Queue { .. }), "{response:?}");

    d.ctx.queues.wait("q").await.unwrap();
    let snapshot = d.ctx.queues.snapshot("q").unwrap();
    assert_eq!(snapshot.finished[0].status, Status::Complete);
}

#[tokio::test]
async fn pause_on_an_idle_queue_is_rejected() {
    let d = daemon();
    let response = handle_request(
        &d.ctx,
        Request::Pause {
            queue: "default".to_string(),
        },
    )
    .await;

    match response {
        Response::Rejected { message, snapshot } => {
            assert!(message.contains("not running"), "{message}");
            assert_eq!(snapshot.unwrap().status, QueueStatus::Idle);
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn control_of_an_unknown_queue_has_no_snapshot() {
    let d = daemon();
    let response = handle_request(
        &d.ctx,
        Request::Start {
            queue: "nope".to_string(),
        },
    )
    .await;
    assert!(matches!(
        response,
        Response::Rejected { snapshot: None, .. }
    ));
}

#[tokio::test]
async fn abort_an_idle_queue() {
    let d = daemon();
    handle_request(&d.ctx, submit("default", dummy("a", 0), false)).await;

    let snapshot = queue_snapshot(
        handle_request(
            &d.ctx,
            Request::Abort {
                queue: "default".to_string(),
            },
        )
        .await,
    );

    assert_eq!(snapshot.status, QueueStatus::Aborted);
    assert_eq!(snapshot.finished[0].status, Status::Aborted);
}

#[tokio::test]
async fn remove_atom_returns_its_record() {
    let d = daemon();
    handle_request(&d.ctx, submit("default", dummy("a", 0), false)).await;

    let response = handle_request(
        &d.ctx,
        Request::RemoveAtom {
            queue: "default".to_string(),
            atom_id: "a".to_string(),
        },
    )
    .await;

    match response {
        Response::Removed { atom, snapshot } => {
            assert_eq!(atom.id, "a");
            assert!(snapshot.pending.is_empty());
        }
        other => panic!("expected Removed, got {other:?}"),
    }
}

#[tokio::test]
async fn resubmit_queues_a_copy_under_a_new_id() {
    let d = daemon();
    handle_request(&d.ctx, submit("default", dummy("a", 0), false)).await;
    handle_request(
        &d.ctx,
        Request::Terminate {
            queue: "default".to_string(),
        },
    )
    .await;

    let response = handle_request(
        &d.ctx,
        Request::Resubmit {
            queue: "default".to_string(),
            atom_id: "a".to_string(),
            start: false,
        },
    )
    .await;

    match response {
        Response::Resubmitted { atom_id, snapshot } => {
            assert_ne!(atom_id, "a");
            assert_eq!(snapshot.pending[0].id, atom_id);
            assert_eq!(snapshot.pending[0].name, "A");
            assert_eq!(snapshot.finished[0].status, Status::Terminated);
        }
        other => panic!("expected Resubmitted, got {other:?}"),
    }
}

#[tokio::test]
async fn resubmit_of_a_waiting_atom_is_rejected() {
    let d = daemon();
    handle_request(&d.ctx, submit("default", dummy("a", 0), false)).await;

    let response = handle_request(
        &d.ctx,
        Request::Resubmit {
            queue: "default".to_string(),
            atom_id: "a".to_string(),
            start: true,
        },
    )
    .await;

    match response {
        Response::Rejected { message, snapshot } => {
            assert!(message.contains("has not finished"), "{message}");
            assert_eq!(snapshot.unwrap().status, QueueStatus::Idle);
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn queries_report_queues_and_status() {
    let d = daemon();
    handle_request(&d.ctx, submit("beamline", dummy("a", 0), false)).await;

    match handle_request(&d.ctx, Request::Query { query: Query::ListQueues }).await {
        Response::Queues { queues } => {
            let names: Vec<_> = queues.iter().map(|q| q.name.as_str()).collect();
            assert_eq!(names, vec!["beamline", "default"]);
        }
        other => panic!("expected Queues, got {other:?}"),
    }

    match handle_request(&d.ctx, Request::Query { query: Query::Status }).await {
        Response::Status { status } => {
            assert_eq!(status.queues, 2);
            assert_eq!(status.queues_running, 0);
            assert_eq!(status.atom_types, vec!["DummyAtom", "ScanAtom", "SubTaskAtom"]);
        }
        other => panic!("expected Status, got {other:?}"),
    }
}

#[tokio::test]
async fn history_of_an_unjournaled_atom_is_empty() {
    let d = daemon();
    let response = handle_request(
        &d.ctx,
        Request::Query {
            query: Query::History {
                atom_id: "a".to_string(),
            },
        },
    )
    .await;
    assert_eq!(response, Response::History { snapshots: vec![] });
}

#[tokio::test]
async fn journal_query_filters_by_sequence_and_topic() {
    let d = daemon();
    let mut journal = StatusJournal::open(&d.ctx.journal_path).unwrap();
    let snapshot = aq_core::Atom::leaf("a", "A", "DummyAtom", json!({})).snapshot();
    for topic in ["aq:status:default", "aq:status:beamline", "aq:status:default"] {
        journal
            .append(topic, snapshot.clone(), chrono::Utc::now())
            .unwrap();
    }

    let query = |after, topic: Option<&str>| Request::Query {
        query: Query::Journal {
            after,
            topic: topic.map(String::from),
        },
    };
    let sequences = |response: Response| match response {
        Response::Journal { records } => records.iter().map(|r| r.sequence).collect::<Vec<_>>(),
        other => panic!("expected Journal, got {other:?}"),
    };

    assert_eq!(sequences(handle_request(&d.ctx, query(1, None)).await), vec![2, 3]);
    assert_eq!(
        sequences(handle_request(&d.ctx, query(0, Some("aq:status:default"))).await),
        vec![1, 3]
    );
    assert_eq!(
        sequences(handle_request(&d.ctx, query(1, Some("aq:status:default"))).await),
        vec![3]
    );
}

#[tokio::test]
async fn shutdown_request_wakes_the_main_loop() {
    let d = daemon();
    assert_eq!(
        handle_request(&d.ctx, Request::Shutdown).await,
        Response::ShuttingDown
    );
    tokio::time::timeout(Duration::from_secs(1), d.ctx.shutdown_requested())
        .await
        .unwrap();
}

#[tokio::test]
async fn watch_streams_status_messages() {
    let d = daemon();
    let (client, server) = UnixStream::pair().unwrap();
    let handler = tokio::spawn(handle_connection(Arc::clone(&d.ctx), server));

    let (mut rx, mut tx) = client.into_split();
    let request = protocol::encode(&Request::Watch {
        pattern: "aq:status:*".to_string(),
    })
    .unwrap();
    protocol::write_message(&mut tx, &request).await.unwrap();

    // the subscription is live once the bus has a subscriber
    for _ in 0..100 {
        if d.ctx.bus.inner().topics().subscriber_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    handle_request(&d.ctx, submit("default", dummy("a", 0), false)).await;

    let bytes = protocol::read_message(&mut rx).await.unwrap();
    match protocol::decode::<Response>(&bytes).unwrap() {
        Response::Message { topic, snapshot } => {
            assert_eq!(topic, "aq:status:default");
            assert_eq!(snapshot.status, Status::Submitted);
        }
        other => panic!("expected Message, got {other:?}"),
    }

    drop(tx);
    handler.await.unwrap().unwrap();
    assert_eq!(d.ctx.bus.inner().topics().subscriber_count(), 0);
}
