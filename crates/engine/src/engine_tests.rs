// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use aq_adapters::{FakeBus, Script, ScriptedExecutor};
use aq_core::{AtomId, FakeClock, SUB_TASK_TAG};
use serde_json::json;
use std::collections::HashSet;

const QUEUE: &str = "q";

fn leaf(id: &str) -> Atom {
    Atom::leaf(id, id.to_uppercase(), "DummyAtom", json!({}))
}

fn composite(id: &str, children: Vec<Atom>) -> Atom {
    let mut atom = Atom::sub_task(id, id.to_uppercase());
    for child in children {
        atom.append(child).unwrap();
    }
    atom
}

struct Harness {
    engine: Arc<Engine<FakeBus, FakeClock>>,
    bus: FakeBus,
    executor: ScriptedExecutor,
    queue: ActiveQueue,
}

impl Harness {
    fn new(executor: ScriptedExecutor, config: EngineConfig) -> Self {
        let bus = FakeBus::new();
        let executors = Executors::new().register("DummyAtom", executor.clone());
        let engine = Engine::new(executors, config, bus.clone(), FakeClock::new());
        Self {
            engine: Arc::new(engine),
            bus,
            executor,
            queue: ActiveQueue::new(QUEUE),
        }
    }

    fn default_with(executor: ScriptedExecutor) -> Self {
        Self::new(executor, EngineConfig::default())
    }

    fn submit(&self, atom: Atom) {
        self.queue
            .submit(atom, self.engine.clock(), &self.engine.broadcaster(QUEUE))
            .unwrap();
    }

    fn spawn(&self) -> tokio::task::JoinHandle<RunSummary> {
        let engine = Arc::clone(&self.engine);
        let queue = self.queue.clone();
        tokio::spawn(async move { engine.run(&queue).await.unwrap() })
    }

    fn statuses(&self, id: &str) -> Vec<Status> {
        let mut statuses = self.bus.statuses_of(id);
        // progress reports republish RUNNING
        statuses.dedup();
        statuses
    }

    fn finished(&self, id: &str) -> aq_core::AtomRecord {
        let snapshot = self.queue.snapshot();
        let mut found = None;
        for record in &snapshot.finished {
            find_record(record, id, &mut found);
        }
        found.unwrap_or_else(|| panic!("{id} not finished"))
    }
}

fn find_record(record: &aq_core::AtomRecord, id: &str, found: &mut Option<aq_core::AtomRecord>) {
    if record.id == id {
        *found = Some(record.clone());
    }
    for child in record.children.iter().flatten() {
        find_record(child, id, found);
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn failure_cascades_and_halts_the_queue() {
    let executor = ScriptedExecutor::new();
    executor.script(
        "c",
        Script::Fail {
            after: 1,
            reason: "detector saturated".to_string(),
        },
    );
    let h = Harness::default_with(executor);
    h.submit(leaf("a"));
    h.submit(composite("b", vec![leaf("c"), leaf("d")]));
    h.submit(leaf("z"));

    let summary = h.engine.run(&h.queue).await.unwrap();

    assert_eq!(summary.status, QueueStatus::Halted);
    assert_eq!(summary.finished, 2);
    assert_eq!(summary.stop, None);
    assert_eq!(h.finished("a").status, Status::Complete);
    assert_eq!(h.finished("b").status, Status::Failed);
    assert_eq!(h.finished("c").status, Status::Failed);
    assert!(h.finished("c").message.contains("detector saturated"));

    let d = h.finished("d");
    assert_eq!(d.status, Status::Aborted);
    assert!(d.start_time.is_none());
    assert_eq!(h.statuses("d"), vec![Status::Submitted, Status::Aborted]);

    // later atoms stay queued
    let snapshot = h.queue.snapshot();
    assert_eq!(snapshot.pending.len(), 1);
    assert_eq!(snapshot.pending[0].status, Status::Submitted);
    assert_eq!(h.executor.started(), vec![AtomId::from("a"), AtomId::from("c")]);
}

#[tokio::test]
async fn continue_after_failure_keeps_dequeuing() {
    let executor = ScriptedExecutor::new();
    executor.script(
        "x",
        Script::Fail {
            after: 0,
            reason: "boom".to_string(),
        },
    );
    let config = EngineConfig {
        continue_after_failure: true,
        ..EngineConfig::default()
    };
    let h = Harness::new(executor, config);
    h.submit(leaf("x"));
    h.submit(leaf("y"));

    let summary = h.engine.run(&h.queue).await.unwrap();

    assert_eq!(summary.status, QueueStatus::Drained);
    assert_eq!(summary.finished, 2);
    assert_eq!(h.finished("x").status, Status::Failed);
    assert_eq!(h.finished("y").status, Status::Complete);
}

#[tokio::test]
async fn continue_on_failure_policy_runs_remaining_children() {
    let executor = ScriptedExecutor::new();
    executor.script(
        "c",
        Script::Fail {
            after: 0,
            reason: "boom".to_string(),
        },
    );
    let config = EngineConfig {
        failure_policy: FailurePolicy::ContinueOnFailure,
        ..EngineConfig::default()
    };
    let h = Harness::new(executor, config);
    h.submit(composite("b", vec![leaf("c"), leaf("d")]));

    h.engine.run(&h.queue).await.unwrap();

    assert_eq!(h.finished("d").status, Status::Complete);
    assert_eq!(h.finished("b").status, Status::Failed);
}

#[tokio::test]
async fn completed_run_drains_with_full_progress() {
    let executor = ScriptedExecutor::new();
    executor.script("c", Script::Complete { steps: 2 });
    executor.script("d", Script::Complete { steps: 4 });
    let h = Harness::default_with(executor);
    h.submit(composite("b", vec![leaf("c"), leaf("d")]));

    let summary = h.engine.run(&h.queue).await.unwrap();

    assert_eq!(summary.status, QueueStatus::Drained);
    let b = h.finished("b");
    assert_eq!(b.status, Status::Complete);
    assert_eq!(b.percent_complete, 100.0);
    assert!(b.start_time.is_some() && b.end_time.is_some());

    let percents: Vec<f64> = h
        .bus
        .snapshots()
        .into_iter()
        .filter(|s| s.id == "b")
        .map(|s| s.percent_complete)
        .collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
    assert!(percents.contains(&25.0));
    assert_eq!(h.statuses("b"), vec![Status::Submitted, Status::Running, Status::Complete]);
}

#[tokio::test]
async fn empty_composite_completes_without_running_anything() {
    let h = Harness::default_with(ScriptedExecutor::new());
    h.submit(composite("e", vec![]));

    h.engine.run(&h.queue).await.unwrap();

    assert_eq!(h.finished("e").status, Status::Complete);
    assert!(h.executor.started().is_empty());
}

#[tokio::test]
async fn missing_executor_fails_the_leaf() {
    let h = Harness::default_with(ScriptedExecutor::new());
    h.submit(Atom::leaf(
        "s",
        "S",
        "ScanAtom",
        json!({"positions": [[0.0]]}),
    ));

    let summary = h.engine.run(&h.queue).await.unwrap();

    assert_eq!(summary.status, QueueStatus::Halted);
    let s = h.finished("s");
    assert_eq!(s.status, Status::Failed);
    assert!(s.message.contains("no executor for type tag ScanAtom"));
}

#[tokio::test]
async fn pause_and_resume_at_a_checkpoint() {
    let executor = ScriptedExecutor::gated();
    executor.script("a", Script::Complete { steps: 3 });
    let h = Harness::default_with(executor);
    h.submit(leaf("a"));

    let run = h.spawn();
    h.executor.wait_started(1).await;

    assert!(h.queue.control().pause());
    h.executor.release(1);
    wait_until(|| h.bus.last_of("a").is_some_and(|s| s.status == Status::Paused)).await;
    assert_eq!(h.queue.status(), QueueStatus::Paused);
    assert_eq!(h.bus.last_of("a").unwrap().percent_complete, 0.0);

    assert!(h.queue.control().resume());
    wait_until(|| h.bus.last_of("a").is_some_and(|s| s.percent_complete > 0.0)).await;
    assert_eq!(h.queue.status(), QueueStatus::Running);

    h.executor.release(2);
    let summary = run.await.unwrap();

    assert_eq!(summary.status, QueueStatus::Drained);
    assert_eq!(
        h.statuses("a"),
        vec![
            Status::Submitted,
            Status::Running,
            Status::Paused,
            Status::Running,
            Status::Complete
        ]
    );
    assert_eq!(h.finished("a").percent_complete, 100.0);
}

#[tokio::test]
async fn pausing_a_leaf_pauses_its_composites() {
    let executor = ScriptedExecutor::gated();
    let h = Harness::default_with(executor);
    h.submit(composite("b", vec![leaf("c")]));

    let run = h.spawn();
    h.executor.wait_started(1).await;
    h.queue.control().pause();
    h.executor.release(1);
    wait_until(|| h.bus.last_of("b").is_some_and(|s| s.status == Status::Paused)).await;

    h.queue.control().resume();
    let summary = run.await.unwrap();
    assert_eq!(summary.status, QueueStatus::Drained);
    assert_eq!(
        h.statuses("b"),
        vec![
            Status::Submitted,
            Status::Running,
            Status::Paused,
            Status::Running,
            Status::Complete
        ]
    );
}

#[tokio::test]
async fn pause_resumes_the_same_child_of_a_composite() {
    let executor = ScriptedExecutor::gated();
    executor.script("c2", Script::Complete { steps: 3 });
    let h = Harness::default_with(executor);
    h.submit(composite("b", vec![leaf("c1"), leaf("c2"), leaf("c3")]));

    let run = h.spawn();
    h.executor.wait_started(1).await;
    h.executor.release(1);
    h.executor.wait_started(2).await;

    h.queue.control().pause();
    h.executor.release(1);
    wait_until(|| h.bus.last_of("c2").is_some_and(|s| s.status == Status::Paused)).await;
    assert_eq!(h.queue.status(), QueueStatus::Paused);
    assert_eq!(h.bus.last_of("b").unwrap().status, Status::Paused);

    h.queue.control().resume();
    h.executor.release(3);
    let summary = run.await.unwrap();

    assert_eq!(summary.status, QueueStatus::Drained);
    let order: Vec<String> = h.executor.started().iter().map(|id| id.to_string()).collect();
    assert_eq!(order, vec!["c1", "c2", "c3"]);
    assert_eq!(
        h.statuses("c1"),
        vec![Status::Submitted, Status::Running, Status::Complete]
    );
    assert_eq!(
        h.statuses("c2"),
        vec![
            Status::Submitted,
            Status::Running,
            Status::Paused,
            Status::Running,
            Status::Complete
        ]
    );
    let c2_end = h.finished("c2").end_time.unwrap();
    let c3_start = h.finished("c3").start_time.unwrap();
    assert!(c3_start >= c2_end, "{c3_start} before {c2_end}");
    assert_eq!(h.finished("b").status, Status::Complete);
}

#[tokio::test]
async fn cooperative_abort_stops_at_the_next_checkpoint() {
    let executor = ScriptedExecutor::gated();
    executor.script("a", Script::Complete { steps: 3 });
    let h = Harness::default_with(executor);
    h.submit(leaf("a"));
    h.submit(composite("b", vec![leaf("c")]));

    let run = h.spawn();
    h.executor.wait_started(1).await;
    assert!(h.queue.control().stop(StopKind::Abort));
    h.executor.release(1);
    let summary = run.await.unwrap();

    assert_eq!(summary.status, QueueStatus::Aborted);
    assert_eq!(summary.stop, Some(StopOutcome::Acknowledged(StopKind::Abort)));
    assert_eq!(h.finished("a").status, Status::Aborted);
    for id in ["b", "c"] {
        let record = h.finished(id);
        assert_eq!(record.status, Status::Aborted, "{id}");
        assert!(record.start_time.is_none(), "{id}");
    }
    assert_eq!(h.queue.status(), QueueStatus::Aborted);
    assert!(!h.queue.is_running());
}

#[tokio::test]
async fn stop_while_paused_ends_the_pause() {
    let executor = ScriptedExecutor::gated();
    executor.script("a", Script::Complete { steps: 2 });
    let h = Harness::default_with(executor);
    h.submit(leaf("a"));

    let run = h.spawn();
    h.executor.wait_started(1).await;
    h.queue.control().pause();
    h.executor.release(1);
    wait_until(|| h.queue.status() == QueueStatus::Paused).await;

    h.queue.control().stop(StopKind::Terminate);
    let summary = run.await.unwrap();

    assert_eq!(summary.status, QueueStatus::Terminated);
    assert_eq!(
        h.statuses("a"),
        vec![
            Status::Submitted,
            Status::Running,
            Status::Paused,
            Status::Terminated
        ]
    );
}

#[tokio::test]
async fn unresponsive_atom_is_forced_after_the_stop_timeout() {
    let executor = ScriptedExecutor::new();
    executor.script("a", Script::Hang);
    let config = EngineConfig {
        stop_timeout: Duration::from_millis(20),
        ..EngineConfig::default()
    };
    let h = Harness::new(executor, config);
    h.submit(leaf("a"));
    h.submit(leaf("b"));

    let run = h.spawn();
    h.executor.wait_started(1).await;
    h.queue.control().stop(StopKind::Terminate);
    let summary = run.await.unwrap();

    assert_eq!(summary.status, QueueStatus::Terminated);
    let stop = summary.stop.unwrap();
    assert!(stop.is_degraded());
    assert_eq!(stop.kind(), StopKind::Terminate);
    let a = h.finished("a");
    assert_eq!(a.status, Status::Terminated);
    assert!(a.message.contains("forced"));
    assert_eq!(h.finished("b").status, Status::Terminated);
    // the hung execution was dropped
    assert_eq!(h.executor.max_concurrent(), 1);
}

#[tokio::test]
async fn at_most_one_leaf_is_ever_active() {
    let h = Harness::default_with(ScriptedExecutor::new());
    h.submit(leaf("a"));
    h.submit(composite(
        "b",
        vec![leaf("c"), composite("d", vec![leaf("e"), leaf("f")]), leaf("g")],
    ));
    h.submit(leaf("h"));

    let summary = h.engine.run(&h.queue).await.unwrap();
    assert_eq!(summary.status, QueueStatus::Drained);

    let mut active = HashSet::new();
    for snapshot in h.bus.snapshots() {
        if snapshot.type_tag == SUB_TASK_TAG {
            continue;
        }
        if snapshot.status.is_active() {
            active.insert(snapshot.id.clone());
        } else {
            active.remove(&snapshot.id);
        }
        assert!(active.len() <= 1, "concurrently active: {active:?}");
    }
    assert_eq!(h.executor.max_concurrent(), 1);
    let order: Vec<String> = h.executor.started().iter().map(|id| id.to_string()).collect();
    assert_eq!(order, vec!["a", "c", "e", "f", "g", "h"]);
}

#[tokio::test]
async fn a_running_queue_cannot_be_started_twice() {
    let executor = ScriptedExecutor::gated();
    let h = Harness::default_with(executor);
    h.submit(leaf("a"));

    let run = h.spawn();
    h.executor.wait_started(1).await;
    let err = h.engine.run(&h.queue).await.unwrap_err();
    assert!(matches!(err, EngineError::AlreadyRunning(_)));

    h.executor.release(1);
    run.await.unwrap();
}

#[tokio::test]
async fn pending_child_removed_mid_run_is_skipped() {
    let executor = ScriptedExecutor::gated();
    let h = Harness::default_with(executor);
    h.submit(composite("b", vec![leaf("c"), leaf("d"), leaf("e")]));

    let run = h.spawn();
    h.executor.wait_started(1).await;
    let removed = h.queue.remove_atom(&AtomId::from("d")).unwrap();
    assert_eq!(removed.status(), Status::Submitted);

    h.executor.release(2);
    run.await.unwrap();

    let order: Vec<String> = h.executor.started().iter().map(|id| id.to_string()).collect();
    assert_eq!(order, vec!["c", "e"]);
    assert_eq!(h.finished("b").status, Status::Complete);
}

#[tokio::test]
async fn drained_queue_can_be_restarted_with_new_work() {
    let h = Harness::default_with(ScriptedExecutor::new());
    h.submit(leaf("a"));
    h.engine.run(&h.queue).await.unwrap();

    h.submit(leaf("b"));
    let summary = h.engine.run(&h.queue).await.unwrap();

    assert_eq!(summary.status, QueueStatus::Drained);
    assert_eq!(summary.finished, 1);
    assert_eq!(h.queue.snapshot().finished.len(), 2);
}

mod trees {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Shape {
        Leaf,
        Node(Vec<Shape>),
    }

    fn shape() -> impl Strategy<Value = Shape> {
        Just(Shape::Leaf).prop_recursive(3, 16, 4, |inner| {
            prop::collection::vec(inner, 0..4).prop_map(Shape::Node)
        })
    }

    fn build(shape: &Shape, next: &mut usize) -> Atom {
        *next += 1;
        let id = format!("n{}", next);
        match shape {
            Shape::Leaf => leaf(&id),
            Shape::Node(children) => {
                let children = children.iter().map(|c| build(c, next)).collect();
                composite(&id, children)
            }
        }
    }

    fn all_complete(record: &aq_core::AtomRecord) -> bool {
        record.status == Status::Complete
            && record.children.iter().flatten().all(all_complete)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn any_tree_of_completing_leaves_drains(shapes in prop::collection::vec(shape(), 1..4)) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            rt.block_on(async {
                let h = Harness::default_with(ScriptedExecutor::new());
                let mut next = 0;
                for shape in &shapes {
                    h.submit(build(shape, &mut next));
                }

                let summary = h.engine.run(&h.queue).await.unwrap();

                assert_eq!(summary.status, QueueStatus::Drained);
                assert_eq!(summary.finished, shapes.len());
                assert!(h.queue.snapshot().finished.iter().all(all_complete));
                assert!(h.executor.max_concurrent() <= 1);
            });
        }
    }
}
