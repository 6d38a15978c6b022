// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status broadcast adapter: atom snapshots onto the message bus

use aq_adapters::MessageBus;
use aq_core::{StatusListener, StatusSnapshot};

/// Publishes every snapshot it is handed to one status topic.
///
/// Publishing happens inside the transition call, so a snapshot is on the
/// bus before the call that changed the atom returns. A failed publish is
/// logged and does not undo the transition.
#[derive(Clone)]
pub struct StatusBroadcaster<B> {
    bus: B,
    topic: String,
}

impl<B: MessageBus> StatusBroadcaster<B> {
    pub fn new(bus: B, topic: impl Into<String>) -> Self {
        Self {
            bus,
            topic: topic.into(),
        }
    }

    /// Topic for one queue under a prefix, e.g. `aq:status:default`
    pub fn queue_topic(prefix: &str, queue: &str) -> String {
        format!("{prefix}:{queue}")
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl<B: MessageBus> StatusListener for StatusBroadcaster<B> {
    fn status_changed(&self, snapshot: &StatusSnapshot) {
        let payload = match serde_json::to_string(snapshot) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(atom_id = %snapshot.id, error = %e, "snapshot not serializable");
                return;
            }
        };
        if let Err(e) = self.bus.publish(&self.topic, &payload) {
            tracing::warn!(
                topic = %self.topic,
                atom_id = %snapshot.id,
                status = %snapshot.status,
                error = %e,
                "status publish failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aq_adapters::FakeBus;
    use aq_core::{Atom, FakeClock, Status};
    use serde_json::json;

    #[test]
    fn transitions_are_published_before_returning() {
        let bus = FakeBus::new();
        let broadcaster = StatusBroadcaster::new(bus.clone(), "aq:status:default");
        let clock = FakeClock::new();
        let mut atom = Atom::leaf("a", "A", "DummyAtom", json!({}));

        atom.submit(&clock, &broadcaster).unwrap();
        assert_eq!(bus.statuses_of("a"), vec![Status::Submitted]);
        atom.transition(Status::Running, Some("go"), &clock, &broadcaster)
            .unwrap();

        let published = bus.published();
        assert_eq!(published.len(), 2);
        assert!(published.iter().all(|m| m.topic == "aq:status:default"));
        let last = bus.last_of("a").unwrap();
        assert_eq!(last.previous_status, Status::Submitted);
        assert_eq!(last.message, "go");
    }

    #[test]
    fn failed_publish_keeps_the_transition() {
        let bus = FakeBus::new();
        bus.set_failing(true);
        let broadcaster = StatusBroadcaster::new(bus, "t");
        let clock = FakeClock::new();
        let mut atom = Atom::leaf("a", "A", "DummyAtom", json!({}));
        atom.transition(Status::Running, None, &clock, &broadcaster)
            .unwrap();
        assert_eq!(atom.status(), Status::Running);
    }

    #[test]
    fn queue_topics_are_namespaced() {
        assert_eq!(
            StatusBroadcaster::<FakeBus>::queue_topic("aq:status", "beamline"),
            "aq:status:beamline"
        );
    }
}
