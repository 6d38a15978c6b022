// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::events::TopicPattern;

fn watch(bus: &TopicBus, id: &str, pattern: &str) -> MessageReceiver {
    bus.subscribe(Subscription::new(id, vec![TopicPattern::new(pattern)], "test"))
}

#[tokio::test]
async fn publish_reaches_matching_subscribers() {
    let bus = TopicBus::new();
    let mut rx = watch(&bus, "w", "aq:status:*");

    let delivered = bus.publish("aq:status:default", "{\"id\":\"a\"}");
    assert_eq!(delivered, 1);

    let message = rx.try_recv().unwrap();
    assert_eq!(message.topic, "aq:status:default");
    assert_eq!(message.payload, "{\"id\":\"a\"}");
}

#[tokio::test]
async fn other_topics_are_not_delivered() {
    let bus = TopicBus::new();
    let mut rx = watch(&bus, "w", "aq:status:default");
    assert_eq!(bus.publish("aq:status:beamline", "{}"), 0);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn publish_preserves_order_per_subscriber() {
    let bus = TopicBus::new();
    let mut rx = watch(&bus, "w", "**");
    for i in 0..10 {
        bus.publish("t", &i.to_string());
    }
    for i in 0..10 {
        assert_eq!(rx.try_recv().unwrap().payload, i.to_string());
    }
}

#[test]
fn dropped_receivers_are_pruned() {
    let bus = TopicBus::new();
    let rx = watch(&bus, "gone", "*");
    drop(rx);
    assert_eq!(bus.publish("t", "x"), 0);
    assert_eq!(bus.subscriber_count(), 0);
}

#[test]
fn unsubscribe_removes_subscriber() {
    let bus = TopicBus::new();
    let _rx = watch(&bus, "w", "*");
    assert!(bus.unsubscribe(&SubscriberId("w".to_string())));
    assert!(!bus.unsubscribe(&SubscriberId("w".to_string())));
    assert_eq!(bus.subscriber_count(), 0);
}

#[test]
fn clones_share_subscribers() {
    let bus = TopicBus::new();
    let other = bus.clone();
    let _rx = watch(&bus, "w", "*");
    assert_eq!(other.subscriber_count(), 1);
}
