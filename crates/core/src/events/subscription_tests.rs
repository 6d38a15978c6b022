// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    exact = { "aq:status:default", "aq:status:default", true },
    exact_other_queue = { "aq:status:default", "aq:status:beamline", false },
    single_segment = { "aq:status:*", "aq:status:beamline", true },
    single_is_one_segment = { "aq:status:*", "aq:status:a:b", false },
    single_needs_a_segment = { "aq:status:*", "aq:status", false },
    remainder = { "aq:**", "aq:status:default", true },
    remainder_other_root = { "aq:**", "other:status", false },
    star = { "*", "anything", true },
    double_star = { "**", "anything:at:all", true },
    empty = { "", "", false },
    middle_wildcard = { "aq:*:default", "aq:status:default", true },
)]
fn pattern_matching(pattern: &str, topic: &str, expected: bool) {
    assert_eq!(TopicPattern::new(pattern).matches(topic), expected);
}

#[test]
fn subscription_matches_any_pattern() {
    let sub = Subscription::new(
        "watch-1",
        vec![
            TopicPattern::new("aq:status:default"),
            TopicPattern::new("lab:**"),
        ],
        "operator console",
    );
    assert!(sub.matches("aq:status:default"));
    assert!(sub.matches("lab:temperature:stage"));
    assert!(!sub.matches("aq:status:beamline"));
}

#[test]
fn pattern_serializes_as_string() {
    let json = serde_json::to_string(&TopicPattern::new("aq:*")).unwrap();
    assert_eq!(json, "\"aq:*\"");
}
