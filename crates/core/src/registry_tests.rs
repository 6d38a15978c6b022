// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::atom::Unobserved;
use crate::clock::FakeClock;
use proptest::prelude::*;
use serde_json::json;
use yare::parameterized;

fn registry() -> AtomRegistry {
    AtomRegistry::with_defaults()
}

fn sample_tree() -> Atom {
    let mut inner = Atom::sub_task("b", "B");
    inner
        .append(Atom::leaf("c", "C", "DummyAtom", json!({"steps": 2, "failAt": 1})))
        .unwrap();
    inner
        .append(Atom::leaf(
            "d",
            "D",
            "ScanAtom",
            json!({"axis": "x", "start": 0.0, "stop": 1.0, "step": 0.5}),
        ))
        .unwrap();
    let mut root = Atom::sub_task("root", "Root");
    root.append(Atom::leaf("a", "A", "DummyAtom", json!({}))).unwrap();
    root.append(inner).unwrap();
    root
}

#[test]
fn round_trip_preserves_tree_and_status() {
    let clock = FakeClock::new();
    let mut tree = sample_tree();
    tree.submit(&clock, &Unobserved).unwrap();

    let json = registry().marshal(&tree).unwrap();
    let decoded = registry().unmarshal(&json).unwrap();

    assert_eq!(decoded, tree);
    assert_eq!(decoded.record(), tree.record());
    assert_eq!(decoded.at_path(&[1, 1]).unwrap().record(), tree.at_path(&[1, 1]).unwrap().record());
}

#[test]
fn wire_format_uses_camel_case_and_disjoint_bodies() {
    let json: Value = serde_json::from_str(&registry().marshal(&sample_tree()).unwrap()).unwrap();
    assert_eq!(json["typeTag"], "SubTaskAtom");
    assert_eq!(json["status"], "NEW");
    assert!(json.get("config").is_none());
    let leaf = &json["children"][0];
    assert_eq!(leaf["typeTag"], "DummyAtom");
    assert!(leaf.get("children").is_none());
    assert!(leaf["config"].is_object());
}

#[test]
fn minimal_submission_defaults_to_new() {
    let atom = registry()
        .unmarshal(r#"{"id":"x","typeTag":"DummyAtom","name":"X"}"#)
        .unwrap();
    assert_eq!(atom.status(), Status::New);
    assert_eq!(atom.leaf_body().unwrap().config, json!({}));
}

#[test]
fn unknown_tag_is_rejected() {
    let err = registry()
        .unmarshal(r#"{"id":"x","typeTag":"LaserAtom","name":"X"}"#)
        .unwrap_err();
    assert!(matches!(
        err,
        MarshalError::Config(ConfigError::UnknownTypeTag(tag)) if tag == "LaserAtom"
    ));
}

#[test]
fn empty_registry_only_knows_composites() {
    let reg = AtomRegistry::new();
    assert!(reg.is_known("SubTaskAtom"));
    assert!(!reg.is_known("DummyAtom"));
    assert!(reg
        .unmarshal(r#"{"id":"c","typeTag":"SubTaskAtom","name":"C","children":[]}"#)
        .is_ok());
}

#[parameterized(
    leaf_with_children = { r#"{"id":"x","typeTag":"DummyAtom","name":"X","children":[]}"# },
    composite_without_children = { r#"{"id":"x","typeTag":"SubTaskAtom","name":"X"}"# },
    composite_with_config = { r#"{"id":"x","typeTag":"SubTaskAtom","name":"X","config":{},"children":[]}"# },
    percent_out_of_range = { r#"{"id":"x","typeTag":"DummyAtom","name":"X","percentComplete":120.0}"# },
)]
fn malformed_shapes_are_rejected(json: &str) {
    let err = registry().unmarshal(json).unwrap_err();
    assert!(matches!(err, MarshalError::Config(ConfigError::Shape { .. })), "{err}");
}

#[test]
fn invalid_leaf_config_is_rejected() {
    let err = registry()
        .unmarshal(r#"{"id":"x","typeTag":"ScanAtom","name":"X","config":{"positions":[]}}"#)
        .unwrap_err();
    assert!(matches!(err, MarshalError::Config(ConfigError::InvalidConfig { .. })));
}

#[test]
fn oversized_scan_is_rejected_at_submission() {
    let err = registry()
        .unmarshal(
            r#"{"id":"x","typeTag":"ScanAtom","name":"X",
                "config":{"axis":"x","start":0,"stop":1e12,"step":1e-6}}"#,
        )
        .unwrap_err();
    assert!(matches!(err, MarshalError::Config(ConfigError::InvalidConfig { ref id, .. }) if id == "x"));
}

#[test]
fn self_containing_record_is_rejected() {
    let json = r#"{"id":"c","typeTag":"SubTaskAtom","name":"C","children":[
        {"id":"d","typeTag":"SubTaskAtom","name":"D","children":[
            {"id":"c","typeTag":"SubTaskAtom","name":"C","children":[]}
        ]}
    ]}"#;
    let err = registry().unmarshal(json).unwrap_err();
    assert!(matches!(err, MarshalError::Config(ConfigError::Cycle { .. })));
}

#[test]
fn malformed_json_is_a_json_error() {
    assert!(matches!(registry().unmarshal("{nope"), Err(MarshalError::Json(_))));
}

#[test]
fn validate_checks_built_trees() {
    let mut tree = sample_tree();
    tree.append(Atom::leaf("z", "Z", "DummyAtom", json!({"steps": 0})))
        .unwrap();
    let err = registry().validate(&tree).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidConfig { ref id, .. } if id == "z"));
}

/// Random trees whose ids are unique by construction (pre-order numbering)
fn arb_shape() -> impl Strategy<Value = Vec<usize>> {
    // each entry is the child count of the composite at that position; 0 = leaf
    prop::collection::vec(0usize..4, 1..8)
}

fn build_tree(shape: &[usize], next: &mut usize, cursor: &mut usize) -> Atom {
    let id = format!("n{next}");
    *next += 1;
    let width = shape.get(*cursor).copied().unwrap_or(0);
    *cursor += 1;
    if width == 0 {
        return Atom::leaf(id.as_str(), id.as_str(), "DummyAtom", json!({"steps": 1 + *next % 3}));
    }
    let mut atom = Atom::sub_task(id.as_str(), id.as_str());
    for _ in 0..width {
        let child = build_tree(shape, next, cursor);
        atom.append(child).unwrap();
    }
    atom
}

proptest! {
    #[test]
    fn marshal_round_trip_is_identity(shape in arb_shape()) {
        let tree = build_tree(&shape, &mut 0, &mut 0);
        let reg = registry();
        let decoded = reg.unmarshal(&reg.marshal(&tree).unwrap()).unwrap();
        prop_assert_eq!(decoded, tree);
    }
}
