// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn root_model_declares_lifecycle_events() {
    let root = TaskModel::root();

    for name in ["start", "success", "failed", "stop", "internal_error"] {
        assert!(root.event(name).is_some(), "missing {name}");
    }
    assert!(root.event("start").unwrap().controlable);
    assert!(!root.event("stop").unwrap().controlable);
    assert!(root.event("stop").unwrap().terminal);
    assert!(!root.event("internal_error").unwrap().terminal);
}

#[test]
fn derived_model_inherits_lifecycle_events() {
    let model = TaskModel::builder("MoveTo")
        .event("arrived", false, false)
        .argument("target")
        .build();

    assert!(model.event("start").is_some());
    assert!(model.event("arrived").is_some());
    assert_eq!(model.argument("target").unwrap().default, None);
}

#[test]
fn own_event_shadows_inherited_definition() {
    let base = TaskModel::builder("Base").event("blocked", false, false).build();
    let derived = TaskModel::builder("Derived")
        .supermodel(base)
        .event("blocked", true, false)
        .build();

    assert!(derived.event("blocked").unwrap().controlable);
    let blocked_defs = derived
        .each_event()
        .iter()
        .filter(|e| e.name == "blocked")
        .count();
    assert_eq!(blocked_defs, 1);
}

#[test]
fn provides_checks_tag_membership_through_chain() {
    let base = TaskModel::builder("Base").provides("localizable").build();
    let derived = TaskModel::builder("Derived").supermodel(base).build();

    assert!(derived.provides("localizable"));
    assert!(!derived.provides("graspable"));
}

#[test]
fn is_a_walks_the_supermodel_chain() {
    let base = TaskModel::builder("Base").build();
    let derived = TaskModel::builder("Derived").supermodel(base.clone()).build();
    let other = TaskModel::builder("Other").build();

    assert!(derived.is_a(&derived));
    assert!(derived.is_a(&base));
    assert!(!derived.is_a(&other));
}

#[test]
fn ancestry_lists_names_self_first() {
    let base = TaskModel::builder("Base").build();
    let derived = TaskModel::builder("Derived").supermodel(base).build();

    assert_eq!(derived.ancestry(), vec!["Derived", "Base", "Task"]);
}
