// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn camera_model() -> Arc<TaskModel> {
    TaskModel::builder("CameraAcquisition")
        .argument("exposure")
        .provides("data_source")
        .build()
}

fn derived_model(base: Arc<TaskModel>) -> Arc<TaskModel> {
    TaskModel::builder("StereoAcquisition").supermodel(base).build()
}

#[test]
fn model_matching_walks_the_ancestry() {
    let base = camera_model();
    let derived = derived_model(base.clone());
    let mut plan = Plan::new();
    let base_task = plan.add_task(base, Arguments::new()).unwrap();
    let derived_task = plan.add_task(derived, Arguments::new()).unwrap();

    let matcher = TaskMatcher::new().with_model("CameraAcquisition");
    assert_eq!(matcher.each_in(&plan), vec![base_task, derived_task]);

    let matcher = TaskMatcher::new().with_model("StereoAcquisition");
    assert_eq!(matcher.each_in(&plan), vec![derived_task]);
}

#[test]
fn tag_matching_uses_provides() {
    let mut plan = Plan::new();
    let tagged = plan.add_task(camera_model(), Arguments::new()).unwrap();
    let plain = TaskModel::builder("Plain").build();
    plan.add_task(plain, Arguments::new()).unwrap();

    let matcher = TaskMatcher::new().with_tag("data_source");
    assert_eq!(matcher.each_in(&plan), vec![tagged]);
}

#[test]
fn argument_matching_compares_concrete_values() {
    let mut plan = Plan::new();
    let mut args = Arguments::new();
    assert!(args.set("exposure", json!(30)));
    let long = plan.add_task(camera_model(), args).unwrap();
    let mut args = Arguments::new();
    assert!(args.set("exposure", json!(5)));
    plan.add_task(camera_model(), args).unwrap();

    let matcher = TaskMatcher::new().with_argument("exposure", json!(30));
    assert_eq!(matcher.each_in(&plan), vec![long]);
}

#[test]
fn state_and_role_filters_combine() {
    let mut plan = Plan::new();
    let running = plan.add_mission_task(camera_model(), Arguments::new()).unwrap();
    let idle = plan.add_task(camera_model(), Arguments::new()).unwrap();
    let start = plan.bound_event(running, "start").unwrap();
    plan.record_emission(start, vec![], 1, chrono::Utc::now()).unwrap();

    assert_eq!(TaskMatcher::new().running().each_in(&plan), vec![running]);
    assert_eq!(TaskMatcher::new().pending().each_in(&plan), vec![idle]);
    assert_eq!(TaskMatcher::new().mission().each_in(&plan), vec![running]);
    assert_eq!(
        TaskMatcher::new().not_mission().each_in(&plan),
        vec![idle]
    );
    assert!(TaskMatcher::new().running().not_mission().each_in(&plan).is_empty());
}

#[test]
fn executable_filter_rejects_abstract_and_unset_arguments() {
    let abstract_model = TaskModel::builder("Placeholder").abstract_model().build();
    let mut plan = Plan::new();
    plan.add_task(abstract_model, Arguments::new()).unwrap();

    let mut delayed = Arguments::new();
    assert!(delayed.set_delayed("exposure", "from planner"));
    plan.add_task(camera_model(), delayed).unwrap();

    // Declared but never assigned counts as unresolved
    plan.add_task(camera_model(), Arguments::new()).unwrap();

    let mut args = Arguments::new();
    assert!(args.set("exposure", json!(30)));
    let ready = plan.add_task(camera_model(), args).unwrap();

    assert_eq!(TaskMatcher::new().executable().each_in(&plan), vec![ready]);
}
