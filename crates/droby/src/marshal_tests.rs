// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::ids::DrobyId;
use chrono::Utc;
use serde_json::json;
use weft_core::{Arguments, ErrorKind, FailurePoint};

fn marshaller() -> Marshaller {
    Marshaller::new(PeerId::new(), TypeRegistry::with_builtins())
}

fn patrol_model() -> Arc<TaskModel> {
    TaskModel::builder("Patrol")
        .event("stop", true, true)
        .argument("speed")
        .build()
}

/// Serialize and parse the wire tree, as the link would
fn over_the_wire(value: &DrobyValue) -> DrobyValue {
    let text = serde_json::to_string(value).unwrap();
    serde_json::from_str(&text).unwrap()
}

#[test]
fn models_dump_fully_once_then_by_reference() {
    let mut marshaller = marshaller();
    let model = patrol_model();

    let first = marshaller.dump_model(&model);
    let DrobyValue::Model(dump) = &first else {
        panic!("expected a model dump, got {}", first.kind());
    };
    assert_eq!(dump.name, "Patrol");
    assert_eq!(dump.chain, model.ancestry());

    let second = marshaller.dump_model(&model);
    assert_eq!(second, DrobyValue::RemoteId { id: dump.id });
    assert!(marshaller.model_registered("Patrol"));
}

#[test]
fn tasks_cross_the_link_under_their_origin_handle() {
    let mut plan_a = Plan::new();
    let model = patrol_model();
    plan_a.register_model(model.clone());
    let mut arguments = Arguments::new();
    arguments.set("speed", json!(0.5));
    let task = plan_a.add_task(model, arguments).unwrap();

    let mut side_a = marshaller();
    let mut side_b = marshaller();
    let wire = over_the_wire(&side_a.dump_task(&plan_a, task).unwrap());

    let mut plan_b = Plan::new();
    let loaded = side_b.local_task(&mut plan_b, &wire).unwrap();
    assert_eq!(loaded, task);

    let rebuilt = plan_b.task(loaded).unwrap();
    assert_eq!(rebuilt.model.name(), "Patrol");
    assert_eq!(rebuilt.arguments.value("speed"), Some(&json!(0.5)));
    assert_eq!(
        plan_b.bound_event(loaded, "stop").unwrap(),
        plan_a.bound_event(task, "stop").unwrap()
    );
}

#[test]
fn second_load_reuses_the_sibling() {
    let mut plan_a = Plan::new();
    let model = patrol_model();
    plan_a.register_model(model.clone());
    let task = plan_a.add_task(model, Arguments::new()).unwrap();

    let mut side_a = marshaller();
    let mut side_b = marshaller();
    let full = side_a.dump_task(&plan_a, task).unwrap();
    let reference = side_a.dump_task(&plan_a, task).unwrap();
    assert!(matches!(reference, DrobyValue::RemoteId { .. }));

    let mut plan_b = Plan::new();
    let first = side_b.local_task(&mut plan_b, &full).unwrap();
    let second = side_b.local_task(&mut plan_b, &reference).unwrap();
    assert_eq!(first, second);
    assert_eq!(plan_b.num_tasks(), 1);
}

#[test]
fn known_model_names_resolve_to_the_local_constant() {
    let mut side_a = marshaller();
    let mut side_b = marshaller();
    let model_a = patrol_model();
    let model_b = patrol_model();
    side_b.object_manager_mut().register_local_model(&model_b);

    let wire = side_a.dump_model(&model_a);
    let resolved = side_b.local_model(&wire).unwrap();
    assert!(Arc::ptr_eq(&resolved, &model_b));
}

#[test]
fn a_name_bound_to_another_identity_is_rejected() {
    let mut side_a = marshaller();
    let mut side_b = marshaller();
    let model_b = patrol_model();
    let other_identity = DrobyId {
        peer: PeerId::new(),
        local: 40,
    };
    side_b
        .object_manager_mut()
        .register_model_sibling(other_identity, &model_b);

    let wire = side_a.dump_model(&patrol_model());
    let err = side_b.local_model(&wire).unwrap_err();
    assert!(matches!(
        err,
        DrobyError::MismatchingLocalConstant { name, .. } if name == "Patrol"
    ));
}

#[test]
fn model_chains_rebuild_when_nothing_resolves() {
    let base = TaskModel::builder("Vehicle")
        .event("stop", true, true)
        .provides("mobile")
        .build();
    let leaf = TaskModel::builder("Patrol")
        .supermodel(base)
        .argument_with_default("speed", json!(1.0))
        .argument("area")
        .build();

    let mut side_a = marshaller();
    let mut side_b = marshaller();
    let wire = over_the_wire(&side_a.dump_model(&leaf));
    let rebuilt = side_b.local_model(&wire).unwrap();

    assert_eq!(rebuilt.ancestry(), leaf.ancestry());
    let stop = rebuilt.event("stop").unwrap();
    assert!(stop.controlable);
    assert!(stop.terminal);
    assert_eq!(
        rebuilt.argument("speed").unwrap().default,
        Some(json!(1.0))
    );
    assert!(rebuilt.argument("area").is_some());
    assert!(rebuilt.provides("mobile"));
}

#[test]
fn rebuilt_models_back_loaded_tasks() {
    let base = TaskModel::builder("Vehicle").event("stop", true, true).build();
    let leaf = TaskModel::builder("Patrol").supermodel(base).build();
    let mut plan_a = Plan::new();
    plan_a.register_model(leaf.clone());
    let task = plan_a.add_task(leaf, Arguments::new()).unwrap();

    let mut side_a = marshaller();
    let mut side_b = marshaller();
    let wire = over_the_wire(&side_a.dump_task(&plan_a, task).unwrap());

    let mut plan_b = Plan::new();
    let loaded = side_b.local_task(&mut plan_b, &wire).unwrap();
    assert_eq!(plan_b.task(loaded).unwrap().model.name(), "Patrol");
}

#[test]
fn unknown_references_fail_loudly() {
    let mut side_b = marshaller();
    let mut plan_b = Plan::new();
    let stranger = DrobyValue::RemoteId {
        id: DrobyId {
            peer: PeerId::new(),
            local: 99,
        },
    };
    assert!(matches!(
        side_b.local_task(&mut plan_b, &stranger),
        Err(DrobyError::NoLocalObject(_))
    ));
    assert!(matches!(
        side_b.local_event(&mut plan_b, &stranger),
        Err(DrobyError::NoLocalObject(_))
    ));
    assert!(matches!(
        side_b.local_model(&stranger),
        Err(DrobyError::NoLocalObject(_))
    ));
}

#[test]
fn delayed_arguments_cross_as_placeholders() {
    let mut plan_a = Plan::new();
    let model = TaskModel::builder("Probe").argument("pose").build();
    plan_a.register_model(model.clone());
    let mut arguments = Arguments::new();
    arguments.set_delayed("pose", "from localization");
    let task = plan_a.add_task(model, arguments).unwrap();

    let mut side_a = marshaller();
    let mut side_b = marshaller();
    let wire = over_the_wire(&side_a.dump_task(&plan_a, task).unwrap());

    let mut plan_b = Plan::new();
    let loaded = side_b.local_task(&mut plan_b, &wire).unwrap();
    let rebuilt = plan_b.task(loaded).unwrap();
    assert_eq!(
        rebuilt.arguments.get("pose"),
        Some(&ArgValue::Delayed {
            description: "from localization".to_string()
        })
    );
}

#[test]
fn free_events_roundtrip() {
    let mut plan_a = Plan::new();
    let event = plan_a.add_free_event(true);

    let mut side_a = marshaller();
    let mut side_b = marshaller();
    let wire = over_the_wire(&side_a.dump_event(&plan_a, event).unwrap());

    let mut plan_b = Plan::new();
    let loaded = side_b.local_event(&mut plan_b, &wire).unwrap();
    assert_eq!(loaded, event);
    assert!(plan_b.event(loaded).unwrap().controlable);

    let again = side_a.dump_event(&plan_a, event).unwrap();
    assert!(matches!(again, DrobyValue::RemoteId { .. }));
}

#[test]
fn plans_dump_by_identity() {
    let plan = Plan::new();
    let mut marshaller = marshaller();

    let first = marshaller.dump_plan(&plan);
    let DrobyValue::Plan(dump) = &first else {
        panic!("expected a plan dump, got {}", first.kind());
    };
    assert_eq!(dump.plan, plan.id());

    let second = marshaller.dump_plan(&plan);
    assert_eq!(second, DrobyValue::RemoteId { id: dump.id });
}

#[test]
fn exceptions_roundtrip() {
    let marshaller = marshaller();
    let error = LocalizedError::new(
        ErrorKind::CommandFailed,
        FailurePoint::Task { task: TaskId(3) },
        "start raised",
        Utc::now(),
    );
    let exception = ExecutionException {
        error,
        trace: vec![(TaskId(3), TaskId(1))],
        handled: false,
    };

    let wire = over_the_wire(&marshaller.dump_exception(&exception));
    let loaded = marshaller.local_exception(&wire).unwrap();
    assert_eq!(loaded.error, exception.error);
    assert_eq!(loaded.trace, exception.trace);
    assert!(!loaded.handled);
}

#[test]
fn values_dump_through_the_registry() {
    let marshaller = marshaller();
    let value = json!({ "$tag": "quantity", "value": 1500.0, "unit": "ms" });
    let wire = marshaller.dump_value(&value).unwrap();
    let loaded = marshaller.load_value(&wire).unwrap();
    assert!((loaded.as_f64().unwrap() - 1.5).abs() < 1e-9);
}
