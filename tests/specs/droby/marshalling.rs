//! Droby marshalling specs
//!
//! Two marshallers, two plans, and nothing shared between the peers
//! but the dumps that travel over the link.

use crate::prelude::*;
use weft_droby::{DrobyValue, Marshaller, PeerId, TypeRegistry};

fn peer() -> Marshaller {
    Marshaller::new(PeerId::new(), TypeRegistry::with_builtins())
}

#[test]
fn tasks_rebuild_on_the_receiving_peer() {
    let mut plan = Plan::new();
    let mut arguments = Arguments::new();
    arguments.set("speed", json!(3));
    let task = plan.add_task(patrol_model(), arguments).unwrap();

    let mut origin = peer();
    let dump = origin.dump_task(&plan, task).unwrap();

    let mut remote_plan = Plan::new();
    let mut remote = peer();
    let loaded = remote.local_task(&mut remote_plan, &dump).unwrap();

    let local = remote_plan.task(loaded).unwrap();
    assert_eq!(local.model.name(), "Patrol");
    assert_eq!(local.arguments.value("speed"), Some(&json!(3)));
    assert!(local.bound_events.contains_key("stop"));
    assert!(remote_plan.model("Patrol").is_ok());
}

#[test]
fn a_second_dump_collapses_to_the_shared_id() {
    let mut plan = Plan::new();
    let task = plan.add_task(patrol_model(), Arguments::new()).unwrap();

    let mut origin = peer();
    let first = origin.dump_task(&plan, task).unwrap();
    let second = origin.dump_task(&plan, task).unwrap();

    assert!(matches!(first, DrobyValue::Task(_)));
    let DrobyValue::RemoteId { id } = second else {
        panic!("expected a bare reference, got {second:?}");
    };

    let mut remote_plan = Plan::new();
    let mut remote = peer();
    let loaded = remote.local_task(&mut remote_plan, &first).unwrap();
    let referenced = remote
        .local_task(&mut remote_plan, &DrobyValue::RemoteId { id })
        .unwrap();

    assert_eq!(loaded, referenced);
    assert_eq!(remote_plan.num_tasks(), 1);
}

#[test]
fn models_travel_once_per_link() {
    let mut plan = Plan::new();
    let model = patrol_model();
    let first_task = plan.add_task(model.clone(), Arguments::new()).unwrap();
    let second_task = plan.add_task(model, Arguments::new()).unwrap();

    let mut origin = peer();
    let first = origin.dump_task(&plan, first_task).unwrap();
    let second = origin.dump_task(&plan, second_task).unwrap();

    let DrobyValue::Task(first_dump) = &first else {
        panic!("expected a task dump, got {first:?}");
    };
    let DrobyValue::Task(second_dump) = &second else {
        panic!("expected a task dump, got {second:?}");
    };
    assert!(matches!(first_dump.model.as_ref(), DrobyValue::Model(_)));
    assert!(matches!(
        second_dump.model.as_ref(),
        DrobyValue::RemoteId { .. }
    ));

    let mut remote_plan = Plan::new();
    let mut remote = peer();
    let a = remote.local_task(&mut remote_plan, &first).unwrap();
    let b = remote.local_task(&mut remote_plan, &second).unwrap();

    let model_a = remote_plan.task(a).unwrap().model.clone();
    let model_b = remote_plan.task(b).unwrap().model.clone();
    assert!(Arc::ptr_eq(&model_a, &model_b));
}

#[test]
fn exceptions_round_trip_between_peers() {
    let mut engine = fresh_engine();
    let plan = engine.plan_mut();
    let task = plan.add_task(patrol_model(), Arguments::new()).unwrap();
    plan.mark_mission(task).unwrap();
    forward(plan, task, "start", "failed");
    engine.queue_start(task).unwrap();
    let report = engine.run_cycle().unwrap();
    let exception = &report.exceptions[0];

    let origin = peer();
    let dump = origin.dump_exception(exception);
    let remote = peer();
    let loaded = remote.local_exception(&dump).unwrap();

    assert_eq!(&loaded, exception);
}
