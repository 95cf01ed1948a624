//! Event propagation specs
//!
//! Cross-task propagation observed from outside the engine crate: one
//! cycle, one propagation wave, and the report that documents it.

use crate::prelude::*;
use weft_core::ErrorKind;

fn propagation_ids(changes: &[PlanChange]) -> Vec<u64> {
    changes
        .iter()
        .filter_map(|change| match change {
            PlanChange::EventEmitted { propagation_id, .. } => Some(*propagation_id),
            _ => None,
        })
        .collect()
}

#[test]
fn a_signal_starts_the_signalled_task_in_the_same_cycle() {
    let mut engine = fresh_engine();
    let model = patrol_model();
    let plan = engine.plan_mut();
    let lead = plan.add_task(model.clone(), Arguments::new()).unwrap();
    let escort = plan.add_task(model, Arguments::new()).unwrap();
    plan.mark_mission(lead).unwrap();
    plan.mark_mission(escort).unwrap();
    let lead_start = plan.bound_event(lead, "start").unwrap();
    let escort_start = plan.bound_event(escort, "start").unwrap();
    plan.add_event_edge(EventRelation::Signal, lead_start, escort_start, EdgeInfo::new())
        .unwrap();

    engine.queue_start(lead).unwrap();
    let report = engine.run_cycle().unwrap();

    assert!(engine.plan().task(lead).unwrap().is_running());
    assert!(engine.plan().task(escort).unwrap().is_running());
    let ids = propagation_ids(&report.changes);
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[0], ids[1]);
}

#[test]
fn terminal_forwards_finish_a_task_in_one_wave() {
    let mut engine = fresh_engine();
    let plan = engine.plan_mut();
    let task = plan.add_task(patrol_model(), Arguments::new()).unwrap();
    plan.mark_mission(task).unwrap();
    forward(plan, task, "start", "success");

    engine.queue_start(task).unwrap();
    let report = engine.run_cycle().unwrap();

    let finished = engine.plan().task(task).unwrap();
    assert!(finished.is_finished());
    assert_eq!(finished.success, Some(true));
    assert!(report.exceptions.is_empty());
    // start, success and the implied stop all rode one propagation
    let ids = propagation_ids(&report.changes);
    assert_eq!(ids.len(), 3);
    assert!(ids.iter().all(|&id| id == ids[0]));
}

#[test]
fn a_failed_mission_surfaces_at_the_cycle_boundary() {
    let mut engine = fresh_engine();
    let plan = engine.plan_mut();
    let task = plan.add_task(patrol_model(), Arguments::new()).unwrap();
    plan.mark_mission(task).unwrap();
    forward(plan, task, "start", "failed");

    engine.queue_start(task).unwrap();
    let report = engine.run_cycle().unwrap();

    assert_eq!(report.exceptions.len(), 1);
    let exception = &report.exceptions[0];
    assert_eq!(exception.error.kind, ErrorKind::MissionFailed);
    assert_eq!(exception.error.failure_point.task(), Some(task));
    assert_eq!(engine.plan().task(task).unwrap().success, Some(false));
}
