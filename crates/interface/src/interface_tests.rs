// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interface tests
//!
//! These drive a real engine through the interface. The registry
//! carries a long-running stoppable action, two one-cycle actions
//! wired through forward edges, and an abstract one that can never
//! start.

use super::*;
use crate::packet::ActionDescription;
use serde_json::json;
use weft_core::{EdgeInfo, EventRelation, FakeClock, Plan, TaskModel};
use weft_engine::{EngineConfig, ExecutionEngine};

fn one_cycle_action(registry: &mut ActionRegistry, name: &str, outcome: &'static str) {
    let model = TaskModel::builder(name).build();
    let description = ActionDescription {
        name: name.to_string(),
        doc: None,
        arguments: Vec::new(),
    };
    registry.register(
        description,
        Box::new(move |plan: &mut Plan, arguments: &Arguments| {
            let task = plan.add_task(model.clone(), arguments.clone())?;
            let start = plan.bound_event(task, "start")?;
            let end = plan.bound_event(task, outcome)?;
            plan.add_event_edge(EventRelation::Forward, start, end, EdgeInfo::new())?;
            Ok(task)
        }),
    );
}

fn test_registry() -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    let patrol = TaskModel::builder("Patrol")
        .argument_with_default("speed", json!(1))
        .event("stop", true, true)
        .build();
    registry.register_model(&patrol, "walk the perimeter");
    one_cycle_action(&mut registry, "Charge", "success");
    one_cycle_action(&mut registry, "Selftest", "failed");
    let survey = TaskModel::builder("Survey").abstract_model().build();
    registry.register_model(&survey, "");
    registry
}

fn test_interface() -> Interface<FakeClock> {
    let engine = ExecutionEngine::new(Plan::new(), FakeClock::new(), EngineConfig::default());
    Interface::new(engine, test_registry())
}

fn kinds(packets: &[Packet]) -> Vec<&'static str> {
    packets.iter().map(Packet::kind).collect()
}

#[test]
fn start_job_marks_a_mission_and_queues_the_start() {
    let mut interface = test_interface();

    let job = interface.start_job("Patrol", Arguments::new()).unwrap();

    assert_eq!(job, JobId(1));
    let record = interface.job(job).unwrap();
    assert_eq!(record.state, JobState::Queued);
    assert!(interface.engine().plan().is_mission(record.task));

    interface.run_cycle().unwrap();
    assert_eq!(interface.job(job).unwrap().state, JobState::Started);
}

#[test]
fn unknown_actions_are_rejected() {
    let mut interface = test_interface();
    let result = interface.start_job("Teleport", Arguments::new());
    assert!(matches!(result, Err(InterfaceError::UnknownAction(name)) if name == "Teleport"));
}

#[test]
fn call_arguments_reach_the_task() {
    let mut interface = test_interface();
    let mut arguments = Arguments::new();
    arguments.set("speed", json!(3));

    let fast = interface.start_job("Patrol", arguments).unwrap();
    let lazy = interface.start_job("Patrol", Arguments::new()).unwrap();

    let plan = interface.engine().plan();
    let fast_task = plan.task(interface.job(fast).unwrap().task).unwrap();
    assert_eq!(fast_task.arguments.value("speed"), Some(&json!(3)));
    let lazy_task = plan.task(interface.job(lazy).unwrap().task).unwrap();
    assert_eq!(lazy_task.arguments.value("speed"), Some(&json!(1)));
}

#[test]
fn one_cycle_jobs_run_to_success() {
    let mut interface = test_interface();
    let job = interface.run_job("Charge", Arguments::new()).unwrap();
    assert_eq!(interface.job(job).unwrap().state, JobState::Success);
}

#[test]
fn failing_jobs_error_out_of_the_wait() {
    let mut interface = test_interface();
    let result = interface.run_job("Selftest", Arguments::new());
    match result {
        Err(InterfaceError::FailedAction { name, job, state }) => {
            assert_eq!(name, "Selftest");
            assert_eq!(job, JobId(1));
            assert_eq!(state, JobState::Failed);
        }
        other => panic!("expected a failed action, got {other:?}"),
    }
}

#[test]
fn abstract_actions_fail_to_start() {
    let mut interface = test_interface();
    let job = interface.start_job("Survey", Arguments::new()).unwrap();

    interface.run_cycle().unwrap();

    assert_eq!(interface.job(job).unwrap().state, JobState::Failed);
    let outbox = interface.drain_outbox();
    assert_eq!(kinds(&outbox), ["job_progress", "exception", "cycle_end"]);
}

#[test]
fn monitors_drop_with_their_main_job() {
    let mut interface = test_interface();
    let main = interface.start_job("Charge", Arguments::new()).unwrap();
    let monitor = interface
        .start_monitoring_job("Patrol", Arguments::new(), main)
        .unwrap();

    interface.run_cycle().unwrap();

    assert_eq!(interface.job(main).unwrap().state, JobState::Success);
    let record = interface.job(monitor).unwrap();
    assert_eq!(record.state, JobState::Dropped);
    assert!(!interface.engine().plan().is_mission(record.task));
}

#[test]
fn a_failing_monitor_fails_the_wait() {
    let mut interface = test_interface();
    let main = interface.start_job("Patrol", Arguments::new()).unwrap();
    let monitor = interface
        .start_monitoring_job("Selftest", Arguments::new(), main)
        .unwrap();

    let result = interface.wait_job(main);

    match result {
        Err(InterfaceError::FailedBackgroundJob { job, main: failed_for }) => {
            assert_eq!(job, monitor);
            assert_eq!(failed_for, main);
        }
        other => panic!("expected a failed background job, got {other:?}"),
    }
    // the main job itself kept running
    assert_eq!(interface.job(main).unwrap().state, JobState::Started);
}

#[test]
fn drop_job_leaves_the_stop_to_garbage_collection() {
    let mut interface = test_interface();
    let job = interface.start_job("Patrol", Arguments::new()).unwrap();
    let task = interface.job(job).unwrap().task;
    interface.run_cycle().unwrap();

    interface.drop_job(job).unwrap();
    assert!(!interface.engine().plan().is_mission(task));

    interface.run_cycle().unwrap();
    assert_eq!(interface.job(job).unwrap().state, JobState::Dropped);

    // the collector stops the unneeded task over the next cycles
    for _ in 0..3 {
        interface.run_cycle().unwrap();
    }
    let finished = interface
        .engine()
        .plan()
        .task(task)
        .map(|t| t.is_finished())
        .unwrap_or(true);
    assert!(finished);
}

#[test]
fn kill_job_stops_the_task_in_one_cycle() {
    let mut interface = test_interface();
    let job = interface.start_job("Patrol", Arguments::new()).unwrap();
    let task = interface.job(job).unwrap().task;
    interface.run_cycle().unwrap();
    assert!(interface.engine().plan().task(task).unwrap().is_running());

    interface.kill_job(job).unwrap();
    interface.run_cycle().unwrap();

    assert_eq!(interface.job(job).unwrap().state, JobState::Dropped);
    assert!(interface.engine().plan().task(task).unwrap().is_finished());
}

#[test]
fn unknown_jobs_are_rejected() {
    let mut interface = test_interface();
    let missing = JobId(9);
    assert!(matches!(
        interface.drop_job(missing),
        Err(InterfaceError::UnknownJob(JobId(9)))
    ));
    assert!(matches!(
        interface.kill_job(missing),
        Err(InterfaceError::UnknownJob(JobId(9)))
    ));
    assert!(matches!(
        interface.wait_job(missing),
        Err(InterfaceError::UnknownJob(JobId(9)))
    ));
    assert!(matches!(
        interface.start_monitoring_job("Patrol", Arguments::new(), missing),
        Err(InterfaceError::UnknownJob(JobId(9)))
    ));
    assert_eq!(interface.jobs().count(), 0);
}

#[test]
fn the_outbox_orders_progress_exceptions_and_cycle_end() {
    let mut interface = test_interface();
    interface.notify(NotificationLevel::Info, "starting up");
    interface.ui_event("battery", vec![DrobyValue::Int { value: 80 }]);
    interface.start_job("Patrol", Arguments::new()).unwrap();

    let report = interface.run_cycle().unwrap();
    let outbox = interface.drain_outbox();

    assert_eq!(
        kinds(&outbox),
        ["notification", "ui_event", "job_progress", "cycle_end"]
    );
    assert_eq!(
        outbox.last(),
        Some(&Packet::CycleEnd {
            cycle_index: report.cycle_index
        })
    );
    assert!(interface.drain_outbox().is_empty());
}

#[test]
fn dispatch_start_job_returns_the_id() {
    let mut interface = test_interface();
    let mut kwargs = BTreeMap::new();
    kwargs.insert("speed".to_string(), DrobyValue::Int { value: 3 });

    let value = interface
        .dispatch(
            "start_job",
            &[DrobyValue::Str {
                value: "Patrol".to_string(),
            }],
            &kwargs,
        )
        .unwrap();

    assert_eq!(value, DrobyValue::Int { value: 1 });
    let task = interface.job(JobId(1)).unwrap().task;
    let task = interface.engine().plan().task(task).unwrap();
    assert_eq!(task.arguments.value("speed"), Some(&json!(3)));
}

#[test]
fn dispatch_rejects_unknown_methods_and_bad_arguments() {
    let mut interface = test_interface();
    let empty = BTreeMap::new();

    assert!(matches!(
        interface.dispatch("reboot", &[], &empty),
        Err(InterfaceError::UnknownMethod(name)) if name == "reboot"
    ));
    assert!(matches!(
        interface.dispatch("start_job", &[], &empty),
        Err(InterfaceError::BadArguments(_))
    ));
    assert!(matches!(
        interface.dispatch(
            "drop_job",
            &[DrobyValue::Str {
                value: "one".to_string()
            }],
            &empty
        ),
        Err(InterfaceError::BadArguments(_))
    ));
}

#[test]
fn dispatch_jobs_lists_summaries() {
    let mut interface = test_interface();
    let job = interface.start_job("Patrol", Arguments::new()).unwrap();
    interface.run_cycle().unwrap();

    let value = interface.dispatch("jobs", &[], &BTreeMap::new()).unwrap();

    let DrobyValue::Array { items } = value else {
        panic!("expected an array, got {value:?}");
    };
    assert_eq!(items.len(), 1);
    let DrobyValue::Map { entries } = &items[0] else {
        panic!("expected a map, got {:?}", items[0]);
    };
    assert_eq!(map_get(entries, "id"), Some(&DrobyValue::Int { value: 1 }));
    assert_eq!(
        map_get(entries, "name"),
        Some(&DrobyValue::Str {
            value: "Patrol".to_string()
        })
    );
    assert_eq!(
        map_get(entries, "state"),
        Some(&DrobyValue::Str {
            value: "started".to_string()
        })
    );
    let task = interface.job(job).unwrap().task;
    assert_eq!(
        map_get(entries, "task"),
        Some(&DrobyValue::Int {
            value: task.0 as i64
        })
    );
}

#[test]
fn dispatch_actions_lists_names_in_order() {
    let mut interface = test_interface();
    let value = interface.dispatch("actions", &[], &BTreeMap::new()).unwrap();
    let DrobyValue::Array { items } = value else {
        panic!("expected an array, got {value:?}");
    };
    let names: Vec<&str> = items
        .iter()
        .filter_map(|item| match item {
            DrobyValue::Str { value } => Some(value.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(names, ["Charge", "Patrol", "Selftest", "Survey"]);
}

fn batch_entry(method: &str, args: Vec<DrobyValue>) -> DrobyValue {
    DrobyValue::Map {
        entries: vec![
            entry(
                "method",
                DrobyValue::Str {
                    value: method.to_string(),
                },
            ),
            entry("args", DrobyValue::Array { items: args }),
        ],
    }
}

#[test]
fn batches_run_in_order_with_per_entry_outcomes() {
    let mut interface = test_interface();
    let entries = DrobyValue::Array {
        items: vec![
            batch_entry(
                "start_job",
                vec![DrobyValue::Str {
                    value: "Patrol".to_string(),
                }],
            ),
            batch_entry(
                "start_job",
                vec![DrobyValue::Str {
                    value: "Teleport".to_string(),
                }],
            ),
            // drops the job the first entry just created
            batch_entry("drop_job", vec![DrobyValue::Int { value: 1 }]),
        ],
    };

    let value = interface
        .dispatch("process_batch", &[entries], &BTreeMap::new())
        .unwrap();

    let DrobyValue::Array { items } = value else {
        panic!("expected an array, got {value:?}");
    };
    assert_eq!(items.len(), 3);

    let DrobyValue::Map { entries } = &items[0] else {
        panic!("expected a map, got {:?}", items[0]);
    };
    assert_eq!(
        map_get(entries, "status"),
        Some(&DrobyValue::Str {
            value: "ok".to_string()
        })
    );
    assert_eq!(map_get(entries, "value"), Some(&DrobyValue::Int { value: 1 }));

    let DrobyValue::Map { entries } = &items[1] else {
        panic!("expected a map, got {:?}", items[1]);
    };
    assert_eq!(
        map_get(entries, "status"),
        Some(&DrobyValue::Str {
            value: "error".to_string()
        })
    );
    match map_get(entries, "message") {
        Some(DrobyValue::Str { value }) => assert!(value.contains("Teleport")),
        other => panic!("expected a message, got {other:?}"),
    }

    let DrobyValue::Map { entries } = &items[2] else {
        panic!("expected a map, got {:?}", items[2]);
    };
    assert_eq!(
        map_get(entries, "status"),
        Some(&DrobyValue::Str {
            value: "ok".to_string()
        })
    );
}

#[test]
fn batches_cannot_nest() {
    let mut interface = test_interface();
    let entries = DrobyValue::Array {
        items: vec![batch_entry("process_batch", Vec::new())],
    };

    let value = interface
        .dispatch("process_batch", &[entries], &BTreeMap::new())
        .unwrap();

    let DrobyValue::Array { items } = value else {
        panic!("expected an array, got {value:?}");
    };
    let DrobyValue::Map { entries } = &items[0] else {
        panic!("expected a map, got {:?}", items[0]);
    };
    assert_eq!(
        map_get(entries, "status"),
        Some(&DrobyValue::Str {
            value: "error".to_string()
        })
    );
}
