// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::logger::EventLogger;
use chrono::Utc;
use similar_asserts::assert_eq;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use weft_core::{Arguments, ExecState, FakeClock, TaskModel};
use weft_engine::{CycleReport, CycleSink, CycleStats, EngineConfig, ExecutionEngine};

fn temp_log_path() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.weftlog");
    (dir, path)
}

fn marshaller() -> Marshaller {
    Marshaller::new(PeerId::new(), TypeRegistry::with_builtins())
}

fn job_model() -> Arc<TaskModel> {
    TaskModel::builder("Job").event("stop", true, true).build()
}

fn structure(plan: &Plan) -> Vec<(u64, String, ExecState, bool)> {
    let mut rows: Vec<_> = plan
        .tasks()
        .map(|task| {
            (
                task.id.0,
                task.model.name().to_string(),
                task.state,
                plan.is_mission(task.id),
            )
        })
        .collect();
    rows.sort_by_key(|row| row.0);
    rows
}

#[test]
fn replay_reproduces_the_logged_plan() {
    let (_dir, path) = temp_log_path();
    let mut engine = ExecutionEngine::new(Plan::new(), FakeClock::new(), EngineConfig::default());
    let model = job_model();
    engine.plan_mut().register_model(model.clone());
    let task = engine
        .plan_mut()
        .add_mission_task(model, Arguments::new())
        .unwrap();

    let logger = EventLogger::create(&path, marshaller()).unwrap();
    engine.add_sink(Box::new(logger));

    engine.queue_start(task).unwrap();
    engine.run_cycle().unwrap();
    let stop = engine.plan().bound_event(task, "stop").unwrap();
    engine.queue_emit(stop, Vec::new());
    engine.run_cycle().unwrap();
    engine.shutdown().unwrap();

    let rebuilder = PlanRebuilder::rebuild(&path).unwrap();
    assert_eq!(rebuilder.cycles_applied(), 2);
    assert_eq!(structure(rebuilder.plan()), structure(engine.plan()));
    assert_eq!(
        rebuilder.plan().task(task).unwrap().state,
        ExecState::Finished
    );
    assert_eq!(rebuilder.plan().id(), engine.plan().id());
}

#[test]
fn garbage_collection_replays_through_both_phases() {
    let (_dir, path) = temp_log_path();
    let mut engine = ExecutionEngine::new(Plan::new(), FakeClock::new(), EngineConfig::default());
    let model = job_model();
    engine.plan_mut().register_model(model.clone());
    // Not a mission, so it is unneeded from the first cycle
    let task = engine
        .plan_mut()
        .add_task(model, Arguments::new())
        .unwrap();

    let logger = EventLogger::create(&path, marshaller()).unwrap();
    engine.add_sink(Box::new(logger));
    engine.run_cycle().unwrap();
    engine.run_cycle().unwrap();
    engine.shutdown().unwrap();

    let mut reader = Reader::open(&path).unwrap();
    let mut rebuilder = PlanRebuilder::new();

    // First cycle leaves the task garbaged but not yet finalized
    rebuilder
        .apply_cycle(&reader.load_one_cycle().unwrap().unwrap())
        .unwrap();
    assert!(rebuilder.plan().is_garbaged_task(task));
    assert!(rebuilder.plan().task(task).is_ok());

    // Second cycle finalizes it
    rebuilder
        .apply_cycle(&reader.load_one_cycle().unwrap().unwrap())
        .unwrap();
    assert!(rebuilder.plan().task(task).is_err());
    assert!(rebuilder.plan().is_empty());
}

#[test]
fn preregistered_models_are_reused_instead_of_rebuilt() {
    let (_dir, path) = temp_log_path();
    let mut plan = Plan::new();
    let model = job_model();
    plan.register_model(model.clone());
    plan.add_task(model, Arguments::new()).unwrap();

    let mut logger = EventLogger::create(&path, marshaller()).unwrap();
    let report = CycleReport {
        cycle_index: 0,
        start_time: Utc::now(),
        end_time: Utc::now(),
        changes: plan.drain_changes(),
        exceptions: Vec::new(),
        stats: CycleStats::default(),
    };
    logger.cycle_end(&report, &plan).unwrap();

    let local = job_model();
    let mut rebuilder = PlanRebuilder::new();
    rebuilder
        .marshaller_mut()
        .object_manager_mut()
        .register_local_model(&local);

    let mut reader = Reader::open(&path).unwrap();
    rebuilder
        .apply_cycle(&reader.load_one_cycle().unwrap().unwrap())
        .unwrap();

    let rebuilt = rebuilder.plan().tasks().next().unwrap();
    assert!(Arc::ptr_eq(&rebuilt.model, &local));
}

#[test]
fn unknown_record_methods_are_skipped() {
    let mut rebuilder = PlanRebuilder::new();
    let message = LogMessage {
        method: "telemetry".to_string(),
        plan: PlanId::new(),
        time: Utc::now(),
        args: serde_json::json!({ "channel": "battery", "level": 0.8 }),
    };
    rebuilder.apply_cycle(&[message]).unwrap();
    assert!(rebuilder.plan().is_empty());
    assert_eq!(rebuilder.cycles_applied(), 0);
}

#[test]
fn malformed_known_records_are_errors() {
    let mut rebuilder = PlanRebuilder::new();
    let message = LogMessage {
        method: METHOD_MODEL.to_string(),
        plan: PlanId::new(),
        time: Utc::now(),
        args: serde_json::json!(42),
    };
    let err = rebuilder.apply_cycle(&[message]).unwrap_err();
    assert!(matches!(
        err,
        RebuildError::MalformedRecord { method, .. } if method == METHOD_MODEL
    ));
}

#[test]
fn logged_exceptions_are_collected() {
    let mut rebuilder = PlanRebuilder::new();
    let dump = ExceptionDump {
        kind: weft_core::ErrorKind::MissionFailed,
        failure_point: weft_core::FailurePoint::Task {
            task: weft_core::TaskId(1),
        },
        message: "mission failed".to_string(),
        time: Utc::now(),
        trace: Vec::new(),
        handled: false,
    };
    let message = LogMessage::exception(PlanId::new(), dump.time, &dump).unwrap();
    rebuilder.apply_cycle(&[message]).unwrap();
    assert_eq!(rebuilder.exceptions().len(), 1);
    assert_eq!(rebuilder.exceptions()[0].message, "mission failed");
}
