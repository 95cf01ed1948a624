//! Log replay specs
//!
//! A logged run rebuilt from its file alone must land on the plan the
//! live engine ended with.

use crate::prelude::*;
use std::path::Path;
use weft_droby::{Marshaller, PeerId, TypeRegistry};
use weft_log::{EventLogger, PlanRebuilder};

fn logging_engine(path: &Path) -> ExecutionEngine<FakeClock> {
    let mut engine = fresh_engine();
    let marshaller = Marshaller::new(PeerId::new(), TypeRegistry::with_builtins());
    let logger = EventLogger::create(path, marshaller).unwrap();
    engine.add_sink(Box::new(logger));
    engine
}

fn plan_summary(plan: &Plan) -> Vec<(TaskId, String, String, bool)> {
    let mut tasks: Vec<_> = plan
        .tasks()
        .map(|task| {
            (
                task.id,
                task.model.name().to_string(),
                format!("{:?}", task.state),
                plan.is_mission(task.id),
            )
        })
        .collect();
    tasks.sort();
    tasks
}

#[test]
fn a_rebuilt_plan_matches_the_live_one() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.weftlog");
    let mut engine = logging_engine(&path);

    let model = patrol_model();
    let plan = engine.plan_mut();
    let lead = plan.add_task(model.clone(), Arguments::new()).unwrap();
    plan.mark_mission(lead).unwrap();
    let scout = plan.add_task(model.clone(), Arguments::new()).unwrap();
    plan.mark_mission(scout).unwrap();
    let mut arguments = Arguments::new();
    arguments.set("speed", json!(4));
    let escort = plan.add_task(model, arguments).unwrap();
    forward(plan, escort, "start", "success");

    engine.queue_start(lead).unwrap();
    engine.queue_start(escort).unwrap();
    engine.run_cycle().unwrap(); // lead runs, escort finishes and is garbaged
    engine.run_cycle().unwrap(); // escort is finalized out of the plan
    engine.run_cycle().unwrap();
    engine.shutdown().unwrap();

    let rebuilt = PlanRebuilder::rebuild(&path).unwrap();
    assert_eq!(rebuilt.cycles_applied(), 3);
    assert_eq!(rebuilt.plan().id(), engine.plan().id());
    similar_asserts::assert_eq!(
        live: plan_summary(engine.plan()),
        rebuilt: plan_summary(rebuilt.plan())
    );

    // the replayed history carries the original timestamps and wave ids
    let lead_start = engine.plan().bound_event(lead, "start").unwrap();
    let live_history = &engine.plan().event(lead_start).unwrap().history;
    assert_eq!(live_history.len(), 1);
    similar_asserts::assert_eq!(
        live: live_history,
        rebuilt: &rebuilt.plan().event(lead_start).unwrap().history
    );

    // scout never started, so its task survived untouched
    assert!(rebuilt.plan().task(scout).unwrap().is_pending());
    assert!(rebuilt.plan().task(escort).is_err());
}

#[test]
fn replay_restores_model_declarations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.weftlog");
    let mut engine = logging_engine(&path);

    let plan = engine.plan_mut();
    let task = plan.add_task(patrol_model(), Arguments::new()).unwrap();
    plan.mark_mission(task).unwrap();
    engine.queue_start(task).unwrap();
    engine.run_cycle().unwrap();
    engine.shutdown().unwrap();

    let rebuilt = PlanRebuilder::rebuild(&path).unwrap();
    assert_eq!(rebuilt.cycles_applied(), 1);

    let model = rebuilt.plan().model("Patrol").unwrap();
    let stop = model.event("stop").unwrap();
    assert!(stop.controlable);
    assert!(stop.terminal);
    assert_eq!(model.argument("speed").unwrap().default, Some(json!(1)));

    let record = rebuilt.last_cycle().unwrap();
    assert_eq!(record.cycle_index, 0);
}
