//! Shared fixtures for the workspace specs.
//!
//! Spec modules glob-import this prelude for the common crate surface
//! and a couple of plan builders that several areas lean on.

pub use serde_json::json;
pub use std::collections::BTreeMap;
pub use std::sync::Arc;
pub use weft_core::{
    Arguments, EdgeInfo, EventRelation, FakeClock, Plan, PlanChange, TaskId, TaskModel,
};
pub use weft_engine::{EngineConfig, ExecutionEngine};

/// A concrete patrol-style model: stoppable, one defaulted argument.
pub fn patrol_model() -> Arc<TaskModel> {
    TaskModel::builder("Patrol")
        .argument_with_default("speed", json!(1))
        .event("stop", true, true)
        .build()
}

/// An engine over an empty plan and a fake clock.
pub fn fresh_engine() -> ExecutionEngine<FakeClock> {
    ExecutionEngine::new(Plan::new(), FakeClock::new(), EngineConfig::default())
}

/// Forward one bound event of a task to another of its events.
pub fn forward(plan: &mut Plan, task: TaskId, from: &str, to: &str) {
    let from = plan.bound_event(task, from).unwrap();
    let to = plan.bound_event(task, to).unwrap();
    plan.add_event_edge(EventRelation::Forward, from, to, EdgeInfo::new())
        .unwrap();
}
