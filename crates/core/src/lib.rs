// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! weft-core: plan graph for the weft execution framework
//!
//! This crate provides:
//! - Task and event generator records with their lifecycle state
//! - Typed relation graphs (dependency, planned-by, signal, forward)
//! - The `Plan` container: object tables, mission/permanent roots,
//!   garbage accounting and a change journal
//! - A transaction overlay for staged plan edits
//!
//! Everything here is pure data. Propagation, scheduling and I/O live
//! in the crates layered on top.

pub mod arguments;
pub mod change;
pub mod clock;
pub mod errors;
pub mod event;
pub mod ids;
pub mod model;
pub mod plan;
pub mod query;
pub mod relations;
pub mod task;
pub mod transaction;

// Re-exports
pub use arguments::{ArgValue, Arguments};
pub use change::PlanChange;
pub use clock::{Clock, FakeClock, SystemClock};
pub use errors::{
    ErrorKind, ExecutionException, FailurePoint, LocalizedError, PlanError, TransactionError,
};
pub use event::{EventGenerator, EventOccurrence};
pub use ids::{EventId, PlanId, TaskId};
pub use model::{ArgDef, EventDef, ModelBuilder, TaskModel, ROOT_MODEL_NAME};
pub use plan::Plan;
pub use query::TaskMatcher;
pub use relations::{
    merge_edge_info, EdgeChange, EdgeInfo, EventRelation, RelationGraph, TaskRelation,
};
pub use task::{ExecState, Task};
pub use transaction::Transaction;
