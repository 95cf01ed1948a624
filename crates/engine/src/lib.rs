// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! weft-engine: single-threaded event propagation over a plan
//!
//! The engine owns a plan and drives it in fixed-order cycles: finalize
//! last cycle's garbage, gather queued work, propagate calls and
//! emissions, route exceptions up the dependency graph, collect
//! unneeded objects, and hand the cycle report to the registered sinks.
//! User code runs only as hooks (commands, handlers, exception
//! handlers) invoked from inside the cycle; blocking work goes through
//! the promise pool and comes back as a completion in a later cycle.

pub mod config;
pub mod cycle;
pub mod engine;
pub mod errors;
pub mod hooks;
pub mod promises;
pub mod scheduler;

pub use config::EngineConfig;
pub use cycle::{CycleReport, CycleSink, CycleStats, SinkError};
pub use engine::{ContinuationFn, ExecutionEngine};
pub use errors::EngineError;
pub use hooks::{
    CommandFn, CycleEndFn, ExceptionHandlerFn, HandlerFn, HookError, PropagationHandle,
};
pub use promises::{PromiseId, PromiseJob, PromisePool};
pub use scheduler::{NullScheduler, Scheduler};
