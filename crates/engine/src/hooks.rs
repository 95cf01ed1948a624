// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hook surface for user code
//!
//! All user code runs inside the cycle as hooks: commands attached to
//! controlable generators, handlers attached to any generator, and
//! exception handlers attached to tasks. Hooks never touch the plan
//! directly; they queue further calls and emissions through the
//! [`PropagationHandle`] they are given, and the engine processes the
//! queues in order.

use std::collections::{HashMap, VecDeque};
use weft_core::{EventId, EventOccurrence, ExecutionException, Plan, TaskId};

/// Error type hooks are allowed to return
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Command attached to a controlable generator, run when it is called
pub type CommandFn =
    Box<dyn FnMut(&mut PropagationHandle<'_>, &[serde_json::Value]) -> Result<(), HookError>>;

/// Handler run after a generator emitted
pub type HandlerFn =
    Box<dyn FnMut(&mut PropagationHandle<'_>, &EventOccurrence) -> Result<(), HookError>>;

/// Handler run when an exception reaches a task. Returning true marks
/// the exception handled and stops it there.
pub type ExceptionHandlerFn =
    Box<dyn FnMut(&mut PropagationHandle<'_>, &ExecutionException) -> bool>;

/// Hook run at the very end of a cycle
pub type CycleEndFn = Box<dyn FnMut(&mut PropagationHandle<'_>) -> Result<(), HookError>>;

/// Work queued for the propagation phase
#[derive(Debug, Default)]
pub(crate) struct PendingQueues {
    pub(crate) calls: VecDeque<(EventId, Vec<serde_json::Value>)>,
    pub(crate) emissions: VecDeque<(EventId, Vec<serde_json::Value>)>,
}

/// The view hooks get of the engine: read the plan, queue more work
pub struct PropagationHandle<'a> {
    pub(crate) plan: &'a Plan,
    pub(crate) queues: &'a mut PendingQueues,
}

impl PropagationHandle<'_> {
    /// The plan, read-only
    pub fn plan(&self) -> &Plan {
        self.plan
    }

    /// Queue a call of a controlable generator
    pub fn call(&mut self, event: EventId, context: Vec<serde_json::Value>) {
        self.queues.calls.push_back((event, context));
    }

    /// Queue an emission
    pub fn emit(&mut self, event: EventId, context: Vec<serde_json::Value>) {
        self.queues.emissions.push_back((event, context));
    }
}

/// Hook tables, keyed by the object the hook is attached to
#[derive(Default)]
pub(crate) struct Hooks {
    pub(crate) commands: HashMap<EventId, CommandFn>,
    pub(crate) handlers: HashMap<EventId, Vec<HandlerFn>>,
    pub(crate) exception_handlers: HashMap<TaskId, Vec<ExceptionHandlerFn>>,
    pub(crate) global_exception_handlers: Vec<ExceptionHandlerFn>,
    pub(crate) cycle_end: Vec<CycleEndFn>,
}
