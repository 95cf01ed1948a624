// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan-level error types
//!
//! Two families live here. `PlanError` and `TransactionError` are
//! ordinary API errors, returned to the caller that issued the bad
//! operation. `LocalizedError` and `ExecutionException` are data: the
//! execution layer catches failures, localizes them on a task or
//! generator, and routes the resulting exception up the dependency
//! graph instead of unwinding.

use crate::ids::{EventId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by plan operations
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("handle {0} was finalized and can no longer be used")]
    AlreadyFinalized(u64),

    #[error("unknown task {0}")]
    UnknownTask(TaskId),

    #[error("unknown event {0}")]
    UnknownEvent(EventId),

    #[error("unknown model {0}")]
    UnknownModel(String),

    #[error("task {task} is still reachable from {root}")]
    StillReachable { task: TaskId, root: TaskId },

    #[error("event {event} is still connected to required objects")]
    StillReachableEvent { event: EventId },

    #[error("event {0} is bound to a task and cannot be removed directly")]
    BoundEvent(EventId),

    #[error("conflicting edge info for key {key}")]
    ConflictingEdgeInfo { key: String },

    #[error("an object cannot be related to itself")]
    SelfRelation,

    #[error("model {model} declares no argument named {name}")]
    UnknownArgument { model: String, name: String },

    #[error("argument {name} of task {task} is frozen")]
    FrozenArgument { task: TaskId, name: String },

    #[error("model {model} declares no event named {symbol}")]
    UnknownSymbol { model: String, symbol: String },
}

/// What kind of failure an execution-layer error is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// User code (command, handler or hook) raised
    CodeError,
    /// A command could not be called
    CommandFailed,
    /// An emission could not be performed
    EmissionFailed,
    /// Start was called on a task that cannot be executed
    TaskNotExecutable,
    /// A call or emission targeted an unreachable generator
    UnreachableEvent,
    /// A mission task emitted failed
    MissionFailed,
    /// The task was quarantined
    QuarantinedTask,
}

/// Where an execution error is anchored in the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "at", rename_all = "snake_case")]
pub enum FailurePoint {
    Task { task: TaskId },
    Event { event: EventId },
}

impl FailurePoint {
    pub fn task(&self) -> Option<TaskId> {
        match self {
            FailurePoint::Task { task } => Some(*task),
            FailurePoint::Event { .. } => None,
        }
    }
}

/// An error localized on a plan object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{kind:?} at {failure_point:?}: {message}")]
pub struct LocalizedError {
    pub kind: ErrorKind,
    pub failure_point: FailurePoint,
    pub message: String,
    pub time: DateTime<Utc>,
}

impl LocalizedError {
    pub fn new(
        kind: ErrorKind,
        failure_point: FailurePoint,
        message: impl Into<String>,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            failure_point,
            message: message.into(),
            time,
        }
    }
}

/// A localized error travelling up the dependency graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionException {
    pub error: LocalizedError,
    /// Dependency edges crossed so far, as (child, parent) pairs
    pub trace: Vec<(TaskId, TaskId)>,
    pub handled: bool,
}

impl ExecutionException {
    pub fn new(error: LocalizedError) -> Self {
        Self {
            error,
            trace: Vec::new(),
            handled: false,
        }
    }

    /// The task the exception originated on, if any
    pub fn origin(&self) -> Option<TaskId> {
        self.error.failure_point.task()
    }
}

/// Errors returned by transaction operations
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// A proxied object was finalized in the underlying plan while the
    /// transaction was open
    #[error("object {0} left the plan while the transaction was open")]
    StaleProxy(u64),

    #[error("transaction aborted: {0}")]
    Aborted(String),
}
