// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task records
//!
//! A task is a unit of work in the plan: a model, argument assignments,
//! role flags and execution state. Execution state is driven by the
//! lifecycle events: the `start` emission moves the task to running and
//! the `stop` emission ends it. A task whose start command fails never
//! runs at all and ends in `FailedToStart`.

use crate::arguments::Arguments;
use crate::ids::{EventId, TaskId};
use crate::model::TaskModel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Execution state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecState {
    /// In the plan, not started
    Pending,
    /// The start event has been emitted
    Running,
    /// A terminal event has been emitted
    Finished,
    /// The start command failed; the task never ran
    FailedToStart,
}

/// A task in the plan
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub model: Arc<TaskModel>,
    pub arguments: Arguments,
    pub state: ExecState,
    /// Emission outcome: Some(true) after success, Some(false) after failed
    pub success: Option<bool>,
    /// Abstract tasks are placeholders and cannot be started
    pub is_abstract: bool,
    /// Quarantined tasks are kept out of dependency accounting and GC
    pub quarantined: bool,
    /// Generators bound to this task, by symbol
    pub bound_events: BTreeMap<String, EventId>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: TaskId, model: Arc<TaskModel>, arguments: Arguments) -> Self {
        let is_abstract = model.is_abstract();
        Self {
            id,
            model,
            arguments,
            state: ExecState::Pending,
            success: None,
            is_abstract,
            quarantined: false,
            bound_events: BTreeMap::new(),
            started_at: None,
            finished_at: None,
        }
    }

    /// The generator bound under the given symbol
    pub fn event(&self, symbol: &str) -> Option<EventId> {
        self.bound_events.get(symbol).copied()
    }

    /// The generator for the start event
    pub fn start_event(&self) -> Option<EventId> {
        self.event("start")
    }

    /// The generator for the stop event
    pub fn stop_event(&self) -> Option<EventId> {
        self.event("stop")
    }

    pub fn is_pending(&self) -> bool {
        self.state == ExecState::Pending
    }

    pub fn is_running(&self) -> bool {
        self.state == ExecState::Running
    }

    pub fn is_finished(&self) -> bool {
        self.state == ExecState::Finished
    }

    pub fn failed_to_start(&self) -> bool {
        self.state == ExecState::FailedToStart
    }

    /// Whether the task reached any end state
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, ExecState::Finished | ExecState::FailedToStart)
    }

    /// Whether the task can be started: concrete model, every declared
    /// argument resolved, not quarantined and not already past pending.
    pub fn executable(&self) -> bool {
        !self.is_abstract
            && !self.quarantined
            && self.state == ExecState::Pending
            && self.arguments.fully_set()
            && self
                .model
                .each_argument()
                .iter()
                .all(|def| self.arguments.get(&def.name).is_some())
    }

    /// Record the start emission
    pub(crate) fn note_started(&mut self, time: DateTime<Utc>) {
        if self.state == ExecState::Pending {
            self.state = ExecState::Running;
            self.started_at = Some(time);
        }
    }

    /// Record a success/failed emission outcome
    pub(crate) fn note_outcome(&mut self, success: bool) {
        if self.success.is_none() {
            self.success = Some(success);
        }
    }

    /// Record the stop emission
    pub(crate) fn note_finished(&mut self, time: DateTime<Utc>) {
        if !self.is_terminal() {
            self.state = ExecState::Finished;
            self.finished_at = Some(time);
        }
    }

    pub(crate) fn note_failed_to_start(&mut self, time: DateTime<Utc>) {
        if self.state == ExecState::Pending {
            self.state = ExecState::FailedToStart;
            self.finished_at = Some(time);
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
