// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event generators
//!
//! A generator is the plan-side record of one event source: either free
//! (owned by the plan directly) or bound to a task under a symbol name.
//! Emissions are appended to its history; a generator that can never
//! emit again is marked unreachable.

use crate::ids::{EventId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded emission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventOccurrence {
    pub generator: EventId,
    pub context: Vec<serde_json::Value>,
    /// Identifier of the propagation pass this emission was part of.
    /// Everything propagated in one pass shares the same id.
    pub propagation_id: u64,
    pub time: DateTime<Utc>,
}

/// An event source in the plan
#[derive(Debug, Clone)]
pub struct EventGenerator {
    pub id: EventId,
    /// Owning task and symbol for task-bound generators, None for free ones
    pub owner: Option<(TaskId, String)>,
    pub controlable: bool,
    pub history: Vec<EventOccurrence>,
    pub unreachable: bool,
    pub unreachability_reason: Option<String>,
}

impl EventGenerator {
    pub fn free(id: EventId, controlable: bool) -> Self {
        Self {
            id,
            owner: None,
            controlable,
            history: Vec::new(),
            unreachable: false,
            unreachability_reason: None,
        }
    }

    pub fn bound(id: EventId, task: TaskId, symbol: impl Into<String>, controlable: bool) -> Self {
        Self {
            id,
            owner: Some((task, symbol.into())),
            controlable,
            history: Vec::new(),
            unreachable: false,
            unreachability_reason: None,
        }
    }

    pub fn is_free(&self) -> bool {
        self.owner.is_none()
    }

    /// The symbol this generator is bound under, if task-bound
    pub fn symbol(&self) -> Option<&str> {
        self.owner.as_ref().map(|(_, s)| s.as_str())
    }

    pub fn owner_task(&self) -> Option<TaskId> {
        self.owner.as_ref().map(|(t, _)| *t)
    }

    /// Whether this generator has emitted at least once
    pub fn emitted(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn last(&self) -> Option<&EventOccurrence> {
        self.history.last()
    }

    pub(crate) fn mark_unreachable(&mut self, reason: Option<String>) {
        self.unreachable = true;
        self.unreachability_reason = reason;
    }
}
