// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task queries
//!
//! A matcher is a predicate built up from model, tag, argument and
//! state filters, then run over a plan or through a transaction
//! overlay. Model matching follows the fulfillment rule: a task
//! matches a model name when that name appears anywhere in its model's
//! ancestry, and matches a tag when its model provides it.

use crate::arguments::Arguments;
use crate::ids::TaskId;
use crate::model::TaskModel;
use crate::plan::Plan;
use crate::task::{ExecState, Task};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A predicate over plan tasks
#[derive(Debug, Clone, Default)]
pub struct TaskMatcher {
    model: Option<String>,
    tag: Option<String>,
    arguments: BTreeMap<String, serde_json::Value>,
    state: Option<ExecState>,
    mission: Option<bool>,
    permanent: Option<bool>,
    executable: Option<bool>,
}

impl TaskMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match tasks whose model is the named one or derives from it
    pub fn with_model(mut self, name: impl Into<String>) -> Self {
        self.model = Some(name.into());
        self
    }

    /// Match tasks whose model provides the given tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Match tasks with the given argument set to the given value
    pub fn with_argument(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.arguments.insert(key.into(), value);
        self
    }

    pub fn pending(mut self) -> Self {
        self.state = Some(ExecState::Pending);
        self
    }

    pub fn running(mut self) -> Self {
        self.state = Some(ExecState::Running);
        self
    }

    pub fn finished(mut self) -> Self {
        self.state = Some(ExecState::Finished);
        self
    }

    pub fn failed_to_start(mut self) -> Self {
        self.state = Some(ExecState::FailedToStart);
        self
    }

    pub fn mission(mut self) -> Self {
        self.mission = Some(true);
        self
    }

    pub fn not_mission(mut self) -> Self {
        self.mission = Some(false);
        self
    }

    pub fn permanent(mut self) -> Self {
        self.permanent = Some(true);
        self
    }

    pub fn executable(mut self) -> Self {
        self.executable = Some(true);
        self
    }

    /// Whether a live plan task matches
    pub fn matches(&self, plan: &Plan, task: &Task) -> bool {
        self.matches_parts(&task.model, &task.arguments, Some((plan, task)))
    }

    /// Shared predicate over the pieces a transaction overlay can
    /// provide. `live` is None for staged tasks, which are pending,
    /// unmarked and judged executable from model and arguments alone.
    pub(crate) fn matches_parts(
        &self,
        model: &Arc<TaskModel>,
        arguments: &Arguments,
        live: Option<(&Plan, &Task)>,
    ) -> bool {
        if let Some(name) = &self.model {
            if !model.ancestry().iter().any(|m| m == name) {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !model.provides(tag) {
                return false;
            }
        }
        for (key, expected) in &self.arguments {
            if arguments.value(key) != Some(expected) {
                return false;
            }
        }

        let (state, mission, permanent, executable) = match live {
            Some((plan, task)) => (
                task.state,
                plan.is_mission(task.id),
                plan.is_permanent_task(task.id),
                task.executable(),
            ),
            None => (
                ExecState::Pending,
                false,
                false,
                !model.is_abstract() && arguments.fully_set(),
            ),
        };
        if let Some(expected) = self.state {
            if state != expected {
                return false;
            }
        }
        if let Some(expected) = self.mission {
            if mission != expected {
                return false;
            }
        }
        if let Some(expected) = self.permanent {
            if permanent != expected {
                return false;
            }
        }
        if let Some(expected) = self.executable {
            if executable != expected {
                return false;
            }
        }
        true
    }

    /// All matching tasks of a plan, in handle order
    pub fn each_in(&self, plan: &Plan) -> Vec<TaskId> {
        plan.tasks()
            .filter(|task| self.matches(plan, task))
            .map(|task| task.id)
            .collect()
    }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
