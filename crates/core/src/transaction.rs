// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan transactions
//!
//! A transaction stages edits against a live plan without touching it.
//! Objects already in the plan are wrapped before use, new objects get
//! real handles reserved up front so staged edges can refer to them,
//! and reads see the overlay: staged state first, then the plan.
//!
//! `commit` first validates that every wrapped object still exists in
//! the plan, then applies the staged operations in order through the
//! plan's journalling entry points. `discard` (or dropping the
//! transaction) throws the staged state away.

use crate::arguments::Arguments;
use crate::errors::{PlanError, TransactionError};
use crate::ids::{EventId, TaskId};
use crate::model::TaskModel;
use crate::plan::Plan;
use crate::query::TaskMatcher;
use crate::relations::{EdgeInfo, EventRelation, TaskRelation};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// A task created inside the transaction, not yet in the plan
#[derive(Debug, Clone)]
pub(crate) struct StagedTask {
    pub(crate) id: TaskId,
    pub(crate) model: Arc<TaskModel>,
    pub(crate) arguments: Arguments,
    pub(crate) bound_events: BTreeMap<String, EventId>,
}

#[derive(Debug, Clone)]
enum TxOp {
    AddTask(TaskId),
    AddFreeEvent { event: EventId, controlable: bool },
    MarkMission(TaskId),
    UnmarkMission(TaskId),
    MarkPermanentTask(TaskId),
    UnmarkPermanentTask(TaskId),
    MarkPermanentEvent(EventId),
    SetArgument {
        task: TaskId,
        key: String,
        value: serde_json::Value,
    },
    AddTaskEdge {
        rel: TaskRelation,
        parent: TaskId,
        child: TaskId,
        info: EdgeInfo,
    },
    RemoveTaskEdge {
        rel: TaskRelation,
        parent: TaskId,
        child: TaskId,
    },
    AddEventEdge {
        rel: EventRelation,
        parent: EventId,
        child: EventId,
        info: EdgeInfo,
    },
    RemoveEventEdge {
        rel: EventRelation,
        parent: EventId,
        child: EventId,
    },
    RemoveTask(TaskId),
}

/// An open transaction against a plan
pub struct Transaction<'p> {
    plan: &'p mut Plan,
    ops: Vec<TxOp>,
    staged_tasks: BTreeMap<TaskId, StagedTask>,
    staged_events: BTreeSet<EventId>,
    wrapped_tasks: BTreeSet<TaskId>,
    wrapped_events: BTreeSet<EventId>,
    removed_tasks: BTreeSet<TaskId>,
}

impl<'p> Transaction<'p> {
    pub fn new(plan: &'p mut Plan) -> Self {
        Self {
            plan,
            ops: Vec::new(),
            staged_tasks: BTreeMap::new(),
            staged_events: BTreeSet::new(),
            wrapped_tasks: BTreeSet::new(),
            wrapped_events: BTreeSet::new(),
            removed_tasks: BTreeSet::new(),
        }
    }

    /// The underlying plan, read-only
    pub fn plan(&self) -> &Plan {
        self.plan
    }

    // ---- wrapping ------------------------------------------------------

    /// Bring an existing plan task into the transaction. The handle is
    /// stable, so wrapping registers it for commit-time validation.
    pub fn wrap_task(&mut self, id: TaskId) -> Result<TaskId, TransactionError> {
        if self.staged_tasks.contains_key(&id) {
            return Ok(id);
        }
        self.plan.task(id)?;
        self.wrapped_tasks.insert(id);
        Ok(id)
    }

    /// Bring an existing plan generator into the transaction
    pub fn wrap_event(&mut self, id: EventId) -> Result<EventId, TransactionError> {
        if self.staged_events.contains(&id) {
            return Ok(id);
        }
        self.plan.event(id)?;
        self.wrapped_events.insert(id);
        Ok(id)
    }

    // ---- staged edits --------------------------------------------------

    /// Create a task in the overlay. Handles are reserved in the plan
    /// immediately so staged relations can reference them.
    pub fn add_task(
        &mut self,
        model: Arc<TaskModel>,
        arguments: Arguments,
    ) -> Result<TaskId, TransactionError> {
        for (key, _) in arguments.iter() {
            if model.argument(key).is_none() {
                return Err(PlanError::UnknownArgument {
                    model: model.name().to_string(),
                    name: key.to_string(),
                }
                .into());
            }
        }

        let id = TaskId(self.plan.reserve_handle());
        let mut bound_events = BTreeMap::new();
        for def in model.each_event() {
            bound_events.insert(def.name.clone(), EventId(self.plan.reserve_handle()));
        }
        self.staged_events.extend(bound_events.values().copied());
        self.staged_tasks.insert(
            id,
            StagedTask {
                id,
                model,
                arguments,
                bound_events,
            },
        );
        self.ops.push(TxOp::AddTask(id));
        Ok(id)
    }

    pub fn add_mission_task(
        &mut self,
        model: Arc<TaskModel>,
        arguments: Arguments,
    ) -> Result<TaskId, TransactionError> {
        let id = self.add_task(model, arguments)?;
        self.mark_mission(id)?;
        Ok(id)
    }

    pub fn add_free_event(&mut self, controlable: bool) -> EventId {
        let id = EventId(self.plan.reserve_handle());
        self.staged_events.insert(id);
        self.ops.push(TxOp::AddFreeEvent {
            event: id,
            controlable,
        });
        id
    }

    pub fn mark_mission(&mut self, id: TaskId) -> Result<(), TransactionError> {
        self.require_task(id)?;
        self.ops.push(TxOp::MarkMission(id));
        Ok(())
    }

    pub fn unmark_mission(&mut self, id: TaskId) -> Result<(), TransactionError> {
        self.require_task(id)?;
        self.ops.push(TxOp::UnmarkMission(id));
        Ok(())
    }

    pub fn mark_permanent_task(&mut self, id: TaskId) -> Result<(), TransactionError> {
        self.require_task(id)?;
        self.ops.push(TxOp::MarkPermanentTask(id));
        Ok(())
    }

    pub fn unmark_permanent_task(&mut self, id: TaskId) -> Result<(), TransactionError> {
        self.require_task(id)?;
        self.ops.push(TxOp::UnmarkPermanentTask(id));
        Ok(())
    }

    pub fn mark_permanent_event(&mut self, id: EventId) -> Result<(), TransactionError> {
        self.require_event(id)?;
        self.ops.push(TxOp::MarkPermanentEvent(id));
        Ok(())
    }

    pub fn set_argument(
        &mut self,
        id: TaskId,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), TransactionError> {
        let model = self.task_model(id)?;
        if model.argument(key).is_none() {
            return Err(PlanError::UnknownArgument {
                model: model.name().to_string(),
                name: key.to_string(),
            }
            .into());
        }
        // Staged new tasks carry their arguments directly
        if let Some(staged) = self.staged_tasks.get_mut(&id) {
            if !staged.arguments.set(key, value) {
                return Err(PlanError::FrozenArgument {
                    task: id,
                    name: key.to_string(),
                }
                .into());
            }
            return Ok(());
        }
        if self.plan.task(id)?.arguments.is_frozen(key) {
            return Err(PlanError::FrozenArgument {
                task: id,
                name: key.to_string(),
            }
            .into());
        }
        self.ops.push(TxOp::SetArgument {
            task: id,
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    pub fn add_task_edge(
        &mut self,
        rel: TaskRelation,
        parent: TaskId,
        child: TaskId,
        info: EdgeInfo,
    ) -> Result<(), TransactionError> {
        self.require_task(parent)?;
        self.require_task(child)?;
        if parent == child {
            return Err(PlanError::SelfRelation.into());
        }
        self.ops.push(TxOp::AddTaskEdge {
            rel,
            parent,
            child,
            info,
        });
        Ok(())
    }

    pub fn remove_task_edge(
        &mut self,
        rel: TaskRelation,
        parent: TaskId,
        child: TaskId,
    ) -> Result<(), TransactionError> {
        self.require_task(parent)?;
        self.require_task(child)?;
        self.ops.push(TxOp::RemoveTaskEdge { rel, parent, child });
        Ok(())
    }

    pub fn add_event_edge(
        &mut self,
        rel: EventRelation,
        parent: EventId,
        child: EventId,
        info: EdgeInfo,
    ) -> Result<(), TransactionError> {
        self.require_event(parent)?;
        self.require_event(child)?;
        if parent == child {
            return Err(PlanError::SelfRelation.into());
        }
        self.ops.push(TxOp::AddEventEdge {
            rel,
            parent,
            child,
            info,
        });
        Ok(())
    }

    pub fn remove_event_edge(
        &mut self,
        rel: EventRelation,
        parent: EventId,
        child: EventId,
    ) -> Result<(), TransactionError> {
        self.require_event(parent)?;
        self.require_event(child)?;
        self.ops.push(TxOp::RemoveEventEdge { rel, parent, child });
        Ok(())
    }

    /// Stage the removal of a plan task
    pub fn remove_task(&mut self, id: TaskId) -> Result<(), TransactionError> {
        if let Some(staged) = self.staged_tasks.remove(&id) {
            // Never reached the plan; drop every staged op touching the
            // task or its bound generators
            let dead: BTreeSet<EventId> = staged.bound_events.values().copied().collect();
            self.ops
                .retain(|op| !op_touches_task(op, id) && !op_touches_events(op, &dead));
            for event in &dead {
                self.staged_events.remove(event);
            }
            return Ok(());
        }
        self.wrap_task(id)?;
        self.removed_tasks.insert(id);
        self.ops.push(TxOp::RemoveTask(id));
        Ok(())
    }

    // ---- overlay reads -------------------------------------------------

    /// Whether the task is visible through the transaction
    pub fn contains_task(&self, id: TaskId) -> bool {
        if self.removed_tasks.contains(&id) {
            return false;
        }
        self.staged_tasks.contains_key(&id) || self.plan.task(id).is_ok()
    }

    /// The model of a task seen through the transaction
    pub fn task_model(&self, id: TaskId) -> Result<Arc<TaskModel>, TransactionError> {
        if self.removed_tasks.contains(&id) {
            return Err(PlanError::UnknownTask(id).into());
        }
        if let Some(staged) = self.staged_tasks.get(&id) {
            return Ok(staged.model.clone());
        }
        Ok(self.plan.task(id)?.model.clone())
    }

    /// The argument value visible through the transaction: staged
    /// assignments shadow the plan's.
    pub fn argument(&self, id: TaskId, key: &str) -> Result<Option<serde_json::Value>, TransactionError> {
        if self.removed_tasks.contains(&id) {
            return Err(PlanError::UnknownTask(id).into());
        }
        if let Some(staged) = self.staged_tasks.get(&id) {
            return Ok(staged.arguments.value(key).cloned());
        }
        for op in self.ops.iter().rev() {
            if let TxOp::SetArgument {
                task,
                key: staged_key,
                value,
            } = op
            {
                if *task == id && staged_key == key {
                    return Ok(Some(value.clone()));
                }
            }
        }
        Ok(self.plan.task(id)?.arguments.value(key).cloned())
    }

    /// The generator bound to a task seen through the transaction
    pub fn bound_event(&self, id: TaskId, symbol: &str) -> Result<EventId, TransactionError> {
        if self.removed_tasks.contains(&id) {
            return Err(PlanError::UnknownTask(id).into());
        }
        if let Some(staged) = self.staged_tasks.get(&id) {
            return staged.bound_events.get(symbol).copied().ok_or_else(|| {
                TransactionError::Plan(PlanError::UnknownSymbol {
                    model: staged.model.name().to_string(),
                    symbol: symbol.to_string(),
                })
            });
        }
        Ok(self.plan.bound_event(id, symbol)?)
    }

    /// Match tasks through the overlay: staged tasks plus the plan's,
    /// minus staged removals.
    pub fn find_tasks(&self, matcher: &TaskMatcher) -> Vec<TaskId> {
        let mut out: Vec<TaskId> = Vec::new();
        for staged in self.staged_tasks.values() {
            if matcher.matches_parts(&staged.model, &staged.arguments, None) {
                out.push(staged.id);
            }
        }
        for id in matcher.each_in(self.plan) {
            if !self.removed_tasks.contains(&id) {
                out.push(id);
            }
        }
        out.sort_unstable();
        out
    }

    // ---- outcome -------------------------------------------------------

    /// Apply the staged operations to the plan
    pub fn commit(self) -> Result<(), TransactionError> {
        for &id in &self.wrapped_tasks {
            if self.plan.task(id).is_err() {
                return Err(TransactionError::StaleProxy(id.0));
            }
        }
        for &id in &self.wrapped_events {
            if self.plan.event(id).is_err() {
                return Err(TransactionError::StaleProxy(id.0));
            }
        }

        let Transaction {
            plan,
            ops,
            mut staged_tasks,
            ..
        } = self;

        for op in ops {
            match op {
                TxOp::AddTask(id) => {
                    let staged = staged_tasks
                        .remove(&id)
                        .ok_or(PlanError::UnknownTask(id))?;
                    let mut arguments = staged.arguments;
                    for def in staged.model.each_argument() {
                        if arguments.get(&def.name).is_none() {
                            if let Some(default) = def.default.clone() {
                                arguments.apply(
                                    def.name.clone(),
                                    crate::arguments::ArgValue::Set { value: default },
                                );
                            }
                        }
                    }
                    plan.install_task(staged.id, staged.model, arguments, staged.bound_events)?;
                }
                TxOp::AddFreeEvent { event, controlable } => {
                    plan.install_free_event(event, controlable);
                }
                TxOp::MarkMission(id) => plan.mark_mission(id)?,
                TxOp::UnmarkMission(id) => plan.unmark_mission(id)?,
                TxOp::MarkPermanentTask(id) => plan.mark_permanent_task(id)?,
                TxOp::UnmarkPermanentTask(id) => plan.unmark_permanent_task(id)?,
                TxOp::MarkPermanentEvent(id) => plan.mark_permanent_event(id)?,
                TxOp::SetArgument { task, key, value } => {
                    plan.set_argument(task, &key, value)?;
                }
                TxOp::AddTaskEdge {
                    rel,
                    parent,
                    child,
                    info,
                } => plan.add_task_edge(rel, parent, child, info)?,
                TxOp::RemoveTaskEdge { rel, parent, child } => {
                    plan.remove_task_edge(rel, parent, child)?;
                }
                TxOp::AddEventEdge {
                    rel,
                    parent,
                    child,
                    info,
                } => plan.add_event_edge(rel, parent, child, info)?,
                TxOp::RemoveEventEdge { rel, parent, child } => {
                    plan.remove_event_edge(rel, parent, child)?;
                }
                TxOp::RemoveTask(id) => plan.force_remove_task(id)?,
            }
        }
        Ok(())
    }

    /// Drop the staged operations without touching the plan
    pub fn discard(self) {}

    // ---- helpers -------------------------------------------------------

    fn require_task(&mut self, id: TaskId) -> Result<(), TransactionError> {
        if self.removed_tasks.contains(&id) {
            return Err(PlanError::UnknownTask(id).into());
        }
        if self.staged_tasks.contains_key(&id) {
            return Ok(());
        }
        self.wrap_task(id)?;
        Ok(())
    }

    fn require_event(&mut self, id: EventId) -> Result<(), TransactionError> {
        if self.staged_events.contains(&id) {
            return Ok(());
        }
        self.wrap_event(id)?;
        Ok(())
    }
}

fn op_touches_task(op: &TxOp, id: TaskId) -> bool {
    match op {
        TxOp::AddTask(task)
        | TxOp::MarkMission(task)
        | TxOp::UnmarkMission(task)
        | TxOp::MarkPermanentTask(task)
        | TxOp::UnmarkPermanentTask(task)
        | TxOp::RemoveTask(task)
        | TxOp::SetArgument { task, .. } => *task == id,
        TxOp::AddTaskEdge { parent, child, .. } | TxOp::RemoveTaskEdge { parent, child, .. } => {
            *parent == id || *child == id
        }
        TxOp::AddFreeEvent { .. }
        | TxOp::MarkPermanentEvent(_)
        | TxOp::AddEventEdge { .. }
        | TxOp::RemoveEventEdge { .. } => false,
    }
}

fn op_touches_events(op: &TxOp, events: &BTreeSet<EventId>) -> bool {
    match op {
        TxOp::AddEventEdge { parent, child, .. } | TxOp::RemoveEventEdge { parent, child, .. } => {
            events.contains(parent) || events.contains(child)
        }
        TxOp::MarkPermanentEvent(event) | TxOp::AddFreeEvent { event, .. } => {
            events.contains(event)
        }
        _ => false,
    }
}

impl Plan {
    /// Run a closure inside a transaction: commit on success, discard
    /// on error.
    pub fn in_transaction<T>(
        &mut self,
        f: impl FnOnce(&mut Transaction<'_>) -> Result<T, TransactionError>,
    ) -> Result<T, TransactionError> {
        let mut tx = Transaction::new(self);
        match f(&mut tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                tx.discard();
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "transaction_tests.rs"]
mod tests;
