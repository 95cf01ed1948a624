// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The plan: object tables, roots, relation graphs and the journal
//!
//! Tasks and generators are stored in handle-indexed tables. Missions,
//! permanent tasks and permanent events are the garbage-collection
//! roots. Every mutation goes through a method here so it lands in the
//! change journal; [`Plan::apply`] is the replay-side inverse that
//! applies a journalled record without journalling again.
//!
//! Collection is two-phase: objects found unneeded are first marked
//! garbaged and stay visible (tables, graphs, accessors), then
//! [`Plan::clear_integrated`] finalizes them. Finalized handles are
//! remembered so stale use reports `AlreadyFinalized` instead of
//! silently missing.

use crate::arguments::{ArgValue, Arguments};
use crate::change::PlanChange;
use crate::errors::PlanError;
use crate::event::EventGenerator;
use crate::ids::{EventId, PlanId, TaskId};
use crate::model::TaskModel;
use crate::relations::{EdgeChange, EdgeInfo, EventRelation, RelationGraph, TaskRelation};
use crate::task::Task;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Forward edges installed on every task when it is added, besides the
/// terminal-to-stop forwards derived from the model
const DEFAULT_FORWARDS: &[(&str, &str)] = &[("internal_error", "failed")];

/// A live plan
pub struct Plan {
    id: PlanId,
    tasks: BTreeMap<TaskId, Task>,
    events: BTreeMap<EventId, EventGenerator>,

    missions: BTreeSet<TaskId>,
    permanent_tasks: BTreeSet<TaskId>,
    permanent_events: BTreeSet<EventId>,

    dependency: RelationGraph<TaskId>,
    planned_by: RelationGraph<TaskId>,
    signal: RelationGraph<EventId>,
    forward: RelationGraph<EventId>,

    garbaged_tasks: BTreeSet<TaskId>,
    garbaged_events: BTreeSet<EventId>,
    finalized_tasks: BTreeSet<TaskId>,
    finalized_events: BTreeSet<EventId>,

    /// Models ever used in this plan, by name. Models are never collected.
    models: BTreeMap<String, Arc<TaskModel>>,

    journal: Vec<PlanChange>,
    next_handle: u64,
}

impl Plan {
    pub fn new() -> Self {
        Self::with_id(PlanId::new())
    }

    pub fn with_id(id: PlanId) -> Self {
        Self {
            id,
            tasks: BTreeMap::new(),
            events: BTreeMap::new(),
            missions: BTreeSet::new(),
            permanent_tasks: BTreeSet::new(),
            permanent_events: BTreeSet::new(),
            dependency: RelationGraph::new(),
            planned_by: RelationGraph::new(),
            signal: RelationGraph::new(),
            forward: RelationGraph::new(),
            garbaged_tasks: BTreeSet::new(),
            garbaged_events: BTreeSet::new(),
            finalized_tasks: BTreeSet::new(),
            finalized_events: BTreeSet::new(),
            models: BTreeMap::new(),
            journal: Vec::new(),
            next_handle: 1,
        }
    }

    pub fn id(&self) -> PlanId {
        self.id
    }

    /// Allocate a fresh handle. Handles are shared between tasks and
    /// events and are never reused.
    pub(crate) fn reserve_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn bump_handle(&mut self, used: u64) {
        if used >= self.next_handle {
            self.next_handle = used + 1;
        }
    }

    // ---- object lookup ------------------------------------------------

    pub fn task(&self, id: TaskId) -> Result<&Task, PlanError> {
        if self.finalized_tasks.contains(&id) {
            return Err(PlanError::AlreadyFinalized(id.0));
        }
        self.tasks.get(&id).ok_or(PlanError::UnknownTask(id))
    }

    fn task_mut(&mut self, id: TaskId) -> Result<&mut Task, PlanError> {
        if self.finalized_tasks.contains(&id) {
            return Err(PlanError::AlreadyFinalized(id.0));
        }
        self.tasks.get_mut(&id).ok_or(PlanError::UnknownTask(id))
    }

    pub fn event(&self, id: EventId) -> Result<&EventGenerator, PlanError> {
        if self.finalized_events.contains(&id) {
            return Err(PlanError::AlreadyFinalized(id.0));
        }
        self.events.get(&id).ok_or(PlanError::UnknownEvent(id))
    }

    fn event_mut(&mut self, id: EventId) -> Result<&mut EventGenerator, PlanError> {
        if self.finalized_events.contains(&id) {
            return Err(PlanError::AlreadyFinalized(id.0));
        }
        self.events.get_mut(&id).ok_or(PlanError::UnknownEvent(id))
    }

    /// The generator bound to `task` under `symbol`
    pub fn bound_event(&self, task: TaskId, symbol: &str) -> Result<EventId, PlanError> {
        let task = self.task(task)?;
        task.event(symbol).ok_or_else(|| PlanError::UnknownSymbol {
            model: task.model.name().to_string(),
            symbol: symbol.to_string(),
        })
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn events(&self) -> impl Iterator<Item = &EventGenerator> {
        self.events.values()
    }

    pub fn free_events(&self) -> impl Iterator<Item = &EventGenerator> {
        self.events.values().filter(|e| e.is_free())
    }

    pub fn num_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the plan holds no objects at all
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.events.values().all(|e| !e.is_free())
    }

    pub fn model(&self, name: &str) -> Result<&Arc<TaskModel>, PlanError> {
        self.models
            .get(name)
            .ok_or_else(|| PlanError::UnknownModel(name.to_string()))
    }

    /// Register a model so journal replay can resolve it by name
    pub fn register_model(&mut self, model: Arc<TaskModel>) {
        self.models
            .entry(model.name().to_string())
            .or_insert(model);
    }

    // ---- adding objects -----------------------------------------------

    /// Add a task of the given model. Arguments are validated against
    /// the model and model defaults are applied for missing keys.
    pub fn add_task(
        &mut self,
        model: Arc<TaskModel>,
        mut arguments: Arguments,
    ) -> Result<TaskId, PlanError> {
        for (key, _) in arguments.iter() {
            if model.argument(key).is_none() {
                return Err(PlanError::UnknownArgument {
                    model: model.name().to_string(),
                    name: key.to_string(),
                });
            }
        }

        let defaults: Vec<(String, serde_json::Value)> = model
            .each_argument()
            .iter()
            .filter(|def| arguments.get(&def.name).is_none())
            .filter_map(|def| def.default.clone().map(|v| (def.name.clone(), v)))
            .collect();
        for (name, value) in defaults {
            arguments.apply(name, ArgValue::Set { value });
        }

        let task_id = TaskId(self.reserve_handle());
        let mut bound = BTreeMap::new();
        for def in model.each_event() {
            bound.insert(def.name.clone(), EventId(self.reserve_handle()));
        }
        self.install_task(task_id, model, arguments, bound)?;
        Ok(task_id)
    }

    /// Insert a task with pre-reserved handles. Shared between
    /// [`Plan::add_task`] and transaction commit; arguments are assumed
    /// validated against the model.
    pub(crate) fn install_task(
        &mut self,
        task_id: TaskId,
        model: Arc<TaskModel>,
        arguments: Arguments,
        bound: BTreeMap<String, EventId>,
    ) -> Result<(), PlanError> {
        let mut task = Task::new(task_id, model.clone(), arguments);
        for def in model.each_event() {
            if let Some(&event_id) = bound.get(&def.name) {
                let generator =
                    EventGenerator::bound(event_id, task_id, &def.name, def.controlable);
                self.events.insert(event_id, generator);
                task.bound_events.insert(def.name.clone(), event_id);
            }
        }

        self.register_model(model);
        self.journal.push(PlanChange::TaskAdded {
            task: task_id,
            model: task.model.name().to_string(),
            arguments: task.arguments.snapshot(),
            bound_events: task.bound_events.clone(),
        });

        let terminal_symbols: Vec<String> = task
            .model
            .each_event()
            .iter()
            .filter(|def| def.terminal && def.name != "stop")
            .map(|def| def.name.clone())
            .collect();
        self.tasks.insert(task_id, task);

        for (from, to) in DEFAULT_FORWARDS {
            if let (Some(&from), Some(&to)) = (bound.get(*from), bound.get(*to)) {
                self.add_event_edge(EventRelation::Forward, from, to, EdgeInfo::new())?;
            }
        }
        // Every terminal event ends the task, expressed as a forward to stop
        for symbol in terminal_symbols {
            if let (Some(&from), Some(&to)) = (bound.get(&symbol), bound.get("stop")) {
                self.add_event_edge(EventRelation::Forward, from, to, EdgeInfo::new())?;
            }
        }
        Ok(())
    }

    /// Add a task and mark it as a mission
    pub fn add_mission_task(
        &mut self,
        model: Arc<TaskModel>,
        arguments: Arguments,
    ) -> Result<TaskId, PlanError> {
        let id = self.add_task(model, arguments)?;
        self.mark_mission(id)?;
        Ok(id)
    }

    /// Add a task and mark it as permanent
    pub fn add_permanent_task(
        &mut self,
        model: Arc<TaskModel>,
        arguments: Arguments,
    ) -> Result<TaskId, PlanError> {
        let id = self.add_task(model, arguments)?;
        self.mark_permanent_task(id)?;
        Ok(id)
    }

    /// Add a free event generator
    pub fn add_free_event(&mut self, controlable: bool) -> EventId {
        let id = EventId(self.reserve_handle());
        self.install_free_event(id, controlable);
        id
    }

    pub(crate) fn install_free_event(&mut self, id: EventId, controlable: bool) {
        self.events.insert(id, EventGenerator::free(id, controlable));
        self.journal.push(PlanChange::EventAdded {
            event: id,
            controlable,
        });
    }

    /// Add a free event generator and mark it permanent
    pub fn add_permanent_event(&mut self, controlable: bool) -> EventId {
        let id = self.add_free_event(controlable);
        // The generator was just created, marking cannot fail
        let _ = self.mark_permanent_event(id);
        id
    }

    // ---- roots ---------------------------------------------------------

    pub fn is_mission(&self, id: TaskId) -> bool {
        self.missions.contains(&id)
    }

    pub fn is_permanent_task(&self, id: TaskId) -> bool {
        self.permanent_tasks.contains(&id)
    }

    pub fn is_permanent_event(&self, id: EventId) -> bool {
        self.permanent_events.contains(&id)
    }

    pub fn missions(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.missions.iter().copied()
    }

    pub fn permanent_tasks(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.permanent_tasks.iter().copied()
    }

    pub fn permanent_events(&self) -> impl Iterator<Item = EventId> + '_ {
        self.permanent_events.iter().copied()
    }

    pub fn mark_mission(&mut self, id: TaskId) -> Result<(), PlanError> {
        self.task(id)?;
        if self.missions.insert(id) {
            self.journal.push(PlanChange::MissionMarked { task: id });
        }
        Ok(())
    }

    pub fn unmark_mission(&mut self, id: TaskId) -> Result<(), PlanError> {
        self.task(id)?;
        if self.missions.remove(&id) {
            self.journal.push(PlanChange::MissionUnmarked { task: id });
        }
        Ok(())
    }

    pub fn mark_permanent_task(&mut self, id: TaskId) -> Result<(), PlanError> {
        self.task(id)?;
        if self.permanent_tasks.insert(id) {
            self.journal.push(PlanChange::PermanentTaskMarked { task: id });
        }
        Ok(())
    }

    pub fn unmark_permanent_task(&mut self, id: TaskId) -> Result<(), PlanError> {
        self.task(id)?;
        if self.permanent_tasks.remove(&id) {
            self.journal
                .push(PlanChange::PermanentTaskUnmarked { task: id });
        }
        Ok(())
    }

    pub fn mark_permanent_event(&mut self, id: EventId) -> Result<(), PlanError> {
        self.event(id)?;
        if self.permanent_events.insert(id) {
            self.journal.push(PlanChange::PermanentEventMarked { event: id });
        }
        Ok(())
    }

    pub fn unmark_permanent_event(&mut self, id: EventId) -> Result<(), PlanError> {
        self.event(id)?;
        if self.permanent_events.remove(&id) {
            self.journal
                .push(PlanChange::PermanentEventUnmarked { event: id });
        }
        Ok(())
    }

    // ---- arguments -----------------------------------------------------

    pub fn set_argument(
        &mut self,
        id: TaskId,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), PlanError> {
        let task = self.task(id)?;
        if task.model.argument(key).is_none() {
            return Err(PlanError::UnknownArgument {
                model: task.model.name().to_string(),
                name: key.to_string(),
            });
        }
        let task = self.task_mut(id)?;
        if !task.arguments.set(key, value.clone()) {
            return Err(PlanError::FrozenArgument {
                task: id,
                name: key.to_string(),
            });
        }
        self.journal.push(PlanChange::ArgumentUpdated {
            task: id,
            key: key.to_string(),
            value: ArgValue::Set { value },
        });
        Ok(())
    }

    pub fn freeze_argument(&mut self, id: TaskId, key: &str) -> Result<(), PlanError> {
        let task = self.task_mut(id)?;
        if !task.arguments.is_frozen(key) {
            task.arguments.freeze(key);
            self.journal.push(PlanChange::ArgumentFrozen {
                task: id,
                key: key.to_string(),
            });
        }
        Ok(())
    }

    // ---- relations -----------------------------------------------------

    fn task_graph(&self, rel: TaskRelation) -> &RelationGraph<TaskId> {
        match rel {
            TaskRelation::Dependency => &self.dependency,
            TaskRelation::PlannedBy => &self.planned_by,
        }
    }

    fn task_graph_mut(&mut self, rel: TaskRelation) -> &mut RelationGraph<TaskId> {
        match rel {
            TaskRelation::Dependency => &mut self.dependency,
            TaskRelation::PlannedBy => &mut self.planned_by,
        }
    }

    fn event_graph(&self, rel: EventRelation) -> &RelationGraph<EventId> {
        match rel {
            EventRelation::Signal => &self.signal,
            EventRelation::Forward => &self.forward,
        }
    }

    fn event_graph_mut(&mut self, rel: EventRelation) -> &mut RelationGraph<EventId> {
        match rel {
            EventRelation::Signal => &mut self.signal,
            EventRelation::Forward => &mut self.forward,
        }
    }

    pub fn add_task_edge(
        &mut self,
        rel: TaskRelation,
        parent: TaskId,
        child: TaskId,
        info: EdgeInfo,
    ) -> Result<(), PlanError> {
        self.task(parent)?;
        self.task(child)?;
        let change = self.task_graph_mut(rel).add_edge(parent, child, info.clone())?;
        self.journal.push(match change {
            EdgeChange::Added => PlanChange::TaskEdgeAdded {
                rel,
                parent,
                child,
                info,
            },
            EdgeChange::Updated => PlanChange::TaskEdgeUpdated {
                rel,
                parent,
                child,
                info,
            },
        });
        Ok(())
    }

    pub fn remove_task_edge(
        &mut self,
        rel: TaskRelation,
        parent: TaskId,
        child: TaskId,
    ) -> Result<(), PlanError> {
        if self.task_graph_mut(rel).remove_edge(parent, child) {
            self.journal
                .push(PlanChange::TaskEdgeRemoved { rel, parent, child });
        }
        Ok(())
    }

    pub fn task_edge_info(
        &self,
        rel: TaskRelation,
        parent: TaskId,
        child: TaskId,
    ) -> Option<&EdgeInfo> {
        self.task_graph(rel).edge_info(parent, child)
    }

    pub fn task_children(
        &self,
        rel: TaskRelation,
        parent: TaskId,
    ) -> impl Iterator<Item = (TaskId, &EdgeInfo)> {
        self.task_graph(rel).each_child(parent)
    }

    pub fn task_parents(&self, rel: TaskRelation, child: TaskId) -> impl Iterator<Item = TaskId> + '_ {
        self.task_graph(rel).each_parent(child)
    }

    pub fn add_event_edge(
        &mut self,
        rel: EventRelation,
        parent: EventId,
        child: EventId,
        info: EdgeInfo,
    ) -> Result<(), PlanError> {
        self.event(parent)?;
        self.event(child)?;
        let change = self.event_graph_mut(rel).add_edge(parent, child, info.clone())?;
        self.journal.push(match change {
            EdgeChange::Added => PlanChange::EventEdgeAdded {
                rel,
                parent,
                child,
                info,
            },
            EdgeChange::Updated => PlanChange::EventEdgeUpdated {
                rel,
                parent,
                child,
                info,
            },
        });
        Ok(())
    }

    pub fn remove_event_edge(
        &mut self,
        rel: EventRelation,
        parent: EventId,
        child: EventId,
    ) -> Result<(), PlanError> {
        if self.event_graph_mut(rel).remove_edge(parent, child) {
            self.journal
                .push(PlanChange::EventEdgeRemoved { rel, parent, child });
        }
        Ok(())
    }

    pub fn event_edge_info(
        &self,
        rel: EventRelation,
        parent: EventId,
        child: EventId,
    ) -> Option<&EdgeInfo> {
        self.event_graph(rel).edge_info(parent, child)
    }

    pub fn event_children(
        &self,
        rel: EventRelation,
        parent: EventId,
    ) -> impl Iterator<Item = (EventId, &EdgeInfo)> {
        self.event_graph(rel).each_child(parent)
    }

    pub fn event_parents(
        &self,
        rel: EventRelation,
        child: EventId,
    ) -> impl Iterator<Item = EventId> + '_ {
        self.event_graph(rel).each_parent(child)
    }

    // ---- execution bookkeeping ----------------------------------------

    /// Record one emission: append to the generator history, update the
    /// owning task's execution state, and journal. On the stop event,
    /// the task's never-emitted generators become unreachable.
    pub fn record_emission(
        &mut self,
        id: EventId,
        context: Vec<serde_json::Value>,
        propagation_id: u64,
        time: DateTime<Utc>,
    ) -> Result<(), PlanError> {
        self.apply_emission(id, context.clone(), propagation_id, time)?;
        self.journal.push(PlanChange::EventEmitted {
            event: id,
            context,
            propagation_id,
            time,
        });

        let finished_task = match self.events.get(&id) {
            Some(generator) if generator.symbol() == Some("stop") => generator.owner_task(),
            _ => None,
        };
        if let Some(task_id) = finished_task {
            let stale: Vec<EventId> = self
                .task(task_id)?
                .bound_events
                .values()
                .copied()
                .filter(|&eid| {
                    self.events
                        .get(&eid)
                        .is_some_and(|g| !g.emitted() && !g.unreachable)
                })
                .collect();
            for eid in stale {
                self.mark_unreachable(eid, Some("task finished".to_string()))?;
            }
        }
        Ok(())
    }

    /// History and state effects of an emission, shared with replay
    fn apply_emission(
        &mut self,
        id: EventId,
        context: Vec<serde_json::Value>,
        propagation_id: u64,
        time: DateTime<Utc>,
    ) -> Result<(), PlanError> {
        let generator = self.event_mut(id)?;
        generator.history.push(crate::event::EventOccurrence {
            generator: id,
            context,
            propagation_id,
            time,
        });
        let owner = generator.owner.clone();

        if let Some((task_id, symbol)) = owner {
            let task = self.task_mut(task_id)?;
            match symbol.as_str() {
                "start" => task.note_started(time),
                "success" => task.note_outcome(true),
                "failed" => task.note_outcome(false),
                "stop" => task.note_finished(time),
                _ => {}
            }
        }
        Ok(())
    }

    /// Record that a task's start command failed before the task ran
    pub fn record_failed_to_start(
        &mut self,
        id: TaskId,
        reason: impl Into<String>,
        time: DateTime<Utc>,
    ) -> Result<(), PlanError> {
        let task = self.task_mut(id)?;
        task.note_failed_to_start(time);
        self.journal.push(PlanChange::FailedToStart {
            task: id,
            reason: reason.into(),
            time,
        });
        Ok(())
    }

    /// Mark a generator as unreachable: it will never emit again
    pub fn mark_unreachable(
        &mut self,
        id: EventId,
        reason: Option<String>,
    ) -> Result<(), PlanError> {
        let generator = self.event_mut(id)?;
        if !generator.unreachable {
            generator.mark_unreachable(reason.clone());
            self.journal
                .push(PlanChange::EventUnreachable { event: id, reason });
        }
        Ok(())
    }

    /// Quarantine a task: keep it in the plan but sever its dependency
    /// children so they no longer depend on it for usefulness.
    pub fn quarantine(&mut self, id: TaskId, reason: impl Into<String>) -> Result<(), PlanError> {
        let task = self.task_mut(id)?;
        if task.quarantined {
            return Ok(());
        }
        task.quarantined = true;

        let children: Vec<TaskId> = self
            .dependency
            .each_child(id)
            .map(|(child, _)| child)
            .collect();
        for child in children {
            self.remove_task_edge(TaskRelation::Dependency, id, child)?;
        }
        self.journal.push(PlanChange::Quarantined {
            task: id,
            reason: reason.into(),
        });
        Ok(())
    }

    // ---- removal and garbage collection -------------------------------

    /// Tasks reachable from the GC roots. Quarantined tasks count as
    /// roots: they must stay visible until removed explicitly.
    pub fn useful_tasks(&self) -> BTreeSet<TaskId> {
        let mut seeds: BTreeSet<TaskId> = BTreeSet::new();
        for &id in self.missions.iter().chain(self.permanent_tasks.iter()) {
            if !self.garbaged_tasks.contains(&id) {
                seeds.insert(id);
            }
        }
        for task in self.tasks.values() {
            if task.quarantined && !self.garbaged_tasks.contains(&task.id) {
                seeds.insert(task.id);
            }
        }

        let mut useful = seeds.clone();
        let mut queue: Vec<TaskId> = seeds.into_iter().collect();
        while let Some(id) = queue.pop() {
            for (child, _) in self.dependency.each_child(id) {
                if !self.garbaged_tasks.contains(&child) && useful.insert(child) {
                    queue.push(child);
                }
            }
            for (child, _) in self.planned_by.each_child(id) {
                if !self.garbaged_tasks.contains(&child) && useful.insert(child) {
                    queue.push(child);
                }
            }
        }
        useful
    }

    /// Tasks no longer reachable from any root
    pub fn unneeded_tasks(&self) -> BTreeSet<TaskId> {
        let useful = self.useful_tasks();
        self.tasks
            .keys()
            .copied()
            .filter(|id| !useful.contains(id) && !self.garbaged_tasks.contains(id))
            .collect()
    }

    /// Events that must be kept: permanent events, events of useful
    /// tasks, and anything connected to those through signal or forward
    /// edges in either direction.
    pub fn useful_events(&self) -> BTreeSet<EventId> {
        let useful_tasks = self.useful_tasks();

        let mut useful: BTreeSet<EventId> = BTreeSet::new();
        let mut queue: Vec<EventId> = Vec::new();
        for &id in &self.permanent_events {
            if !self.garbaged_events.contains(&id) && useful.insert(id) {
                queue.push(id);
            }
        }
        for task_id in &useful_tasks {
            if let Some(task) = self.tasks.get(task_id) {
                for &eid in task.bound_events.values() {
                    if useful.insert(eid) {
                        queue.push(eid);
                    }
                }
            }
        }

        while let Some(id) = queue.pop() {
            let mut neighbours: Vec<EventId> = Vec::new();
            for graph in [&self.signal, &self.forward] {
                neighbours.extend(graph.each_child(id).map(|(c, _)| c));
                neighbours.extend(graph.each_parent(id));
            }
            for n in neighbours {
                if !self.garbaged_events.contains(&n) && useful.insert(n) {
                    queue.push(n);
                }
            }
        }
        useful
    }

    /// Free events no longer connected to anything required
    pub fn unneeded_events(&self) -> BTreeSet<EventId> {
        let useful = self.useful_events();
        self.events
            .values()
            .filter(|e| e.is_free())
            .map(|e| e.id)
            .filter(|id| !useful.contains(id) && !self.garbaged_events.contains(id))
            .collect()
    }

    /// Remove a task immediately, refusing if it is still reachable
    /// from another root.
    pub fn remove_task(&mut self, id: TaskId) -> Result<(), PlanError> {
        self.task(id)?;
        if let Some(root) = self.reaching_root(id) {
            return Err(PlanError::StillReachable { task: id, root });
        }
        self.force_remove_task(id)
    }

    /// Remove a task immediately, regardless of reachability
    pub fn force_remove_task(&mut self, id: TaskId) -> Result<(), PlanError> {
        self.task(id)?;
        self.unmark_mission(id)?;
        self.unmark_permanent_task(id)?;
        self.finalize_task_inner(id)?;
        self.journal.push(PlanChange::FinalizedTask { task: id });
        Ok(())
    }

    /// Remove a free event immediately, refusing if it is still
    /// connected to required objects.
    pub fn remove_free_event(&mut self, id: EventId) -> Result<(), PlanError> {
        let generator = self.event(id)?;
        if !generator.is_free() {
            return Err(PlanError::BoundEvent(id));
        }
        if self.useful_events().contains(&id) {
            return Err(PlanError::StillReachableEvent { event: id });
        }
        self.force_remove_free_event(id)
    }

    /// Remove a free event immediately, regardless of connectivity
    pub fn force_remove_free_event(&mut self, id: EventId) -> Result<(), PlanError> {
        let generator = self.event(id)?;
        if !generator.is_free() {
            return Err(PlanError::BoundEvent(id));
        }
        self.unmark_permanent_event(id)?;
        self.finalize_event_inner(id)?;
        self.journal.push(PlanChange::FinalizedEvent { event: id });
        Ok(())
    }

    /// A root (mission, permanent or quarantined task) other than `id`
    /// that reaches `id` through task relations.
    fn reaching_root(&self, id: TaskId) -> Option<TaskId> {
        let mut seen = BTreeSet::new();
        let mut queue = vec![id];
        while let Some(current) = queue.pop() {
            for parent in self
                .dependency
                .each_parent(current)
                .chain(self.planned_by.each_parent(current))
            {
                if parent != id && seen.insert(parent) {
                    let quarantined = self
                        .tasks
                        .get(&parent)
                        .is_some_and(|t| t.quarantined);
                    if self.missions.contains(&parent)
                        || self.permanent_tasks.contains(&parent)
                        || quarantined
                    {
                        return Some(parent);
                    }
                    queue.push(parent);
                }
            }
        }
        None
    }

    /// First phase of collection: mark, keep visible
    pub fn mark_garbaged_task(&mut self, id: TaskId) -> Result<(), PlanError> {
        self.task(id)?;
        if self.garbaged_tasks.insert(id) {
            self.journal.push(PlanChange::GarbagedTask { task: id });
        }
        Ok(())
    }

    pub fn mark_garbaged_event(&mut self, id: EventId) -> Result<(), PlanError> {
        self.event(id)?;
        if self.garbaged_events.insert(id) {
            self.journal.push(PlanChange::GarbagedEvent { event: id });
        }
        Ok(())
    }

    pub fn garbaged_tasks(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.garbaged_tasks.iter().copied()
    }

    pub fn garbaged_events(&self) -> impl Iterator<Item = EventId> + '_ {
        self.garbaged_events.iter().copied()
    }

    pub fn is_garbaged_task(&self, id: TaskId) -> bool {
        self.garbaged_tasks.contains(&id)
    }

    pub fn is_garbaged_event(&self, id: EventId) -> bool {
        self.garbaged_events.contains(&id)
    }

    /// Second phase of collection: finalize everything marked garbaged
    pub fn clear_integrated(&mut self) -> Result<(), PlanError> {
        let tasks: Vec<TaskId> = self.garbaged_tasks.iter().copied().collect();
        for id in tasks {
            self.finalize_task_inner(id)?;
            self.journal.push(PlanChange::FinalizedTask { task: id });
        }
        let events: Vec<EventId> = self.garbaged_events.iter().copied().collect();
        for id in events {
            self.finalize_event_inner(id)?;
            self.journal.push(PlanChange::FinalizedEvent { event: id });
        }
        Ok(())
    }

    /// Detach and drop a task and its bound generators. No journalling.
    fn finalize_task_inner(&mut self, id: TaskId) -> Result<(), PlanError> {
        let task = self.tasks.remove(&id).ok_or(PlanError::UnknownTask(id))?;

        self.dependency.remove_vertex(id);
        self.planned_by.remove_vertex(id);
        self.missions.remove(&id);
        self.permanent_tasks.remove(&id);
        self.garbaged_tasks.remove(&id);
        self.finalized_tasks.insert(id);

        for &eid in task.bound_events.values() {
            self.signal.remove_vertex(eid);
            self.forward.remove_vertex(eid);
            self.events.remove(&eid);
            self.permanent_events.remove(&eid);
            self.garbaged_events.remove(&eid);
            self.finalized_events.insert(eid);
        }
        Ok(())
    }

    fn finalize_event_inner(&mut self, id: EventId) -> Result<(), PlanError> {
        self.events.remove(&id).ok_or(PlanError::UnknownEvent(id))?;
        self.signal.remove_vertex(id);
        self.forward.remove_vertex(id);
        self.permanent_events.remove(&id);
        self.garbaged_events.remove(&id);
        self.finalized_events.insert(id);
        Ok(())
    }

    // ---- journal --------------------------------------------------------

    /// Take the journal accumulated since the last drain
    pub fn drain_changes(&mut self) -> Vec<PlanChange> {
        std::mem::take(&mut self.journal)
    }

    /// Number of journalled changes not yet drained
    pub fn pending_changes(&self) -> usize {
        self.journal.len()
    }

    /// Apply a journalled record without journalling it again. This is
    /// the replay path used by plan rebuilders.
    pub fn apply(&mut self, change: &PlanChange) -> Result<(), PlanError> {
        match change {
            PlanChange::TaskAdded {
                task,
                model,
                arguments,
                bound_events,
            } => {
                let model = self.model(model)?.clone();
                self.bump_handle(task.0);
                let mut record = Task::new(*task, model.clone(), Arguments::new());
                for (key, value) in arguments {
                    record.arguments.apply(key.clone(), value.clone());
                }
                for (symbol, &eid) in bound_events {
                    self.bump_handle(eid.0);
                    let controlable = model.event(symbol).is_some_and(|def| def.controlable);
                    self.events
                        .insert(eid, EventGenerator::bound(eid, *task, symbol, controlable));
                    record.bound_events.insert(symbol.clone(), eid);
                }
                self.tasks.insert(*task, record);
                Ok(())
            }
            PlanChange::EventAdded { event, controlable } => {
                self.bump_handle(event.0);
                self.events
                    .insert(*event, EventGenerator::free(*event, *controlable));
                Ok(())
            }
            PlanChange::MissionMarked { task } => {
                self.task(*task)?;
                self.missions.insert(*task);
                Ok(())
            }
            PlanChange::MissionUnmarked { task } => {
                self.missions.remove(task);
                Ok(())
            }
            PlanChange::PermanentTaskMarked { task } => {
                self.task(*task)?;
                self.permanent_tasks.insert(*task);
                Ok(())
            }
            PlanChange::PermanentTaskUnmarked { task } => {
                self.permanent_tasks.remove(task);
                Ok(())
            }
            PlanChange::PermanentEventMarked { event } => {
                self.event(*event)?;
                self.permanent_events.insert(*event);
                Ok(())
            }
            PlanChange::PermanentEventUnmarked { event } => {
                self.permanent_events.remove(event);
                Ok(())
            }
            PlanChange::ArgumentUpdated { task, key, value } => {
                let task = self.task_mut(*task)?;
                task.arguments.apply(key.clone(), value.clone());
                Ok(())
            }
            PlanChange::ArgumentFrozen { task, key } => {
                let task = self.task_mut(*task)?;
                task.arguments.freeze(key.clone());
                Ok(())
            }
            PlanChange::TaskEdgeAdded {
                rel,
                parent,
                child,
                info,
            }
            | PlanChange::TaskEdgeUpdated {
                rel,
                parent,
                child,
                info,
            } => {
                self.task(*parent)?;
                self.task(*child)?;
                self.task_graph_mut(*rel).add_edge(*parent, *child, info.clone())?;
                Ok(())
            }
            PlanChange::TaskEdgeRemoved { rel, parent, child } => {
                self.task_graph_mut(*rel).remove_edge(*parent, *child);
                Ok(())
            }
            PlanChange::EventEdgeAdded {
                rel,
                parent,
                child,
                info,
            }
            | PlanChange::EventEdgeUpdated {
                rel,
                parent,
                child,
                info,
            } => {
                self.event(*parent)?;
                self.event(*child)?;
                self.event_graph_mut(*rel)
                    .add_edge(*parent, *child, info.clone())?;
                Ok(())
            }
            PlanChange::EventEdgeRemoved { rel, parent, child } => {
                self.event_graph_mut(*rel).remove_edge(*parent, *child);
                Ok(())
            }
            PlanChange::EventEmitted {
                event,
                context,
                propagation_id,
                time,
            } => self.apply_emission(*event, context.clone(), *propagation_id, *time),
            PlanChange::EventUnreachable { event, reason } => {
                let generator = self.event_mut(*event)?;
                if !generator.unreachable {
                    generator.mark_unreachable(reason.clone());
                }
                Ok(())
            }
            PlanChange::FailedToStart { task, time, .. } => {
                let task = self.task_mut(*task)?;
                task.note_failed_to_start(*time);
                Ok(())
            }
            PlanChange::Quarantined { task, .. } => {
                let task = self.task_mut(*task)?;
                task.quarantined = true;
                Ok(())
            }
            PlanChange::GarbagedTask { task } => {
                self.task(*task)?;
                self.garbaged_tasks.insert(*task);
                Ok(())
            }
            PlanChange::GarbagedEvent { event } => {
                self.event(*event)?;
                self.garbaged_events.insert(*event);
                Ok(())
            }
            PlanChange::FinalizedTask { task } => self.finalize_task_inner(*task),
            PlanChange::FinalizedEvent { event } => {
                // Bound events are finalized together with their task
                if self.finalized_events.contains(event) {
                    return Ok(());
                }
                self.finalize_event_inner(*event)
            }
        }
    }
}

impl Default for Plan {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
