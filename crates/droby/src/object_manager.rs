// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-peer identity maps
//!
//! One `ObjectManager` exists per remote peer. It owns the sibling
//! maps: object handle to [`DrobyId`] and back, for tasks, events and
//! plans, plus the model table. Models live in two layers: the local
//! constant table (models this process knows by name, link-independent)
//! and the link-scoped id bindings assigned on first reference.

use crate::ids::{DrobyId, PeerId};
use std::collections::HashMap;
use std::sync::Arc;
use weft_core::{EventId, PlanId, TaskId, TaskModel};

pub struct ObjectManager {
    local_peer: PeerId,
    next_local: u64,
    task_ids: HashMap<TaskId, DrobyId>,
    tasks_by_id: HashMap<DrobyId, TaskId>,
    event_ids: HashMap<EventId, DrobyId>,
    events_by_id: HashMap<DrobyId, EventId>,
    plan_ids: HashMap<PlanId, DrobyId>,
    plans_by_id: HashMap<DrobyId, PlanId>,
    model_ids: HashMap<String, DrobyId>,
    models_by_id: HashMap<DrobyId, String>,
    /// Models known to this process by name
    models: HashMap<String, Arc<TaskModel>>,
}

impl ObjectManager {
    pub fn new(local_peer: PeerId) -> Self {
        Self {
            local_peer,
            next_local: 1,
            task_ids: HashMap::new(),
            tasks_by_id: HashMap::new(),
            event_ids: HashMap::new(),
            events_by_id: HashMap::new(),
            plan_ids: HashMap::new(),
            plans_by_id: HashMap::new(),
            model_ids: HashMap::new(),
            models_by_id: HashMap::new(),
            models: HashMap::new(),
        }
    }

    pub fn local_peer(&self) -> PeerId {
        self.local_peer
    }

    /// Mint a fresh id owned by the local peer
    pub fn fresh_id(&mut self) -> DrobyId {
        let id = DrobyId {
            peer: self.local_peer,
            local: self.next_local,
        };
        self.next_local += 1;
        id
    }

    // ---- tasks ---------------------------------------------------------

    /// The id this task is shared under, minting one on first call
    pub fn register_task(&mut self, task: TaskId) -> DrobyId {
        if let Some(id) = self.task_ids.get(&task) {
            return *id;
        }
        let id = self.fresh_id();
        self.task_ids.insert(task, id);
        self.tasks_by_id.insert(id, task);
        id
    }

    /// Record a pairing minted by the remote side
    pub fn register_task_sibling(&mut self, id: DrobyId, task: TaskId) {
        if let Some(existing) = self.tasks_by_id.get(&id) {
            if *existing != task {
                tracing::warn!(id = %id, old = %existing, new = %task, "task sibling rebound");
            }
        }
        self.task_ids.insert(task, id);
        self.tasks_by_id.insert(id, task);
    }

    pub fn task_sibling(&self, task: TaskId) -> Option<DrobyId> {
        self.task_ids.get(&task).copied()
    }

    pub fn local_task(&self, id: DrobyId) -> Option<TaskId> {
        self.tasks_by_id.get(&id).copied()
    }

    /// Drop a finalized task's pairing from both directions
    pub fn forget_task(&mut self, task: TaskId) {
        if let Some(id) = self.task_ids.remove(&task) {
            self.tasks_by_id.remove(&id);
        }
    }

    // ---- events --------------------------------------------------------

    pub fn register_event(&mut self, event: EventId) -> DrobyId {
        if let Some(id) = self.event_ids.get(&event) {
            return *id;
        }
        let id = self.fresh_id();
        self.event_ids.insert(event, id);
        self.events_by_id.insert(id, event);
        id
    }

    pub fn register_event_sibling(&mut self, id: DrobyId, event: EventId) {
        if let Some(existing) = self.events_by_id.get(&id) {
            if *existing != event {
                tracing::warn!(id = %id, old = %existing, new = %event, "event sibling rebound");
            }
        }
        self.event_ids.insert(event, id);
        self.events_by_id.insert(id, event);
    }

    pub fn event_sibling(&self, event: EventId) -> Option<DrobyId> {
        self.event_ids.get(&event).copied()
    }

    pub fn local_event(&self, id: DrobyId) -> Option<EventId> {
        self.events_by_id.get(&id).copied()
    }

    pub fn forget_event(&mut self, event: EventId) {
        if let Some(id) = self.event_ids.remove(&event) {
            self.events_by_id.remove(&id);
        }
    }

    // ---- plans ---------------------------------------------------------

    pub fn register_plan(&mut self, plan: PlanId) -> DrobyId {
        if let Some(id) = self.plan_ids.get(&plan) {
            return *id;
        }
        let id = self.fresh_id();
        self.plan_ids.insert(plan, id);
        self.plans_by_id.insert(id, plan);
        id
    }

    pub fn register_plan_sibling(&mut self, id: DrobyId, plan: PlanId) {
        self.plan_ids.insert(plan, id);
        self.plans_by_id.insert(id, plan);
    }

    pub fn plan_sibling(&self, plan: PlanId) -> Option<DrobyId> {
        self.plan_ids.get(&plan).copied()
    }

    pub fn local_plan(&self, id: DrobyId) -> Option<PlanId> {
        self.plans_by_id.get(&id).copied()
    }

    // ---- models --------------------------------------------------------

    /// Declare a model known to this process, with no link id yet
    pub fn register_local_model(&mut self, model: &Arc<TaskModel>) {
        self.models
            .entry(model.name().to_string())
            .or_insert_with(|| model.clone());
    }

    /// The id this model is shared under, minting one on first call
    pub fn register_model(&mut self, model: &Arc<TaskModel>) -> DrobyId {
        self.register_local_model(model);
        if let Some(id) = self.model_ids.get(model.name()) {
            return *id;
        }
        let id = self.fresh_id();
        self.model_ids.insert(model.name().to_string(), id);
        self.models_by_id.insert(id, model.name().to_string());
        id
    }

    /// Bind a remote-minted id to a model known locally
    pub fn register_model_sibling(&mut self, id: DrobyId, model: &Arc<TaskModel>) {
        self.register_local_model(model);
        self.model_ids.insert(model.name().to_string(), id);
        self.models_by_id.insert(id, model.name().to_string());
    }

    pub fn model_sibling(&self, name: &str) -> Option<DrobyId> {
        self.model_ids.get(name).copied()
    }

    /// Resolve a model by name from the local constant table
    pub fn find_local_model(&self, name: &str) -> Option<Arc<TaskModel>> {
        self.models.get(name).cloned()
    }

    pub fn local_model(&self, id: DrobyId) -> Option<Arc<TaskModel>> {
        let name = self.models_by_id.get(&id)?;
        self.models.get(name).cloned()
    }
}

#[cfg(test)]
#[path = "object_manager_tests.rs"]
mod tests;
