// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The marshaller: plan objects to wire trees and back
//!
//! One marshaller per peer. Dumping consults the [`ObjectManager`]
//! first: a registered object dumps as its id reference; an
//! unregistered one is registered before its structure is walked, so
//! cyclic references terminate, and the minted id is embedded in the
//! structural dump. Loading is the inverse: id references resolve
//! through the sibling maps, structural dumps reconstruct the object in
//! the given plan under the dumping side's handle.

use crate::errors::DrobyError;
use crate::ids::PeerId;
use crate::object_manager::ObjectManager;
use crate::registry::TypeRegistry;
use crate::value::{
    self, DrobyValue, EventDump, ExceptionDump, ModelDump, PlanDump, TaskDump,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use weft_core::{
    ArgValue, EventId, ExecutionException, LocalizedError, Plan, PlanChange, TaskId, TaskModel,
    ROOT_MODEL_NAME,
};

/// Tag carrying delayed argument placeholders across the link
const DELAYED_TAG: &str = "delayed";

pub struct Marshaller {
    manager: ObjectManager,
    registry: TypeRegistry,
}

impl Marshaller {
    pub fn new(local_peer: PeerId, registry: TypeRegistry) -> Self {
        Self {
            manager: ObjectManager::new(local_peer),
            registry,
        }
    }

    pub fn object_manager(&self) -> &ObjectManager {
        &self.manager
    }

    pub fn object_manager_mut(&mut self) -> &mut ObjectManager {
        &mut self.manager
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    // ---- dumping -------------------------------------------------------

    /// Dump a plain JSON value, dispatching `$tag` payloads
    pub fn dump_value(&self, value: &Value) -> Result<DrobyValue, DrobyError> {
        value::from_json(value, &self.registry)
    }

    /// Load a plain JSON value back, decoding tagged payloads
    pub fn load_value(&self, value: &DrobyValue) -> Result<Value, DrobyError> {
        value::to_json(value, &self.registry)
    }

    pub fn dump_model(&mut self, model: &Arc<TaskModel>) -> DrobyValue {
        if let Some(id) = self.manager.model_sibling(model.name()) {
            return DrobyValue::RemoteId { id };
        }
        let id = self.manager.register_model(model);
        DrobyValue::Model(ModelDump {
            id,
            name: model.name().to_string(),
            chain: model.ancestry(),
            events: model.each_event().into_iter().cloned().collect(),
            arguments: model.each_argument().into_iter().cloned().collect(),
            provides: model.each_tag().into_iter().map(str::to_string).collect(),
            abstract_model: model.is_abstract(),
        })
    }

    /// Whether the model has already been shared on this link
    pub fn model_registered(&self, name: &str) -> bool {
        self.manager.model_sibling(name).is_some()
    }

    pub fn dump_task(&mut self, plan: &Plan, task_id: TaskId) -> Result<DrobyValue, DrobyError> {
        if let Some(id) = self.manager.task_sibling(task_id) {
            return Ok(DrobyValue::RemoteId { id });
        }
        let task = plan.task(task_id)?;
        // Register before walking the structure so cycles terminate
        let id = self.manager.register_task(task_id);
        let model = self.dump_model(&task.model);
        let mut arguments = BTreeMap::new();
        for (key, value) in task.arguments.iter() {
            arguments.insert(key.to_string(), self.dump_arg(value)?);
        }
        Ok(DrobyValue::Task(TaskDump {
            id,
            handle: task_id,
            model: Box::new(model),
            arguments,
            bound_events: task.bound_events.clone(),
        }))
    }

    pub fn dump_event(&mut self, plan: &Plan, event_id: EventId) -> Result<DrobyValue, DrobyError> {
        if let Some(id) = self.manager.event_sibling(event_id) {
            return Ok(DrobyValue::RemoteId { id });
        }
        let generator = plan.event(event_id)?;
        let id = self.manager.register_event(event_id);
        Ok(DrobyValue::Event(EventDump {
            id,
            handle: event_id,
            controlable: generator.controlable,
            owner: generator.owner_task(),
            symbol: generator.symbol().map(str::to_string),
        }))
    }

    pub fn dump_plan(&mut self, plan: &Plan) -> DrobyValue {
        if let Some(id) = self.manager.plan_sibling(plan.id()) {
            return DrobyValue::RemoteId { id };
        }
        let id = self.manager.register_plan(plan.id());
        DrobyValue::Plan(PlanDump { id, plan: plan.id() })
    }

    pub fn dump_exception(&self, exception: &ExecutionException) -> DrobyValue {
        DrobyValue::Exception(ExceptionDump {
            kind: exception.error.kind,
            failure_point: exception.error.failure_point,
            message: exception.error.message.clone(),
            time: exception.error.time,
            trace: exception.trace.clone(),
            handled: exception.handled,
        })
    }

    fn dump_arg(&self, value: &ArgValue) -> Result<DrobyValue, DrobyError> {
        match value {
            ArgValue::Set { value } => self.dump_value(value),
            ArgValue::Delayed { description } => {
                let mut fields = BTreeMap::new();
                fields.insert(
                    "description".to_string(),
                    DrobyValue::Str {
                        value: description.clone(),
                    },
                );
                Ok(DrobyValue::Tagged {
                    tag: DELAYED_TAG.to_string(),
                    fields,
                })
            }
        }
    }

    // ---- loading -------------------------------------------------------

    /// Resolve a model dump or reference. Resolution order: known link
    /// id, then the local constant table by name, then reconstruction
    /// from the dumped chain. A name that resolves locally but is bound
    /// to a different link id is a [`DrobyError::MismatchingLocalConstant`],
    /// never a silent rebind.
    pub fn local_model(&mut self, value: &DrobyValue) -> Result<Arc<TaskModel>, DrobyError> {
        match value {
            DrobyValue::RemoteId { id } => self
                .manager
                .local_model(*id)
                .ok_or(DrobyError::NoLocalObject(*id)),
            DrobyValue::Model(dump) => self.resolve_model(dump),
            other => Err(DrobyError::MalformedValue {
                tag: "model".to_string(),
                detail: format!("expected a model dump, got {}", other.kind()),
            }),
        }
    }

    fn resolve_model(&mut self, dump: &ModelDump) -> Result<Arc<TaskModel>, DrobyError> {
        if let Some(model) = self.manager.local_model(dump.id) {
            if model.name() != dump.name {
                return Err(DrobyError::MismatchingLocalConstant {
                    name: dump.name.clone(),
                    id: dump.id,
                });
            }
            return Ok(model);
        }
        if let Some(model) = self.manager.find_local_model(&dump.name) {
            if let Some(existing) = self.manager.model_sibling(&dump.name) {
                // The name resolves, but to an identity this link has
                // already bound differently
                tracing::warn!(
                    model = %dump.name,
                    bound = %existing,
                    received = %dump.id,
                    "model name is bound to a different identity"
                );
                return Err(DrobyError::MismatchingLocalConstant {
                    name: dump.name.clone(),
                    id: dump.id,
                });
            }
            self.manager.register_model_sibling(dump.id, &model);
            return Ok(model);
        }
        let model = Self::build_model(dump)?;
        self.manager.register_model_sibling(dump.id, &model);
        Ok(model)
    }

    /// Reconstruct a model from its dump: ancestry stubs above, the
    /// flattened definitions on the leaf.
    fn build_model(dump: &ModelDump) -> Result<Arc<TaskModel>, DrobyError> {
        if dump.chain.first().map(String::as_str) != Some(dump.name.as_str()) {
            return Err(DrobyError::ConstantResolutionFailed {
                name: dump.name.clone(),
            });
        }
        let mut supermodel: Option<Arc<TaskModel>> = None;
        for name in dump.chain.iter().rev() {
            if name == ROOT_MODEL_NAME {
                continue;
            }
            if *name == dump.name {
                break;
            }
            let mut builder = TaskModel::builder(name.clone());
            if let Some(parent) = supermodel.take() {
                builder = builder.supermodel(parent);
            }
            supermodel = Some(builder.build());
        }
        let mut builder = TaskModel::builder(dump.name.clone());
        if let Some(parent) = supermodel {
            builder = builder.supermodel(parent);
        }
        for def in &dump.events {
            builder = builder.event(def.name.clone(), def.controlable, def.terminal);
        }
        for def in &dump.arguments {
            builder = match &def.default {
                Some(value) => builder.argument_with_default(def.name.clone(), value.clone()),
                None => builder.argument(def.name.clone()),
            };
        }
        for tag in &dump.provides {
            builder = builder.provides(tag.clone());
        }
        if dump.abstract_model {
            builder = builder.abstract_model();
        }
        Ok(builder.build())
    }

    /// Resolve a task dump or reference, reconstructing the task in the
    /// given plan under the dumping side's handle on first contact.
    pub fn local_task(&mut self, plan: &mut Plan, value: &DrobyValue) -> Result<TaskId, DrobyError> {
        match value {
            DrobyValue::RemoteId { id } => self
                .manager
                .local_task(*id)
                .ok_or(DrobyError::NoLocalObject(*id)),
            DrobyValue::Task(dump) => {
                if let Some(existing) = self.manager.local_task(dump.id) {
                    return Ok(existing);
                }
                let model = self.local_model(&dump.model)?;
                plan.register_model(model.clone());
                let mut arguments = BTreeMap::new();
                for (key, value) in &dump.arguments {
                    arguments.insert(key.clone(), self.load_arg(value)?);
                }
                plan.apply(&PlanChange::TaskAdded {
                    task: dump.handle,
                    model: model.name().to_string(),
                    arguments,
                    bound_events: dump.bound_events.clone(),
                })?;
                self.manager.register_task_sibling(dump.id, dump.handle);
                Ok(dump.handle)
            }
            other => Err(DrobyError::MalformedValue {
                tag: "task".to_string(),
                detail: format!("expected a task dump, got {}", other.kind()),
            }),
        }
    }

    /// Resolve an event dump or reference. Bound generators arrive with
    /// their task; only free generators are created here.
    pub fn local_event(
        &mut self,
        plan: &mut Plan,
        value: &DrobyValue,
    ) -> Result<EventId, DrobyError> {
        match value {
            DrobyValue::RemoteId { id } => self
                .manager
                .local_event(*id)
                .ok_or(DrobyError::NoLocalObject(*id)),
            DrobyValue::Event(dump) => {
                if let Some(existing) = self.manager.local_event(dump.id) {
                    return Ok(existing);
                }
                if dump.owner.is_some() {
                    plan.event(dump.handle)?;
                } else {
                    plan.apply(&PlanChange::EventAdded {
                        event: dump.handle,
                        controlable: dump.controlable,
                    })?;
                }
                self.manager.register_event_sibling(dump.id, dump.handle);
                Ok(dump.handle)
            }
            other => Err(DrobyError::MalformedValue {
                tag: "event".to_string(),
                detail: format!("expected an event dump, got {}", other.kind()),
            }),
        }
    }

    pub fn local_exception(&self, value: &DrobyValue) -> Result<ExecutionException, DrobyError> {
        let DrobyValue::Exception(dump) = value else {
            return Err(DrobyError::MalformedValue {
                tag: "exception".to_string(),
                detail: format!("expected an exception dump, got {}", value.kind()),
            });
        };
        Ok(ExecutionException {
            error: LocalizedError::new(
                dump.kind,
                dump.failure_point,
                dump.message.clone(),
                dump.time,
            ),
            trace: dump.trace.clone(),
            handled: dump.handled,
        })
    }

    fn load_arg(&self, value: &DrobyValue) -> Result<ArgValue, DrobyError> {
        if let DrobyValue::Tagged { tag, fields } = value {
            if tag == DELAYED_TAG {
                let Some(DrobyValue::Str { value: description }) = fields.get("description") else {
                    return Err(DrobyError::MalformedValue {
                        tag: DELAYED_TAG.to_string(),
                        detail: "description must be a string".to_string(),
                    });
                };
                return Ok(ArgValue::Delayed {
                    description: description.clone(),
                });
            }
        }
        Ok(ArgValue::Set {
            value: self.load_value(value)?,
        })
    }
}

#[cfg(test)]
#[path = "marshal_tests.rs"]
mod tests;
