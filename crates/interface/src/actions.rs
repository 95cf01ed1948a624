// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Action registry
//!
//! Actions are the things clients can ask the interface to run. Each
//! one pairs a wire-visible description with a factory that drops the
//! corresponding task into the plan. The common case instantiates one
//! model with the call's arguments; anything richer registers its own
//! factory.

use crate::errors::InterfaceError;
use crate::packet::ActionDescription;
use std::collections::BTreeMap;
use std::sync::Arc;
use weft_core::{Arguments, Plan, TaskId, TaskModel};

/// Builds one task for an action invocation
pub type ActionFactory =
    Box<dyn Fn(&mut Plan, &Arguments) -> Result<TaskId, InterfaceError> + Send>;

struct Action {
    description: ActionDescription,
    factory: ActionFactory,
}

#[derive(Default)]
pub struct ActionRegistry {
    actions: BTreeMap<String, Action>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action that instantiates `model` with the call's
    /// arguments
    pub fn register_model(&mut self, model: &Arc<TaskModel>, doc: &str) {
        let description = ActionDescription {
            name: model.name().to_string(),
            doc: (!doc.is_empty()).then(|| doc.to_string()),
            arguments: model.each_argument().into_iter().cloned().collect(),
        };
        let model = model.clone();
        self.register(
            description,
            Box::new(move |plan, arguments| Ok(plan.add_task(model.clone(), arguments.clone())?)),
        );
    }

    pub fn register(&mut self, description: ActionDescription, factory: ActionFactory) {
        let name = description.name.clone();
        self.actions.insert(
            name,
            Action {
                description,
                factory,
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Descriptions of every action, for the handshake
    pub fn descriptions(&self) -> Vec<ActionDescription> {
        self.actions
            .values()
            .map(|action| action.description.clone())
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.actions.keys().map(String::as_str).collect()
    }

    /// Run the named action's factory against the plan
    pub fn instantiate(
        &self,
        name: &str,
        plan: &mut Plan,
        arguments: &Arguments,
    ) -> Result<TaskId, InterfaceError> {
        let action = self
            .actions
            .get(name)
            .ok_or_else(|| InterfaceError::UnknownAction(name.to_string()))?;
        (action.factory)(plan, arguments)
    }
}
