// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task models
//!
//! A model is a capability record: the named events a task responds to,
//! the arguments it accepts, and the tags it provides. Models form a
//! single-inheritance chain ending at the root model, and "providing" a
//! tag is plain set membership rather than a type relationship.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Name of the model every chain ends at
pub const ROOT_MODEL_NAME: &str = "Task";

/// Definition of one named event on a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDef {
    pub name: String,
    /// Controlable events have a command and can be called; contingent
    /// events can only be emitted.
    pub controlable: bool,
    /// Terminal events end the task when they are emitted
    pub terminal: bool,
}

impl EventDef {
    pub fn new(name: impl Into<String>, controlable: bool, terminal: bool) -> Self {
        Self {
            name: name.into(),
            controlable,
            terminal,
        }
    }
}

/// Definition of one named argument on a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgDef {
    pub name: String,
    pub default: Option<serde_json::Value>,
}

/// A task model: event set, argument set and provided tags
#[derive(Debug)]
pub struct TaskModel {
    name: String,
    supermodel: Option<Arc<TaskModel>>,
    events: Vec<EventDef>,
    arguments: Vec<ArgDef>,
    tags: BTreeSet<String>,
    abstract_model: bool,
}

impl TaskModel {
    /// The root model, with the implicit lifecycle events every task has
    pub fn root() -> Arc<TaskModel> {
        Arc::new(TaskModel {
            name: ROOT_MODEL_NAME.to_string(),
            supermodel: None,
            events: vec![
                EventDef::new("start", true, false),
                EventDef::new("success", false, true),
                EventDef::new("failed", false, true),
                EventDef::new("stop", false, true),
                EventDef::new("internal_error", false, false),
            ],
            arguments: Vec::new(),
            tags: BTreeSet::new(),
            abstract_model: true,
        })
    }

    /// Start building a model deriving from the root model
    pub fn builder(name: impl Into<String>) -> ModelBuilder {
        ModelBuilder {
            name: name.into(),
            supermodel: None,
            events: Vec::new(),
            arguments: Vec::new(),
            tags: BTreeSet::new(),
            abstract_model: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supermodel(&self) -> Option<&Arc<TaskModel>> {
        self.supermodel.as_ref()
    }

    /// Whether tasks of this model can be executed at all
    pub fn is_abstract(&self) -> bool {
        self.abstract_model
    }

    /// Find an event definition by name, walking up the model chain
    pub fn event(&self, name: &str) -> Option<&EventDef> {
        if let Some(def) = self.events.iter().find(|e| e.name == name) {
            return Some(def);
        }
        self.supermodel.as_ref().and_then(|m| m.event(name))
    }

    /// All event definitions, own definitions shadowing inherited ones
    pub fn each_event(&self) -> Vec<&EventDef> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        let mut current = Some(self);
        while let Some(model) = current {
            for def in &model.events {
                if seen.insert(def.name.as_str()) {
                    out.push(def);
                }
            }
            current = model.supermodel.as_deref();
        }
        out
    }

    /// Find an argument definition by name, walking up the model chain
    pub fn argument(&self, name: &str) -> Option<&ArgDef> {
        if let Some(def) = self.arguments.iter().find(|a| a.name == name) {
            return Some(def);
        }
        self.supermodel.as_ref().and_then(|m| m.argument(name))
    }

    /// All argument definitions, own definitions shadowing inherited ones
    pub fn each_argument(&self) -> Vec<&ArgDef> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        let mut current = Some(self);
        while let Some(model) = current {
            for def in &model.arguments {
                if seen.insert(def.name.as_str()) {
                    out.push(def);
                }
            }
            current = model.supermodel.as_deref();
        }
        out
    }

    /// Whether this model provides the given tag, directly or inherited
    pub fn provides(&self, tag: &str) -> bool {
        if self.tags.contains(tag) {
            return true;
        }
        self.supermodel.as_ref().is_some_and(|m| m.provides(tag))
    }

    /// All provided tags, own and inherited
    pub fn each_tag(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        let mut current = Some(self);
        while let Some(model) = current {
            for tag in &model.tags {
                if seen.insert(tag.as_str()) {
                    out.push(tag.as_str());
                }
            }
            current = model.supermodel.as_deref();
        }
        out
    }

    /// Whether this model is `other` or derives from it
    pub fn is_a(self: &Arc<Self>, other: &Arc<TaskModel>) -> bool {
        let mut current = Some(self.clone());
        while let Some(model) = current {
            if Arc::ptr_eq(&model, other) {
                return true;
            }
            current = model.supermodel.clone();
        }
        false
    }

    /// Model names from this model up to the root, self first
    pub fn ancestry(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut current = Some(self);
        while let Some(model) = current {
            names.push(model.name.clone());
            current = model.supermodel.as_deref();
        }
        names
    }
}

/// Builder for [`TaskModel`]
pub struct ModelBuilder {
    name: String,
    supermodel: Option<Arc<TaskModel>>,
    events: Vec<EventDef>,
    arguments: Vec<ArgDef>,
    tags: BTreeSet<String>,
    abstract_model: bool,
}

impl ModelBuilder {
    /// Derive from a model other than the root
    pub fn supermodel(mut self, model: Arc<TaskModel>) -> Self {
        self.supermodel = Some(model);
        self
    }

    pub fn event(mut self, name: impl Into<String>, controlable: bool, terminal: bool) -> Self {
        self.events.push(EventDef::new(name, controlable, terminal));
        self
    }

    pub fn argument(mut self, name: impl Into<String>) -> Self {
        self.arguments.push(ArgDef {
            name: name.into(),
            default: None,
        });
        self
    }

    pub fn argument_with_default(
        mut self,
        name: impl Into<String>,
        default: serde_json::Value,
    ) -> Self {
        self.arguments.push(ArgDef {
            name: name.into(),
            default: Some(default),
        });
        self
    }

    pub fn provides(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Mark tasks of this model as non-executable placeholders
    pub fn abstract_model(mut self) -> Self {
        self.abstract_model = true;
        self
    }

    pub fn build(self) -> Arc<TaskModel> {
        let supermodel = self.supermodel.unwrap_or_else(TaskModel::root);
        Arc::new(TaskModel {
            name: self.name,
            supermodel: Some(supermodel),
            events: self.events,
            arguments: self.arguments,
            tags: self.tags,
            abstract_model: self.abstract_model,
        })
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
