// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Relation graphs
//!
//! Each relation kind is a separate directed graph over object handles.
//! Adjacency is indexed in both directions so parent and child walks
//! are O(degree), and neighbours are iterated in edge-insertion order
//! so propagation and GC see a deterministic ordering.
//!
//! Edges carry an info payload. Re-declaring an existing edge merges
//! the new info into the old: arrays union, nested objects merge
//! recursively, equal scalars are kept, and unequal scalars are a
//! conflict reported to the caller.

use crate::errors::PlanError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::Hash;

/// Relations between tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskRelation {
    /// Parent needs child to reach its goal
    Dependency,
    /// Child is the task producing a plan for parent
    PlannedBy,
}

/// Relations between event generators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventRelation {
    /// Source emission calls the target's command
    Signal,
    /// Source emission re-emits the target
    Forward,
}

/// Edge info payload
pub type EdgeInfo = BTreeMap<String, serde_json::Value>;

/// Outcome of an edge declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeChange {
    Added,
    /// The edge existed; its info was merged
    Updated,
}

/// Merge `update` into `existing` under the edge-info rules
pub fn merge_edge_info(existing: &mut EdgeInfo, update: &EdgeInfo) -> Result<(), PlanError> {
    for (key, new_value) in update {
        match existing.get_mut(key) {
            None => {
                existing.insert(key.clone(), new_value.clone());
            }
            Some(old_value) => merge_values(key, old_value, new_value)?,
        }
    }
    Ok(())
}

fn merge_values(
    key: &str,
    old: &mut serde_json::Value,
    new: &serde_json::Value,
) -> Result<(), PlanError> {
    use serde_json::Value;
    match (old, new) {
        (Value::Array(old_items), Value::Array(new_items)) => {
            for item in new_items {
                if !old_items.contains(item) {
                    old_items.push(item.clone());
                }
            }
            Ok(())
        }
        (Value::Object(old_map), Value::Object(new_map)) => {
            for (k, v) in new_map {
                match old_map.get_mut(k) {
                    None => {
                        old_map.insert(k.clone(), v.clone());
                    }
                    Some(existing) => merge_values(k, existing, v)?,
                }
            }
            Ok(())
        }
        (old, new) if *old == *new => Ok(()),
        _ => Err(PlanError::ConflictingEdgeInfo {
            key: key.to_string(),
        }),
    }
}

/// A directed graph over handles with per-edge info
#[derive(Debug, Clone, Default)]
pub struct RelationGraph<Id> {
    /// Child lists in insertion order, with the edge info
    children: BTreeMap<Id, Vec<(Id, EdgeInfo)>>,
    /// Parent lists in insertion order
    parents: BTreeMap<Id, Vec<Id>>,
}

impl<Id: Copy + Ord + Eq + Hash> RelationGraph<Id> {
    pub fn new() -> Self {
        Self {
            children: BTreeMap::new(),
            parents: BTreeMap::new(),
        }
    }

    /// Declare an edge, merging info if it already exists
    pub fn add_edge(&mut self, parent: Id, child: Id, info: EdgeInfo) -> Result<EdgeChange, PlanError> {
        if parent == child {
            return Err(PlanError::SelfRelation);
        }

        let entries = self.children.entry(parent).or_default();
        if let Some((_, existing)) = entries.iter_mut().find(|(c, _)| *c == child) {
            merge_edge_info(existing, &info)?;
            return Ok(EdgeChange::Updated);
        }

        entries.push((child, info));
        self.parents.entry(child).or_default().push(parent);
        Ok(EdgeChange::Added)
    }

    /// Remove an edge. Returns false if it did not exist.
    pub fn remove_edge(&mut self, parent: Id, child: Id) -> bool {
        let Some(entries) = self.children.get_mut(&parent) else {
            return false;
        };
        let Some(pos) = entries.iter().position(|(c, _)| *c == child) else {
            return false;
        };
        entries.remove(pos);
        if let Some(parents) = self.parents.get_mut(&child) {
            parents.retain(|p| *p != parent);
        }
        true
    }

    pub fn contains_edge(&self, parent: Id, child: Id) -> bool {
        self.children
            .get(&parent)
            .is_some_and(|entries| entries.iter().any(|(c, _)| *c == child))
    }

    pub fn edge_info(&self, parent: Id, child: Id) -> Option<&EdgeInfo> {
        self.children
            .get(&parent)?
            .iter()
            .find(|(c, _)| *c == child)
            .map(|(_, info)| info)
    }

    /// Children of `parent` with edge info, in insertion order
    pub fn each_child(&self, parent: Id) -> impl Iterator<Item = (Id, &EdgeInfo)> {
        self.children
            .get(&parent)
            .into_iter()
            .flat_map(|entries| entries.iter().map(|(c, info)| (*c, info)))
    }

    /// Parents of `child`, in insertion order
    pub fn each_parent(&self, child: Id) -> impl Iterator<Item = Id> + '_ {
        self.parents
            .get(&child)
            .into_iter()
            .flat_map(|parents| parents.iter().copied())
    }

    /// Remove every edge touching `id`, returning the removed pairs
    pub fn remove_vertex(&mut self, id: Id) -> Vec<(Id, Id)> {
        let mut removed = Vec::new();

        if let Some(entries) = self.children.remove(&id) {
            for (child, _) in entries {
                if let Some(parents) = self.parents.get_mut(&child) {
                    parents.retain(|p| *p != id);
                }
                removed.push((id, child));
            }
        }
        if let Some(parents) = self.parents.remove(&id) {
            for parent in parents {
                if let Some(entries) = self.children.get_mut(&parent) {
                    entries.retain(|(c, _)| *c != id);
                }
                removed.push((parent, id));
            }
        }

        removed
    }

    /// All edges as (parent, child, info), parents in handle order
    pub fn each_edge(&self) -> impl Iterator<Item = (Id, Id, &EdgeInfo)> {
        self.children.iter().flat_map(|(parent, entries)| {
            entries.iter().map(move |(child, info)| (*parent, *child, info))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.children.values().all(|entries| entries.is_empty())
    }
}

#[cfg(test)]
#[path = "relations_tests.rs"]
mod tests;
