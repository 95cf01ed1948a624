// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task argument assignments
//!
//! Arguments are either set to a concrete value or delayed: a named
//! placeholder to be resolved before the task starts. Individual keys
//! can be frozen, after which any further write is rejected.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A single argument assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArgValue {
    /// Concrete value
    Set { value: serde_json::Value },
    /// Placeholder resolved later, described for diagnostics
    Delayed { description: String },
}

impl ArgValue {
    pub fn is_set(&self) -> bool {
        matches!(self, ArgValue::Set { .. })
    }

    pub fn value(&self) -> Option<&serde_json::Value> {
        match self {
            ArgValue::Set { value } => Some(value),
            ArgValue::Delayed { .. } => None,
        }
    }
}

/// The argument assignments of one task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Arguments {
    values: BTreeMap<String, ArgValue>,
    frozen: BTreeSet<String>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the given key can still be written
    pub fn writable(&self, key: &str) -> bool {
        !self.frozen.contains(key)
    }

    /// Assign a concrete value. Returns false if the key is frozen.
    #[must_use]
    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) -> bool {
        let key = key.into();
        if self.frozen.contains(&key) {
            return false;
        }
        self.values.insert(key, ArgValue::Set { value });
        true
    }

    /// Assign a delayed placeholder. Returns false if the key is frozen.
    #[must_use]
    pub fn set_delayed(&mut self, key: impl Into<String>, description: impl Into<String>) -> bool {
        let key = key.into();
        if self.frozen.contains(&key) {
            return false;
        }
        self.values.insert(
            key,
            ArgValue::Delayed {
                description: description.into(),
            },
        );
        true
    }

    /// Raw assignment used by journal replay, bypassing the frozen check
    pub fn apply(&mut self, key: impl Into<String>, value: ArgValue) {
        self.values.insert(key.into(), value);
    }

    /// Freeze one key against further writes
    pub fn freeze(&mut self, key: impl Into<String>) {
        self.frozen.insert(key.into());
    }

    pub fn is_frozen(&self, key: &str) -> bool {
        self.frozen.contains(key)
    }

    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.values.get(key)
    }

    /// The concrete value for a key, if one is set
    pub fn value(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key).and_then(|a| a.value())
    }

    /// Keys that are still delayed placeholders
    pub fn unset_delayed(&self) -> Vec<&str> {
        self.values
            .iter()
            .filter(|(_, v)| !v.is_set())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Whether every assignment is a concrete value
    pub fn fully_set(&self) -> bool {
        self.values.values().all(|v| v.is_set())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Snapshot of the assignments, used when journalling task creation
    pub fn snapshot(&self) -> BTreeMap<String, ArgValue> {
        self.values.clone()
    }
}

impl FromIterator<(String, serde_json::Value)> for Arguments {
    fn from_iter<T: IntoIterator<Item = (String, serde_json::Value)>>(iter: T) -> Self {
        let mut args = Arguments::new();
        for (key, value) in iter {
            args.values.insert(key, ArgValue::Set { value });
        }
        args
    }
}

#[cfg(test)]
#[path = "arguments_tests.rs"]
mod tests;
