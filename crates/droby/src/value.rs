// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The wire value tree
//!
//! Everything crossing a droby link is a [`DrobyValue`]: plain scalars
//! and containers pass through unchanged, application payloads carrying
//! a `$tag` key go through the [`TypeRegistry`] codecs, and plan
//! objects travel as structural dumps on first contact, then as bare
//! [`DrobyId`] references.

use crate::errors::DrobyError;
use crate::ids::DrobyId;
use crate::registry::TypeRegistry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use weft_core::{ArgDef, ErrorKind, EventDef, EventId, FailurePoint, PlanId, TaskId};

/// Key marking a JSON object as a registry-coded payload
pub const TAG_KEY: &str = "$tag";

/// One node of the marshalled value tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrobyValue {
    Null,
    Bool {
        value: bool,
    },
    Int {
        value: i64,
    },
    Float {
        value: f64,
    },
    Str {
        value: String,
    },
    Sym {
        name: String,
    },
    Time {
        value: DateTime<Utc>,
    },
    Range {
        start: i64,
        end: i64,
        inclusive: bool,
    },
    Array {
        items: Vec<DrobyValue>,
    },
    Map {
        entries: Vec<(DrobyValue, DrobyValue)>,
    },
    Set {
        items: Vec<DrobyValue>,
    },
    /// Registry-coded payload, dispatched by tag
    Tagged {
        tag: String,
        fields: BTreeMap<String, DrobyValue>,
    },
    /// Reference to an object already shared on this link
    RemoteId {
        id: DrobyId,
    },
    Model(ModelDump),
    Task(TaskDump),
    Event(EventDump),
    Plan(PlanDump),
    Exception(ExceptionDump),
}

impl DrobyValue {
    /// Variant name, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            DrobyValue::Null => "null",
            DrobyValue::Bool { .. } => "bool",
            DrobyValue::Int { .. } => "int",
            DrobyValue::Float { .. } => "float",
            DrobyValue::Str { .. } => "str",
            DrobyValue::Sym { .. } => "sym",
            DrobyValue::Time { .. } => "time",
            DrobyValue::Range { .. } => "range",
            DrobyValue::Array { .. } => "array",
            DrobyValue::Map { .. } => "map",
            DrobyValue::Set { .. } => "set",
            DrobyValue::Tagged { .. } => "tagged",
            DrobyValue::RemoteId { .. } => "remote_id",
            DrobyValue::Model(_) => "model",
            DrobyValue::Task(_) => "task",
            DrobyValue::Event(_) => "event",
            DrobyValue::Plan(_) => "plan",
            DrobyValue::Exception(_) => "exception",
        }
    }
}

/// Full structural dump of a task model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDump {
    pub id: DrobyId,
    pub name: String,
    /// Model names from the dumped model up to the root boundary
    pub chain: Vec<String>,
    /// Event definitions, flattened over the model chain
    pub events: Vec<EventDef>,
    /// Argument definitions, flattened over the model chain
    pub arguments: Vec<ArgDef>,
    pub provides: Vec<String>,
    pub abstract_model: bool,
}

/// Full structural dump of a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDump {
    pub id: DrobyId,
    /// Plan-scoped handle on the dumping side
    pub handle: TaskId,
    /// Model reference: a [`DrobyValue::Model`] dump or a registered id
    pub model: Box<DrobyValue>,
    pub arguments: BTreeMap<String, DrobyValue>,
    /// Bound generators by symbol, with their dumping-side handles
    pub bound_events: BTreeMap<String, EventId>,
}

/// Full structural dump of a free event generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDump {
    pub id: DrobyId,
    pub handle: EventId,
    pub controlable: bool,
    /// Owning task handle for bound generators
    pub owner: Option<TaskId>,
    pub symbol: Option<String>,
}

/// Identity dump of a plan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanDump {
    pub id: DrobyId,
    pub plan: PlanId,
}

/// Wire form of an execution exception
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionDump {
    /// Serialized as `error_kind`: the enclosing [`DrobyValue`] is
    /// internally tagged by `kind`, so the bare name would collide
    #[serde(rename = "error_kind")]
    pub kind: ErrorKind,
    pub failure_point: FailurePoint,
    pub message: String,
    pub time: DateTime<Utc>,
    pub trace: Vec<(TaskId, TaskId)>,
    pub handled: bool,
}

/// Convert a plain JSON value into the wire tree. Objects carrying a
/// `$tag` key are dispatched through the registry codecs.
pub fn from_json(value: &Value, registry: &TypeRegistry) -> Result<DrobyValue, DrobyError> {
    match value {
        Value::Null => Ok(DrobyValue::Null),
        Value::Bool(value) => Ok(DrobyValue::Bool { value: *value }),
        Value::Number(number) => {
            if let Some(value) = number.as_i64() {
                Ok(DrobyValue::Int { value })
            } else if let Some(value) = number.as_f64() {
                Ok(DrobyValue::Float { value })
            } else {
                Err(DrobyError::MalformedValue {
                    tag: "number".to_string(),
                    detail: format!("{number} does not fit the wire number types"),
                })
            }
        }
        Value::String(value) => Ok(DrobyValue::Str {
            value: value.clone(),
        }),
        Value::Array(items) => {
            let items = items
                .iter()
                .map(|item| from_json(item, registry))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(DrobyValue::Array { items })
        }
        Value::Object(map) => {
            if let Some(Value::String(tag)) = map.get(TAG_KEY) {
                let fields = registry.encode(tag, map)?;
                Ok(DrobyValue::Tagged {
                    tag: tag.clone(),
                    fields,
                })
            } else {
                let entries = map
                    .iter()
                    .map(|(key, value)| {
                        Ok((
                            DrobyValue::Str { value: key.clone() },
                            from_json(value, registry)?,
                        ))
                    })
                    .collect::<Result<Vec<_>, DrobyError>>()?;
                Ok(DrobyValue::Map { entries })
            }
        }
    }
}

/// Convert a wire tree back into plain JSON. Tagged payloads go through
/// the registry decoders; plan object dumps have no plain JSON form and
/// must be resolved through a [`crate::Marshaller`] instead.
pub fn to_json(value: &DrobyValue, registry: &TypeRegistry) -> Result<Value, DrobyError> {
    match value {
        DrobyValue::Null => Ok(Value::Null),
        DrobyValue::Bool { value } => Ok(Value::Bool(*value)),
        DrobyValue::Int { value } => Ok(Value::from(*value)),
        DrobyValue::Float { value } => serde_json::Number::from_f64(*value)
            .map(Value::Number)
            .ok_or_else(|| DrobyError::MalformedValue {
                tag: "float".to_string(),
                detail: "not a finite number".to_string(),
            }),
        DrobyValue::Str { value } => Ok(Value::String(value.clone())),
        DrobyValue::Sym { name } => Ok(Value::String(name.clone())),
        DrobyValue::Time { value } => Ok(Value::String(value.to_rfc3339())),
        DrobyValue::Range {
            start,
            end,
            inclusive,
        } => Ok(serde_json::json!({
            "start": start,
            "end": end,
            "inclusive": inclusive,
        })),
        DrobyValue::Array { items } | DrobyValue::Set { items } => {
            let items = items
                .iter()
                .map(|item| to_json(item, registry))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(items))
        }
        DrobyValue::Map { entries } => {
            let mut out = serde_json::Map::new();
            for (key, value) in entries {
                let DrobyValue::Str { value: key } = key else {
                    return Err(DrobyError::MalformedValue {
                        tag: "map".to_string(),
                        detail: format!("{} key has no JSON object form", key.kind()),
                    });
                };
                out.insert(key.clone(), to_json(value, registry)?);
            }
            Ok(Value::Object(out))
        }
        DrobyValue::Tagged { tag, fields } => registry.decode(tag, fields),
        other => Err(DrobyError::MalformedValue {
            tag: other.kind().to_string(),
            detail: "plan object references have no plain JSON form".to_string(),
        }),
    }
}

#[cfg(test)]
#[path = "value_tests.rs"]
mod tests;
