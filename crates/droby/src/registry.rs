// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Type-tag codec registry
//!
//! Application values that need their own wire form register a codec
//! pair under a type tag. On dump, a JSON object whose `$tag` names a
//! registered codec is encoded through it; on load, the matching
//! decoder rebuilds the plain value. Codecs build their field trees
//! from [`DrobyValue`] constructors directly.

use crate::errors::DrobyError;
use crate::value::DrobyValue;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Encodes the fields of a `$tag` JSON object into wire values
pub type EncodeFn = Box<
    dyn Fn(&serde_json::Map<String, Value>) -> Result<BTreeMap<String, DrobyValue>, DrobyError>
        + Send
        + Sync,
>;

/// Decodes wire fields back into a plain JSON value
pub type DecodeFn =
    Box<dyn Fn(&BTreeMap<String, DrobyValue>) -> Result<Value, DrobyError> + Send + Sync>;

struct Codec {
    encode: EncodeFn,
    decode: DecodeFn,
}

/// Central codec table, dispatched by type tag
#[derive(Default)]
pub struct TypeRegistry {
    codecs: HashMap<String, Codec>,
}

impl TypeRegistry {
    /// An empty registry with no codecs at all
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in codecs registered
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("quantity", quantity_encode(), quantity_decode());
        registry
    }

    pub fn register(&mut self, tag: impl Into<String>, encode: EncodeFn, decode: DecodeFn) {
        self.codecs.insert(tag.into(), Codec { encode, decode });
    }

    pub fn knows(&self, tag: &str) -> bool {
        self.codecs.contains_key(tag)
    }

    pub(crate) fn encode(
        &self,
        tag: &str,
        fields: &serde_json::Map<String, Value>,
    ) -> Result<BTreeMap<String, DrobyValue>, DrobyError> {
        let codec = self
            .codecs
            .get(tag)
            .ok_or_else(|| DrobyError::UnknownTag(tag.to_string()))?;
        (codec.encode)(fields)
    }

    pub(crate) fn decode(
        &self,
        tag: &str,
        fields: &BTreeMap<String, DrobyValue>,
    ) -> Result<Value, DrobyError> {
        let codec = self
            .codecs
            .get(tag)
            .ok_or_else(|| DrobyError::UnknownTag(tag.to_string()))?;
        (codec.decode)(fields)
    }
}

fn malformed(tag: &str, detail: impl Into<String>) -> DrobyError {
    DrobyError::MalformedValue {
        tag: tag.to_string(),
        detail: detail.into(),
    }
}

/// Unit-tagged numbers: `{"$tag": "quantity", "value": 10, "unit": "deg"}`.
/// The raw magnitude travels unchanged; decoding converts to the base
/// unit (radians for angles, seconds for durations).
fn quantity_encode() -> EncodeFn {
    Box::new(|fields| {
        let value = fields
            .get("value")
            .and_then(Value::as_f64)
            .ok_or_else(|| malformed("quantity", "value must be a number"))?;
        let unit = fields
            .get("unit")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("quantity", "unit must be a string"))?;
        let mut out = BTreeMap::new();
        out.insert("value".to_string(), DrobyValue::Float { value });
        out.insert(
            "unit".to_string(),
            DrobyValue::Str {
                value: unit.to_string(),
            },
        );
        Ok(out)
    })
}

fn quantity_decode() -> DecodeFn {
    Box::new(|fields| {
        let value = match fields.get("value") {
            Some(DrobyValue::Float { value }) => *value,
            Some(DrobyValue::Int { value }) => *value as f64,
            _ => return Err(malformed("quantity", "value must be a number")),
        };
        let Some(DrobyValue::Str { value: unit }) = fields.get("unit") else {
            return Err(malformed("quantity", "unit must be a string"));
        };
        let converted = match unit.as_str() {
            "deg" => value.to_radians(),
            "rad" => value,
            "ms" => value / 1000.0,
            "s" => value,
            other => return Err(malformed("quantity", format!("unknown unit {other:?}"))),
        };
        serde_json::Number::from_f64(converted)
            .map(Value::Number)
            .ok_or_else(|| malformed("quantity", "conversion left a non-finite number"))
    })
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
