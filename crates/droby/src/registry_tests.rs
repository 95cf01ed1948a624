// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn quantity_fields(value: f64, unit: &str) -> BTreeMap<String, DrobyValue> {
    let mut fields = BTreeMap::new();
    fields.insert("value".to_string(), DrobyValue::Float { value });
    fields.insert(
        "unit".to_string(),
        DrobyValue::Str {
            value: unit.to_string(),
        },
    );
    fields
}

#[parameterized(
        degrees_to_radians = { 180.0, "deg", std::f64::consts::PI },
        radians_pass_through = { 1.5, "rad", 1.5 },
        millis_to_seconds = { 2500.0, "ms", 2.5 },
        seconds_pass_through = { 0.25, "s", 0.25 },
    )]
fn quantity_decodes_to_base_units(value: f64, unit: &str, expected: f64) {
    let registry = TypeRegistry::with_builtins();
    let decoded = registry
        .decode("quantity", &quantity_fields(value, unit))
        .unwrap();
    assert!((decoded.as_f64().unwrap() - expected).abs() < 1e-9);
}

#[test]
fn quantity_encode_keeps_the_raw_magnitude() {
    let registry = TypeRegistry::with_builtins();
    let mut object = serde_json::Map::new();
    object.insert("$tag".to_string(), Value::String("quantity".to_string()));
    object.insert("value".to_string(), Value::from(90));
    object.insert("unit".to_string(), Value::String("deg".to_string()));

    let fields = registry.encode("quantity", &object).unwrap();
    assert_eq!(fields.get("value"), Some(&DrobyValue::Float { value: 90.0 }));
    assert_eq!(
        fields.get("unit"),
        Some(&DrobyValue::Str {
            value: "deg".to_string()
        })
    );
}

#[test]
fn unknown_unit_is_malformed() {
    let registry = TypeRegistry::with_builtins();
    let err = registry
        .decode("quantity", &quantity_fields(1.0, "furlong"))
        .unwrap_err();
    assert!(matches!(err, DrobyError::MalformedValue { tag, .. } if tag == "quantity"));
}

#[test]
fn unknown_tag_is_rejected() {
    let registry = TypeRegistry::with_builtins();
    let err = registry.decode("pose", &BTreeMap::new()).unwrap_err();
    assert!(matches!(err, DrobyError::UnknownTag(tag) if tag == "pose"));
    assert!(!registry.knows("pose"));
    assert!(registry.knows("quantity"));
}

#[test]
fn custom_codecs_can_be_registered() {
    let mut registry = TypeRegistry::new();
    registry.register(
        "flag",
        Box::new(|fields| {
            let raised = fields
                .get("raised")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let mut out = BTreeMap::new();
            out.insert("raised".to_string(), DrobyValue::Bool { value: raised });
            Ok(out)
        }),
        Box::new(|fields| match fields.get("raised") {
            Some(DrobyValue::Bool { value }) => Ok(Value::Bool(*value)),
            _ => Err(DrobyError::MalformedValue {
                tag: "flag".to_string(),
                detail: "raised must be a bool".to_string(),
            }),
        }),
    );

    let mut object = serde_json::Map::new();
    object.insert("$tag".to_string(), Value::String("flag".to_string()));
    object.insert("raised".to_string(), Value::Bool(true));
    let fields = registry.encode("flag", &object).unwrap();
    assert_eq!(registry.decode("flag", &fields).unwrap(), Value::Bool(true));
}
