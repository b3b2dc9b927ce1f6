use std::collections::BTreeMap;

use httpconn_codec::{decode_json, encode_json};
use httpconn_schema::{FieldSpec, HttpSchema, ObjectType, ScalarRepresentation, ScalarType, TypeRef, Value};

fn schema() -> HttpSchema {
    let mut object_types = BTreeMap::new();
    object_types.insert(
        "Address".to_string(),
        ObjectType {
            fields: BTreeMap::from([
                (
                    "city".to_string(),
                    FieldSpec {
                        field_type: TypeRef::named("String"),
                        http: None,
                    },
                ),
                (
                    "zip".to_string(),
                    FieldSpec {
                        field_type: TypeRef::nullable(TypeRef::named("String")),
                        http: None,
                    },
                ),
            ]),
            xml: None,
        },
    );
    object_types.insert(
        "Customer".to_string(),
        ObjectType {
            fields: BTreeMap::from([
                (
                    "id".to_string(),
                    FieldSpec {
                        field_type: TypeRef::named("Uuid"),
                        http: None,
                    },
                ),
                (
                    "address".to_string(),
                    FieldSpec {
                        field_type: TypeRef::named("Address"),
                        http: None,
                    },
                ),
                (
                    "tags".to_string(),
                    FieldSpec {
                        field_type: TypeRef::array(TypeRef::named("String")),
                        http: None,
                    },
                ),
            ]),
            xml: None,
        },
    );

    let mut scalar_types = BTreeMap::new();
    scalar_types.insert(
        "Uuid".to_string(),
        ScalarType {
            representation: ScalarRepresentation::Uuid,
        },
    );
    scalar_types.insert(
        "String".to_string(),
        ScalarType {
            representation: ScalarRepresentation::String,
        },
    );

    HttpSchema {
        functions: BTreeMap::new(),
        procedures: BTreeMap::new(),
        object_types,
        scalar_types,
    }
}

#[test]
fn decodes_nested_object_and_array_fields() {
    let schema = schema();
    let bytes = br#"{
        "id": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
        "address": {"city": "Berlin", "zip": null},
        "tags": ["a", "b"],
        "unknown_field": "ignored"
    }"#;

    let decoded = decode_json(&schema, &TypeRef::named("Customer"), bytes).unwrap();
    assert_eq!(
        decoded.get("id"),
        Some(&Value::String("3fa85f64-5717-4562-b3fc-2c963f66afa6".to_string()))
    );
    assert_eq!(decoded.get("address").and_then(|a| a.get("city")), Some(&Value::String("Berlin".to_string())));
    assert_eq!(decoded.get("address").and_then(|a| a.get("zip")), Some(&Value::Null));
    assert_eq!(
        decoded.get("tags"),
        Some(&Value::Array(vec![Value::String("a".to_string()), Value::String("b".to_string())]))
    );
    assert!(decoded.get("unknown_field").is_none());
}

#[test]
fn rejects_invalid_uuid_with_a_field_path() {
    let schema = schema();
    let bytes = br#"{"id": "not-a-uuid", "address": {"city": "Berlin", "zip": null}, "tags": []}"#;
    let err = decode_json(&schema, &TypeRef::named("Customer"), bytes).unwrap_err();
    assert!(err.to_string().contains("id"));
}

#[test]
fn encode_json_round_trips_plain_values() {
    let value = Value::Object(BTreeMap::from([
        ("a".to_string(), Value::Int(1)),
        ("b".to_string(), Value::Bool(true)),
    ]));
    let bytes = encode_json(&value);
    let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed["a"], 1);
    assert_eq!(parsed["b"], true);
}
