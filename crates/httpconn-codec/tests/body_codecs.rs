use std::collections::BTreeMap;

use httpconn_codec::multipart::encode_multipart;
use httpconn_codec::urlencoded::encode_urlencoded;
use httpconn_schema::{
    EncodingRule, FieldSpec, HttpSchema, ObjectType, ScalarRepresentation, ScalarType, TypeRef, Value,
};

fn scalar(repr: ScalarRepresentation) -> ScalarType {
    ScalarType { representation: repr }
}

fn field(type_ref: TypeRef) -> FieldSpec {
    FieldSpec {
        field_type: type_ref,
        http: None,
    }
}

fn object(fields: &[(&str, FieldSpec)]) -> ObjectType {
    ObjectType {
        fields: fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        xml: None,
    }
}

fn schema_with(scalars: &[(&str, ScalarType)], objects: &[(&str, ObjectType)]) -> HttpSchema {
    HttpSchema {
        functions: BTreeMap::new(),
        procedures: BTreeMap::new(),
        object_types: objects.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        scalar_types: scalars.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
    }
}

fn obj(entries: &[(&str, Value)]) -> Value {
    Value::Object(entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
}

#[test]
fn urlencoded_nested_object_uses_bracket_notation() {
    let schema = schema_with(
        &[
            ("String", scalar(ScalarRepresentation::String)),
            ("Int64", scalar(ScalarRepresentation::Int64)),
        ],
        &[
            (
                "Payload",
                object(&[
                    ("value", field(TypeRef::named("String"))),
                    ("stripe_customer_id", field(TypeRef::named("String"))),
                ]),
            ),
            (
                "ChargeEvent",
                object(&[
                    ("event_name", field(TypeRef::named("String"))),
                    ("identifier", field(TypeRef::named("String"))),
                    ("payload", field(TypeRef::named("Payload"))),
                    ("timestamp", field(TypeRef::named("Int64"))),
                ]),
            ),
        ],
    );

    let value = obj(&[
        ("event_name", Value::String("k8hAOi2B52".to_string())),
        ("identifier", Value::String("identifier_123".to_string())),
        (
            "payload",
            obj(&[
                ("value", Value::String("25".to_string())),
                ("stripe_customer_id", Value::String("cus_test123".to_string())),
            ]),
        ),
        ("timestamp", Value::Int(931468280)),
    ]);

    let body = encode_urlencoded(&schema, &TypeRef::named("ChargeEvent"), &value).unwrap();
    let body = String::from_utf8(body).unwrap();
    assert_eq!(
        body,
        "event_name=k8hAOi2B52&identifier=identifier_123&\
         payload%5Bstripe_customer_id%5D=cus_test123&payload%5Bvalue%5D=25&\
         timestamp=931468280"
    );
}

#[test]
fn multipart_splits_bytes_json_and_nested_fields_into_parts() {
    let schema = schema_with(
        &[
            ("String", scalar(ScalarRepresentation::String)),
            ("Bytes", scalar(ScalarRepresentation::Bytes)),
            ("Boolean", scalar(ScalarRepresentation::Boolean)),
            ("Int64", scalar(ScalarRepresentation::Int64)),
        ],
        &[
            (
                "FileLinkData",
                object(&[
                    ("create", field(TypeRef::named("Boolean"))),
                    ("expires_at", field(TypeRef::named("Int64"))),
                ]),
            ),
            (
                "FileUpload",
                object(&[
                    ("file", field(TypeRef::named("Bytes"))),
                    ("purpose", field(TypeRef::named("String"))),
                    ("expand", field(TypeRef::array(TypeRef::named("String")))),
                    ("expand_json", field(TypeRef::array(TypeRef::named("String")))),
                    ("file_link_data", field(TypeRef::named("FileLinkData"))),
                ]),
            ),
        ],
    );

    let mut encoding = BTreeMap::new();
    encoding.insert(
        "expand_json".to_string(),
        EncodingRule {
            content_type: vec!["application/json".to_string()],
            headers: vec![],
        },
    );

    let value = obj(&[
        ("file", Value::String("aGVsbG8gd29ybGQ=".to_string())),
        ("purpose", Value::String("business_icon".to_string())),
        (
            "expand",
            Value::Array(vec![Value::String("foo".to_string()), Value::String("bar".to_string())]),
        ),
        (
            "expand_json",
            Value::Array(vec![Value::String("foo".to_string()), Value::String("bar".to_string())]),
        ),
        (
            "file_link_data",
            obj(&[("create", Value::Bool(true)), ("expires_at", Value::Int(181320689))]),
        ),
    ]);

    let parts = encode_multipart(&schema, &TypeRef::named("FileUpload"), &value, &encoding).unwrap();

    let find = |name: &str| parts.iter().find(|p| p.name == name).unwrap_or_else(|| panic!("missing part {name}"));

    let file_part = find("file");
    assert_eq!(file_part.data, b"hello world");
    assert_eq!(file_part.content_type.as_deref(), Some("application/octet-stream"));
    assert_eq!(file_part.filename.as_deref(), Some("file"));

    let purpose_part = find("purpose");
    assert_eq!(purpose_part.data, b"business_icon");

    let expand_values: Vec<_> = parts
        .iter()
        .filter(|p| p.name == "expand[]")
        .map(|p| String::from_utf8(p.data.clone()).unwrap())
        .collect();
    assert_eq!(expand_values, vec!["foo".to_string(), "bar".to_string()]);

    let json_part = find("expand_json");
    assert_eq!(json_part.content_type.as_deref(), Some("application/json"));
    assert_eq!(String::from_utf8(json_part.data.clone()).unwrap(), "[\"foo\",\"bar\"]");

    let create_part = find("file_link_data.create");
    assert_eq!(create_part.data, b"true");
    let expires_part = find("file_link_data.expires_at");
    assert_eq!(expires_part.data, b"181320689");
}
