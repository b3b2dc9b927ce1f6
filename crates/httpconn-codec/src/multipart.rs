//! `multipart/form-data` request bodies (§4.1.2).
//!
//! Each declared field becomes one or more parts: fields whose encoding
//! rule lists `application/json` are serialized as a JSON part, `Bytes`
//! scalars become file parts (accepting a raw byte string, a bare
//! base64 string, or a `data:` URI via [`crate::data_uri`]), and
//! everything else is flattened through the same recursive-descent walk
//! used for query strings (§4.1.1), rendered as repeated text parts
//! (`name`, `name[]`, `parent.child`, …).

use std::collections::BTreeMap;

use httpconn_schema::{EncodingRule, HttpSchema, ScalarRepresentation, TypeRef, Value};

use crate::data_uri::parse_data_uri;
use crate::error::{CodecError, CodecResult, FieldPath};
use crate::json_codec::encode_json;
use crate::param_encoder::encode_value;

#[derive(Debug, Clone, PartialEq)]
pub struct MultipartPart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Walk the body's declared object type and turn each populated field
/// into one or more [`MultipartPart`]s.
pub fn encode_multipart(
    schema: &HttpSchema,
    type_ref: &TypeRef,
    value: &Value,
    encoding: &BTreeMap<String, EncodingRule>,
) -> CodecResult<Vec<MultipartPart>> {
    let TypeRef::Named(name) = type_ref.underlying() else {
        return Err(CodecError::UnsupportedContentType(
            "multipart body must be an object type".to_string(),
        ));
    };
    let object = schema
        .object_type(name)
        .ok_or_else(|| CodecError::UnsupportedContentType(format!("unknown object type {name}")))?;
    let fields = value
        .as_object()
        .ok_or_else(|| CodecError::invalid(FieldPath::root(), "multipart body must be an object"))?;

    let mut parts = vec![];
    for (field_name, field_spec) in &object.fields {
        let Some(field_value) = fields.get(field_name) else {
            continue;
        };
        if field_value.is_null() {
            continue;
        }
        let path = FieldPath::root().field(field_name);
        let rule = encoding.get(field_name);

        if is_json_part(rule) {
            parts.push(MultipartPart {
                name: field_name.clone(),
                filename: None,
                content_type: Some("application/json".to_string()),
                data: encode_json(field_value),
            });
            continue;
        }

        if is_bytes_field(schema, &field_spec.field_type) {
            parts.push(encode_file_part(field_name, field_value, &path)?);
            continue;
        }

        // Nested fields carry structure as dotted names (`parent.child`);
        // an array position along the path renders as a trailing `[]`
        // instead of a dotted index, so a scalar array stays `name[]`
        // while a nested object field stays `parent.child` (§8 scenario 4).
        let pairs = encode_value(schema, field_spec, field_value, &path, false)?;
        for pair in pairs {
            let key = multipart_field_key(field_name, &pair.keys);
            for val in &pair.values {
                parts.push(MultipartPart {
                    name: key.clone(),
                    filename: None,
                    content_type: None,
                    data: val.clone().into_bytes(),
                });
            }
        }
    }
    Ok(parts)
}

/// Render a parameter-encoder key path as a multipart field name: a named
/// path segment joins with a dot (`parent.child`), an array-index marker
/// (an empty segment) joins as a trailing `[]`.
fn multipart_field_key(field_name: &str, keys: &[String]) -> String {
    let mut out = field_name.to_string();
    for key in keys {
        if key.is_empty() {
            out.push_str("[]");
        } else {
            out.push('.');
            out.push_str(key);
        }
    }
    out
}

fn is_json_part(rule: Option<&EncodingRule>) -> bool {
    rule.is_some_and(|r| r.content_type.iter().any(|c| c == "application/json"))
}

fn is_bytes_field(schema: &HttpSchema, type_ref: &TypeRef) -> bool {
    if let TypeRef::Named(name) = type_ref.underlying() {
        if let Some(scalar) = schema.scalar_type(name) {
            return matches!(scalar.representation, ScalarRepresentation::Bytes);
        }
    }
    false
}

fn encode_file_part(name: &str, value: &Value, path: &FieldPath) -> CodecResult<MultipartPart> {
    let data = match value {
        Value::Bytes(b) => b.clone(),
        Value::String(s) => parse_data_uri(s).map(|d| d.data)?,
        other => {
            return Err(CodecError::invalid(
                path.clone(),
                format!("expected bytes for file field, got {other:?}"),
            ));
        }
    };
    Ok(MultipartPart {
        name: name.to_string(),
        filename: Some(name.to_string()),
        content_type: Some("application/octet-stream".to_string()),
        data,
    })
}

/// Render parts into a complete body with a fresh random boundary,
/// returning the body bytes and the `multipart/form-data; boundary=...`
/// content-type header value.
pub fn write_multipart_body(parts: &[MultipartPart]) -> (Vec<u8>, String) {
    let boundary = format!("httpconn-{}", uuid::Uuid::new_v4().simple());
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
        if let Some(filename) = &part.filename {
            disposition.push_str(&format!("; filename=\"{filename}\""));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if let Some(content_type) = &part.content_type {
            body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (body, format!("multipart/form-data; boundary={boundary}"))
}
