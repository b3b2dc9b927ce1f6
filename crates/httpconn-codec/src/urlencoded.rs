//! `application/x-www-form-urlencoded` request bodies (§4.1.2).
//!
//! Reuses the parameter encoder (§4.1.1) field-by-field. Nested
//! objects/arrays use bracket notation (`parent[child]`, `name[]`), the
//! conventional HTML form serialization, via `deepObject` style; scalar
//! fields collapse to a plain `name=value`.

use httpconn_schema::{HttpSchema, ParamEncoding, ParamStyle, TypeRef, Value};

use crate::error::{CodecError, CodecResult, FieldPath};
use crate::param_encoder::{build_param_query_key, encode_query_values, encode_value};

pub fn encode_urlencoded(schema: &HttpSchema, type_ref: &TypeRef, value: &Value) -> CodecResult<Vec<u8>> {
    let TypeRef::Named(name) = type_ref.underlying() else {
        return Err(CodecError::UnsupportedContentType(
            "urlencoded body must be an object type".to_string(),
        ));
    };
    let object = schema
        .object_type(name)
        .ok_or_else(|| CodecError::UnsupportedContentType(format!("unknown object type {name}")))?;
    let fields = value
        .as_object()
        .ok_or_else(|| CodecError::invalid(FieldPath::root(), "urlencoded body must be an object"))?;

    let bracketed = ParamEncoding {
        style: ParamStyle::DeepObject,
        ..Default::default()
    };
    let mut pairs: Vec<(String, String)> = vec![];
    for (field_name, field_spec) in &object.fields {
        let Some(field_value) = fields.get(field_name) else {
            continue;
        };
        if field_value.is_null() {
            continue;
        }
        let path = FieldPath::root().field(field_name);
        for pair in encode_value(schema, field_spec, field_value, &path, false)? {
            pairs.extend(build_param_query_key(field_name, &bracketed, &pair));
        }
    }
    Ok(encode_query_values(&pairs, false).into_bytes())
}
