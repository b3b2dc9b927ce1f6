//! Schema-aware JSON decoding (§4.1.4) and plain encoding for request
//! bodies.

use httpconn_schema::{HttpSchema, TypeRef, Value};

use crate::error::{CodecError, CodecResult, FieldPath};
use crate::scalar_codec::coerce_scalar;

/// Encode a value tree as a JSON body. Bodies are marshaled as-is; schema
/// awareness only matters on the decode side (§4.1.2).
pub fn encode_json(value: &Value) -> Vec<u8> {
    serde_json::to_vec(&value.to_json()).unwrap_or_default()
}

/// Parse bytes into a generic tree, then walk it against the declared
/// [`TypeRef`] (§4.1.4): nullable propagates, arrays map element-wise,
/// unknown/unrepresented shapes pass through unchanged.
pub fn decode_json(schema: &HttpSchema, type_ref: &TypeRef, bytes: &[u8]) -> CodecResult<Value> {
    let raw: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| CodecError::DecodeFailed(e.to_string()))?;
    decode_against_type(schema, type_ref, Value::from_json(&raw), &FieldPath::root())
}

fn decode_against_type(
    schema: &HttpSchema,
    type_ref: &TypeRef,
    value: Value,
    path: &FieldPath,
) -> CodecResult<Value> {
    match type_ref {
        TypeRef::Nullable(inner) => {
            if value.is_null() {
                Ok(Value::Null)
            } else {
                decode_against_type(schema, inner, value, path)
            }
        }
        TypeRef::Array(inner) => match value {
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    out.push(decode_against_type(schema, inner, item, &path.index(i))?);
                }
                Ok(Value::Array(out))
            }
            other => Ok(other),
        },
        TypeRef::Named(name) => decode_named(schema, name, value, path),
        TypeRef::Predicate(_) => Ok(value),
    }
}

fn decode_named(schema: &HttpSchema, name: &str, value: Value, path: &FieldPath) -> CodecResult<Value> {
    if let Some(scalar) = schema.scalar_type(name) {
        return coerce_scalar(&scalar.representation, value, path);
    }
    if let Some(object) = schema.object_type(name) {
        let Value::Object(fields) = value else {
            return Ok(value);
        };
        let mut out = std::collections::BTreeMap::new();
        for (field_name, field_spec) in &object.fields {
            if let Some(field_value) = fields.get(field_name) {
                let child = decode_against_type(
                    schema,
                    &field_spec.field_type,
                    field_value.clone(),
                    &path.field(field_name),
                )?;
                out.insert(field_name.clone(), child);
            }
        }
        return Ok(Value::Object(out));
    }
    Ok(value)
}
