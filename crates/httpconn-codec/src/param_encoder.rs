//! OpenAPI 3.1 parameter serialization (§4.1.1).
//!
//! Two layers: [`encode_value`] walks a declared [`TypeRef`] and a [`Value`]
//! to produce an ordered list of `(keys, values)` pairs, and
//! `build_param_query_key`/`build_header_value` turn one such pair into
//! wire fragments per `style`/`explode`.

use httpconn_schema::{FieldHttpHints, FieldSpec, HttpSchema, ParamEncoding, ParamStyle, TypeRef, Value};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::error::{CodecError, CodecResult, FieldPath};
use crate::scalar_codec::stringify_scalar;

/// One accumulated `(keys, values)` pair. `keys` records the path of
/// object-field names walked to reach this leaf, with an empty string
/// marking an array index position (rendered as `[]` for `deepObject`).
/// `values` holds every stringified leaf collected under that same key
/// path — more than one only when the leaf itself is an array of scalars.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParamPair {
    pub keys: Vec<String>,
    pub values: Vec<String>,
}

/// Recursive descent over the declared type, per §4.1.1.
pub fn encode_value(
    schema: &HttpSchema,
    field: &FieldSpec,
    value: &Value,
    path: &FieldPath,
    required: bool,
) -> CodecResult<Vec<ParamPair>> {
    encode_type(schema, &field.field_type, value, path, required, field.http.as_ref())
}

fn encode_type(
    schema: &HttpSchema,
    type_ref: &TypeRef,
    value: &Value,
    path: &FieldPath,
    required: bool,
    hints: Option<&FieldHttpHints>,
) -> CodecResult<Vec<ParamPair>> {
    match type_ref {
        TypeRef::Nullable(inner) => {
            if value.is_null() {
                if required {
                    return Err(CodecError::invalid(path.clone(), "argument is required"));
                }
                return Ok(vec![]);
            }
            encode_type(schema, inner, value, path, required, hints)
        }
        TypeRef::Array(inner) => {
            let items = value.as_array().ok_or_else(|| {
                CodecError::invalid(path.clone(), "expected an array value")
            })?;
            let mut pairs = vec![];
            for (i, item) in items.iter().enumerate() {
                let item_hints = hints.and_then(|h| h.items.as_deref());
                let child_path = path.index(i);
                let child_pairs = encode_type(schema, inner, item, &child_path, false, item_hints)?;
                for mut pair in child_pairs {
                    pair.keys.insert(0, String::new());
                    pairs.push(pair);
                }
            }
            Ok(merge_same_key_pairs(pairs))
        }
        TypeRef::Named(name) => encode_named(schema, name, value, path),
        TypeRef::Predicate(_) => Ok(vec![ParamPair {
            keys: vec![],
            values: vec![value.stringify()],
        }]),
    }
}

fn encode_named(schema: &HttpSchema, name: &str, value: &Value, path: &FieldPath) -> CodecResult<Vec<ParamPair>> {
    if let Some(scalar) = schema.scalar_type(name) {
        let s = stringify_scalar(&scalar.representation, value, path)?;
        return Ok(vec![ParamPair {
            keys: vec![],
            values: vec![s],
        }]);
    }
    if let Some(object) = schema.object_type(name) {
        let fields = value
            .as_object()
            .ok_or_else(|| CodecError::invalid(path.clone(), format!("expected an object for type {name}")))?;
        let mut pairs = vec![];
        for (field_name, field_spec) in &object.fields {
            let Some(field_value) = fields.get(field_name) else {
                continue;
            };
            if field_value.is_null() {
                continue;
            }
            let child_path = path.field(field_name);
            let child_pairs = encode_type(
                schema,
                &field_spec.field_type,
                field_value,
                &child_path,
                false,
                field_spec.http.as_ref(),
            )?;
            for mut pair in child_pairs {
                pair.keys.insert(0, field_name.clone());
                pairs.push(pair);
            }
        }
        return Ok(pairs);
    }
    // Unknown named type: fall through to raw stringification.
    Ok(vec![ParamPair {
        keys: vec![],
        values: vec![value.stringify()],
    }])
}

/// Array recursion emits one pair per index; pairs sharing the same key
/// path (after the leading array marker) collapse into a single pair with
/// all values appended, matching the deepObject array encoding rules.
fn merge_same_key_pairs(pairs: Vec<ParamPair>) -> Vec<ParamPair> {
    let mut merged: Vec<ParamPair> = vec![];
    for pair in pairs {
        if let Some(existing) = merged.iter_mut().find(|p| p.keys == pair.keys) {
            existing.values.extend(pair.values);
        } else {
            merged.push(pair);
        }
    }
    merged
}

fn render_deep_object_segment(key: &str) -> String {
    if key.is_empty() {
        "[]".to_string()
    } else {
        format!("[{key}]")
    }
}

/// Turn one `(name, encoding, pair)` into logical `(key, value)` wire
/// fragments (unescaped; percent-encoding happens in
/// [`encode_query_values`]).
pub fn build_param_query_key(name: &str, encoding: &ParamEncoding, pair: &ParamPair) -> Vec<(String, String)> {
    let explode = encoding.explode();
    let keys = &pair.keys;
    let values = &pair.values;

    // A key path made only of array-position markers (no named object
    // fields along the way) carries no information outside `deepObject` —
    // treat it the same as a bare array sitting directly on the param.
    let bare_array = keys.iter().all(|k| k.is_empty());

    if bare_array && !values.is_empty() && !matches!(encoding.style, ParamStyle::DeepObject) {
        if values.len() == 1 {
            return vec![(name.to_string(), values[0].clone())];
        }
        return encode_array(name, encoding.style, explode, values);
    }

    match encoding.style {
        ParamStyle::Form | ParamStyle::Simple => {
            if keys.is_empty() {
                return vec![(name.to_string(), values.join(","))];
            }
            if explode {
                keys.iter().zip(values.iter()).map(|(k, v)| (k.clone(), v.clone())).collect()
            } else {
                let mut parts = vec![];
                for (k, v) in keys.iter().zip(values.iter()) {
                    parts.push(k.clone());
                    parts.push(v.clone());
                }
                vec![(name.to_string(), parts.join(","))]
            }
        }
        ParamStyle::SpaceDelimited | ParamStyle::PipeDelimited => encode_array(name, encoding.style, explode, values),
        ParamStyle::DeepObject => {
            let full_key = format!(
                "{name}{}",
                keys.iter().map(|k| render_deep_object_segment(k)).collect::<String>()
            );
            values.iter().map(|v| (full_key.clone(), v.clone())).collect()
        }
        ParamStyle::Matrix | ParamStyle::Label => {
            // Rare path-only styles; fall back to form-like joining.
            if keys.is_empty() {
                vec![(name.to_string(), values.join(","))]
            } else {
                let mut parts = vec![];
                for (k, v) in keys.iter().zip(values.iter()) {
                    parts.push(k.clone());
                    parts.push(v.clone());
                }
                vec![(name.to_string(), parts.join(","))]
            }
        }
    }
}

fn encode_array(name: &str, style: ParamStyle, explode: bool, values: &[String]) -> Vec<(String, String)> {
    if explode {
        return values.iter().map(|v| (name.to_string(), v.clone())).collect();
    }
    let sep = match style {
        ParamStyle::SpaceDelimited => " ",
        ParamStyle::PipeDelimited => "|",
        _ => ",",
    };
    vec![(name.to_string(), values.join(sep))]
}

/// Render a header value per §4.1.1's header rule.
pub fn build_header_value(pair: &ParamPair, explode: bool) -> String {
    if pair.keys.is_empty() {
        return pair.values.join(",");
    }
    if explode {
        pair.keys
            .iter()
            .zip(pair.values.iter())
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    } else {
        let mut parts = vec![];
        for (k, v) in pair.keys.iter().zip(pair.values.iter()) {
            parts.push(k.clone());
            parts.push(v.clone());
        }
        parts.join(",")
    }
}

const QUERY_RESERVED: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'%')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^')
    .add(b'[')
    .add(b']')
    .add(b'&')
    .add(b'=')
    .add(b'?')
    .add(b'/')
    .add(b':')
    .add(b'@')
    .add(b'!')
    .add(b'$')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*')
    .add(b'+')
    .add(b',')
    .add(b';');

/// Percent-encode and join a list of `(key, value)` pairs into a query
/// string. When `allow_reserved` is set, reserved characters are left
/// unescaped (§4.1.1 rule c).
pub fn encode_query_values(pairs: &[(String, String)], allow_reserved: bool) -> String {
    pairs
        .iter()
        .map(|(k, v)| {
            if allow_reserved {
                format!("{k}={v}")
            } else {
                format!(
                    "{}={}",
                    utf8_percent_encode(k, QUERY_RESERVED),
                    utf8_percent_encode(v, QUERY_RESERVED)
                )
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}
