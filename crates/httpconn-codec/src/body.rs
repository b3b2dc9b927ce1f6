//! Request/response body codec dispatch (§4.1.2): selects an encoder or
//! decoder by declared/observed content type and hands off to the
//! matching module.

use httpconn_schema::{HttpSchema, RequestBody, TypeRef, Value};

use crate::error::{CodecError, CodecResult, FieldPath};
use crate::json_codec::{decode_json, encode_json};
use crate::multipart::{encode_multipart, write_multipart_body};
use crate::urlencoded::encode_urlencoded;
use crate::xml_codec::{decode_xml, decode_xml_arbitrary, encode_xml};

pub struct EncodedBody {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

fn is_xml(content_type: &str) -> bool {
    content_type.ends_with("+xml") || content_type == "application/xml" || content_type == "text/xml"
}

/// Encode an argument tree into a wire body per the request body's
/// declared `content_type`.
pub fn encode_body(
    schema: &HttpSchema,
    type_ref: &TypeRef,
    root_field: &str,
    body_spec: &RequestBody,
    value: &Value,
) -> CodecResult<EncodedBody> {
    let base = strip_params(&body_spec.content_type);
    match base.as_str() {
        "application/json" => Ok(EncodedBody {
            content_type: body_spec.content_type.clone(),
            bytes: encode_json(value),
        }),
        "application/x-www-form-urlencoded" => Ok(EncodedBody {
            content_type: body_spec.content_type.clone(),
            bytes: encode_urlencoded(schema, type_ref, value)?,
        }),
        "multipart/form-data" => {
            let parts = encode_multipart(schema, type_ref, value, &body_spec.encoding)?;
            let (bytes, content_type) = write_multipart_body(&parts);
            Ok(EncodedBody { content_type, bytes })
        }
        "text/plain" => Ok(EncodedBody {
            content_type: body_spec.content_type.clone(),
            bytes: value.stringify().into_bytes(),
        }),
        "application/octet-stream" => match value {
            Value::Bytes(bytes) => Ok(EncodedBody {
                content_type: body_spec.content_type.clone(),
                bytes: bytes.clone(),
            }),
            other => Err(CodecError::invalid(
                FieldPath::root(),
                format!("expected bytes for an octet-stream body, got {other:?}"),
            )),
        },
        ct if is_xml(ct) => Ok(EncodedBody {
            content_type: body_spec.content_type.clone(),
            bytes: encode_xml(schema, type_ref, root_field, value)?,
        }),
        other => Err(CodecError::UnsupportedContentType(other.to_string())),
    }
}

/// Decode a response body against a declared result type, routing by the
/// response's own `Content-Type` header rather than the request's.
pub fn decode_body(schema: &HttpSchema, type_ref: &TypeRef, content_type: &str, bytes: &[u8]) -> CodecResult<Value> {
    let base = strip_params(content_type);
    match base.as_str() {
        "application/json" => decode_json(schema, type_ref, bytes),
        "text/plain" => Ok(Value::String(String::from_utf8_lossy(bytes).to_string())),
        ct if is_xml(ct) => decode_xml(schema, type_ref, bytes),
        _ => Ok(Value::Bytes(bytes.to_vec())),
    }
}

/// Decode a response body with no declared result type, used to surface
/// error/detail payloads verbatim (§6, §7).
pub fn decode_body_arbitrary(content_type: &str, bytes: &[u8]) -> CodecResult<Value> {
    let base = strip_params(content_type);
    match base.as_str() {
        "application/json" => match serde_json::from_slice::<serde_json::Value>(bytes) {
            Ok(raw) => Ok(Value::from_json(&raw)),
            Err(_) => Ok(Value::String(String::from_utf8_lossy(bytes).to_string())),
        },
        ct if is_xml(ct) => decode_xml_arbitrary(bytes),
        _ => Ok(Value::String(String::from_utf8_lossy(bytes).to_string())),
    }
}

fn strip_params(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase()
}
