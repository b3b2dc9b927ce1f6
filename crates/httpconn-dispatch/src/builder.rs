//! Request Builder (§4.6): turns an operation's declared shape plus a
//! caller's argument tree into one [`RetryableRequest`], ready for the
//! Upstream Manager's distribution step.

use std::collections::BTreeMap;

use bytes::Bytes;
use httpconn_codec::body::encode_body;
use httpconn_codec::error::FieldPath;
use httpconn_codec::param_encoder::{build_header_value, build_param_query_key, encode_query_values, encode_value, ParamPair};
use httpconn_schema::{ArgumentSpec, AuthRequirement, HttpSchema, OperationInfo, ParamLocation, ParamStyle, RequestParameter, Value};
use httpconn_core::request::{RequestUrl, RetryableRequest};
use httpconn_core::ConnectorError;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Output of a single `build` call: the wire request plus the security
/// requirements that applied to it (needed later by `ExecuteRequest`,
/// which otherwise only sees the already-built request).
pub struct BuiltRequest {
    pub request: RetryableRequest,
    pub security: Vec<AuthRequirement>,
}

/// Extract the forwarded-headers argument (§4.6), if configured, returning
/// the extracted header map and the arguments the rest of the builder
/// should see. An argument declared with its own `http` wiring (i.e. the
/// schema explicitly proxies it as a real parameter) is left in place.
pub fn extract_forwarded_headers(
    operation: &OperationInfo,
    forwarded_headers_argument: Option<&str>,
    mut arguments: serde_json::Map<String, serde_json::Value>,
) -> (BTreeMap<String, String>, serde_json::Map<String, serde_json::Value>) {
    let Some(arg_name) = forwarded_headers_argument else {
        return (BTreeMap::new(), arguments);
    };
    let Some(raw) = arguments.get(arg_name).cloned() else {
        return (BTreeMap::new(), arguments);
    };
    let headers = raw
        .as_object()
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();

    let explicitly_proxied = operation.arguments.get(arg_name).is_some_and(|spec| spec.http.is_some());
    if !explicitly_proxied {
        arguments.remove(arg_name);
    }
    (headers, arguments)
}

pub fn build_request(
    namespace: &str,
    operation: &OperationInfo,
    schema: &HttpSchema,
    arguments: &serde_json::Map<String, serde_json::Value>,
) -> Result<BuiltRequest, ConnectorError> {
    let request_spec = &operation.request;

    let mut url = request_spec.url.clone();
    let mut query_pairs: Vec<(String, String)> = Vec::new();
    let mut headers: Vec<(String, String)> = request_spec
        .headers
        .iter()
        .filter_map(|(name, value)| match value.resolve() {
            Ok(v) => Some((name.clone(), v)),
            Err(err) => {
                tracing::warn!(header = %name, error = %err, "skipping header with unresolvable value");
                None
            }
        })
        .collect();

    let mut allow_reserved_overall = false;

    for (arg_name, spec) in &operation.arguments {
        let Some(param) = &spec.http else { continue };
        if matches!(param.location, ParamLocation::Body | ParamLocation::FormData) {
            continue;
        }

        let json_value = arguments.get(arg_name).cloned().unwrap_or(serde_json::Value::Null);
        let value = Value::from_json(&json_value);
        let required = !spec.field.field_type.is_nullable();
        let path = FieldPath::root().field(arg_name);
        let pairs = encode_value(schema, &spec.field, &value, &path, required)
            .map_err(|e| ConnectorError::InvalidArgument { path: arg_name.clone(), message: e.to_string() })?;

        if pairs.is_empty() {
            continue;
        }

        match param.location {
            ParamLocation::Path => {
                let joined: Vec<&str> = pairs.iter().flat_map(|p| p.values.iter().map(String::as_str)).collect();
                let encoded = utf8_percent_encode(&joined.join(","), PATH_SEGMENT).to_string();
                let placeholder = format!("{{{}}}", param.name);
                url = url.replace(&placeholder, &encoded);
            }
            ParamLocation::Query => {
                // deepObject's structural `[`/`]` are unescaped unconditionally
                // (§4.1.1's style table), not gated behind `allowReserved`.
                if param.encoding.allow_reserved || matches!(param.encoding.style, ParamStyle::DeepObject) {
                    allow_reserved_overall = true;
                }
                for pair in &pairs {
                    query_pairs.extend(build_param_query_key(&param.name, &param.encoding, pair));
                }
            }
            ParamLocation::Header => {
                let value = render_header_value(&pairs, param.encoding.explode());
                headers.push((param.name.clone(), value));
            }
            ParamLocation::Body | ParamLocation::FormData => unreachable!(),
        }
    }

    if !query_pairs.is_empty() {
        let query_string = encode_query_values(&query_pairs, allow_reserved_overall);
        let sep = if url.contains('?') { '&' } else { '?' };
        url.push(sep);
        url.push_str(&query_string);
    }

    let (body, content_type) = build_body(operation, schema, arguments)?;

    let runtime = request_spec.runtime.clone();
    let request_url = if RequestUrl::is_absolute(&url) {
        RequestUrl::Absolute(url)
    } else {
        RequestUrl::Relative(url)
    };

    let request = RetryableRequest {
        method: request_spec.method,
        url: request_url,
        namespace: namespace.to_string(),
        server_id: None,
        content_type,
        headers,
        body,
        runtime,
    };

    Ok(BuiltRequest {
        request,
        security: request_spec.security.clone(),
    })
}

fn find_body_argument<'a>(operation: &'a OperationInfo) -> Option<(&'a str, &'a ArgumentSpec, &'a RequestParameter)> {
    operation.arguments.iter().find_map(|(name, spec)| {
        let param = spec.http.as_ref()?;
        matches!(param.location, ParamLocation::Body | ParamLocation::FormData).then_some((name.as_str(), spec, param))
    })
}

fn build_body(
    operation: &OperationInfo,
    schema: &HttpSchema,
    arguments: &serde_json::Map<String, serde_json::Value>,
) -> Result<(Option<Bytes>, Option<String>), ConnectorError> {
    let Some(body_spec) = &operation.request.request_body else {
        return Ok((None, None));
    };

    let Some((arg_name, arg_spec, _param)) = find_body_argument(operation) else {
        return Err(ConnectorError::InvalidArgument {
            path: "body".to_string(),
            message: "operation declares a request body but names no body argument".to_string(),
        });
    };

    let json_value = arguments.get(arg_name).cloned().unwrap_or(serde_json::Value::Null);
    if json_value.is_null() {
        if arg_spec.field.field_type.is_nullable() {
            return Ok((None, None));
        }
        return Err(ConnectorError::InvalidArgument {
            path: arg_name.to_string(),
            message: "request body is required".to_string(),
        });
    }

    let value = Value::from_json(&json_value);
    let encoded = encode_body(schema, &arg_spec.field.field_type, arg_name, body_spec, &value)?;
    Ok((Some(Bytes::from(encoded.bytes)), Some(encoded.content_type)))
}

/// Header-parameter rendering (§4.1.1's header rule), composed here from
/// [`ParamPair`] primitives rather than in the codec crate: the rule spans
/// however many pairs a single argument encodes into, not just one.
fn render_header_value(pairs: &[ParamPair], explode: bool) -> String {
    if pairs.len() == 1 && pairs[0].keys.is_empty() {
        return pairs[0].values.join(",");
    }
    let merged = ParamPair {
        keys: pairs.iter().flat_map(|p| p.keys.iter().cloned()).collect(),
        values: pairs.iter().flat_map(|p| p.values.iter().cloned()).collect(),
    };
    build_header_value(&merged, explode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpconn_schema::{
        FieldHttpHints, FieldSpec, HttpMethod, ObjectType, ParamEncoding, ParamStyle, RequestSpec, RuntimeSettings,
        ScalarRepresentation, ScalarType, TypeRef,
    };

    /// §8 scenario 2, exercised through the full builder pipeline rather
    /// than `build_param_query_key` alone: deepObject's structural
    /// brackets must reach the URL unescaped even with `allowReserved`
    /// left at its default of `false`.
    #[test]
    fn deep_object_query_param_leaves_brackets_unescaped_in_the_built_url() {
        let mut scalar_types = BTreeMap::new();
        scalar_types.insert("String".to_string(), ScalarType { representation: ScalarRepresentation::String });

        let mut role_item_fields = BTreeMap::new();
        role_item_fields.insert("user".to_string(), FieldSpec { field_type: TypeRef::array(TypeRef::named("String")), http: None });
        let mut role_wrap_fields = BTreeMap::new();
        role_wrap_fields.insert("role".to_string(), FieldSpec { field_type: TypeRef::array(TypeRef::named("RoleItem")), http: None });

        let mut object_types = BTreeMap::new();
        object_types.insert("RoleItem".to_string(), ObjectType { fields: role_item_fields, xml: None });
        object_types.insert("RoleWrap".to_string(), ObjectType { fields: role_wrap_fields, xml: None });

        let schema = HttpSchema {
            functions: BTreeMap::new(),
            procedures: BTreeMap::new(),
            object_types,
            scalar_types,
        };

        let mut arguments = BTreeMap::new();
        arguments.insert(
            "id".to_string(),
            ArgumentSpec {
                field: FieldSpec { field_type: TypeRef::named("RoleWrap"), http: None },
                http: Some(RequestParameter {
                    name: "id".to_string(),
                    argument_name: "id".to_string(),
                    location: ParamLocation::Query,
                    encoding: ParamEncoding { style: ParamStyle::DeepObject, explode: Some(true), ..Default::default() },
                    schema: FieldHttpHints::default(),
                }),
            },
        );

        let operation = OperationInfo {
            request: RequestSpec {
                url: "/search".to_string(),
                method: HttpMethod::Get,
                headers: BTreeMap::new(),
                security: vec![],
                servers: None,
                request_body: None,
                runtime: RuntimeSettings::default(),
            },
            arguments,
            result_type: TypeRef::named("String"),
        };

        let args = serde_json::json!({
            "id": {"role": [{"user": ["admin", "anonymous"]}]}
        })
        .as_object()
        .unwrap()
        .clone();

        let built = build_request("svc", &operation, &schema, &args).unwrap();
        assert_eq!(
            built.request.url.as_str(),
            "/search?id[role][][user][]=admin&id[role][][user][]=anonymous"
        );
    }
}
