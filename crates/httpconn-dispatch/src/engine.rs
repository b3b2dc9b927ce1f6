//! Dispatch Engine (§4.7): mode selection (single/sequence/parallel),
//! the per-request retry loop, response-content-type routing, and the
//! response-header forwarding envelope.
//!
//! Grounded on `gproxy-core/src/proxy_engine/dispatch.rs` (mode
//! resolution) and `gproxy-provider-impl/src/dispatch/mod.rs` (the
//! attempt/retry loop shape).

use std::sync::Arc;
use std::sync::Mutex;

use futures_util::stream::{FuturesUnordered, StreamExt};
use httpconn_codec::compression::{self, ContentEncoding};
use httpconn_codec::{decode_body_arbitrary, decode_json, decode_xml};
use httpconn_common::CoreConfig;
use httpconn_core::request::{DistributedResponse, RetryableRequest, ServerError, ServerResult};
use httpconn_core::upstream::{HttpOptions, UpstreamManager};
use httpconn_core::ConnectorError;
use httpconn_schema::{AuthRequirement, HttpSchema, TypeRef, Value};
use tokio::sync::Semaphore;

/// The Request Builder's output, bundled with enough schema/operation
/// context for the engine to decode a response (§4.7's `RequestBuilderResults`).
pub struct DispatchInput<'a> {
    pub requests: Vec<RetryableRequest>,
    pub schema: &'a HttpSchema,
    pub result_type: &'a TypeRef,
    pub security: &'a [AuthRequirement],
    pub http_options: &'a HttpOptions,
}

enum Mode {
    Single,
    Sequence,
    Parallel { concurrency: usize },
}

fn select_mode(requests: &[RetryableRequest], options: &HttpOptions) -> Mode {
    if !options.distributed || requests.len() == 1 {
        return Mode::Single;
    }
    if !options.parallel || options.concurrency <= 1 {
        return Mode::Sequence;
    }
    Mode::Parallel { concurrency: options.concurrency as usize }
}

/// §4.7 `Send`.
pub async fn send(
    upstream: &UpstreamManager,
    input: DispatchInput<'_>,
    core_config: &CoreConfig,
) -> Result<(Value, Vec<(String, String)>), ConnectorError> {
    match select_mode(&input.requests, input.http_options) {
        Mode::Single => {
            let request = input.requests.into_iter().next().expect("single mode always has one request");
            send_single(upstream, input.schema, input.result_type, &request, input.security, core_config).await
        }
        Mode::Sequence => send_sequence(upstream, &input, core_config).await,
        Mode::Parallel { concurrency } => send_parallel(upstream, &input, core_config, concurrency).await,
    }
}

async fn send_sequence(
    upstream: &UpstreamManager,
    input: &DispatchInput<'_>,
    core_config: &CoreConfig,
) -> Result<(Value, Vec<(String, String)>), ConnectorError> {
    let mut response = DistributedResponse::default();
    let mut first_headers = None;

    for request in &input.requests {
        let server = request.server_id.clone().unwrap_or_default();
        match send_single(upstream, input.schema, input.result_type, request, input.security, core_config).await {
            Ok((data, headers)) => {
                if first_headers.is_none() {
                    first_headers = Some(headers);
                }
                response.results.push(ServerResult { server, data });
            }
            Err(err) => response.errors.push(to_server_error(server, err)),
        }
    }

    Ok((distributed_response_to_value(&response), first_headers.unwrap_or_default()))
}

async fn send_parallel(
    upstream: &UpstreamManager,
    input: &DispatchInput<'_>,
    core_config: &CoreConfig,
    concurrency: usize,
) -> Result<(Value, Vec<(String, String)>), ConnectorError> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let first_headers: Arc<Mutex<Option<Vec<(String, String)>>>> = Arc::new(Mutex::new(None));

    let mut tasks = FuturesUnordered::new();
    for (index, request) in input.requests.iter().cloned().enumerate() {
        let semaphore = semaphore.clone();
        let first_headers = first_headers.clone();
        let schema = input.schema;
        let result_type = input.result_type;
        let security = input.security;
        tasks.push(async move {
            let _permit = semaphore.acquire().await.expect("semaphore is never closed");
            let server = request.server_id.clone().unwrap_or_default();
            let outcome = send_single(upstream, schema, result_type, &request, security, core_config).await;
            if let Ok((_, headers)) = &outcome {
                let mut slot = first_headers.lock().expect("first-headers mutex is never poisoned");
                if slot.is_none() {
                    *slot = Some(headers.clone());
                }
            }
            (index, server, outcome)
        });
    }

    let mut slots: Vec<Option<Result<ServerResult, ServerError>>> = std::iter::repeat_with(|| None).take(input.requests.len()).collect();
    while let Some((index, server, outcome)) = tasks.next().await {
        slots[index] = Some(match outcome {
            Ok((data, _)) => Ok(ServerResult { server, data }),
            Err(err) => Err(to_server_error(server, err)),
        });
    }

    let mut response = DistributedResponse::default();
    for slot in slots.into_iter().flatten() {
        match slot {
            Ok(result) => response.results.push(result),
            Err(err) => response.errors.push(err),
        }
    }

    let headers = first_headers.lock().expect("first-headers mutex is never poisoned").clone().unwrap_or_default();
    Ok((distributed_response_to_value(&response), headers))
}

fn to_server_error(server: String, err: ConnectorError) -> ServerError {
    let code = match &err {
        ConnectorError::Upstream { status, .. } => *status,
        _ => 0,
    };
    let details = err.details();
    ServerError { server, code, message: err.to_string(), details }
}

fn distributed_response_to_value(response: &DistributedResponse) -> Value {
    let results = response
        .results
        .iter()
        .map(|r| {
            let mut obj = std::collections::BTreeMap::new();
            obj.insert("server".to_string(), Value::String(r.server.clone()));
            obj.insert("data".to_string(), r.data.clone());
            Value::Object(obj)
        })
        .collect();
    let errors = response
        .errors
        .iter()
        .map(|e| {
            let mut obj = std::collections::BTreeMap::new();
            obj.insert("server".to_string(), Value::String(e.server.clone()));
            obj.insert("code".to_string(), Value::Int(e.code as i64));
            obj.insert("message".to_string(), Value::String(e.message.clone()));
            obj.insert("details".to_string(), e.details.clone().unwrap_or(Value::Null));
            Value::Object(obj)
        })
        .collect();
    let mut obj = std::collections::BTreeMap::new();
    obj.insert("results".to_string(), Value::Array(results));
    obj.insert("errors".to_string(), Value::Array(errors));
    Value::Object(obj)
}

/// `sendSingle` (§4.7): retry loop for one already-distributed request.
async fn send_single(
    upstream: &UpstreamManager,
    schema: &HttpSchema,
    result_type: &TypeRef,
    request: &RetryableRequest,
    security: &[AuthRequirement],
    core_config: &CoreConfig,
) -> Result<(Value, Vec<(String, String)>), ConnectorError> {
    let mut base_request = request.clone();
    compress_declared_body(&mut base_request)?;

    let times = base_request.runtime.retry.times;
    let mut final_response = None;
    for attempt in 0..=times {
        let mut attempt_request = base_request.clone();
        let response = upstream.execute_request(&mut attempt_request, security).await?;
        let status = response.status().as_u16();
        let is_success = (200..300).contains(&status);
        let retryable_status = base_request.runtime.retry.http_status.contains(&status);
        if is_success || !retryable_status || attempt == times {
            final_response = Some(response);
            break;
        }
        tracing::debug!(namespace = %request.namespace, server = ?request.server_id, status, attempt, "retrying request");
        tokio::time::sleep(base_request.runtime.retry.delay()).await;
    }

    let response = final_response.expect("loop always assigns a response or returns early on transport error");
    let status = response.status().as_u16();
    let headers = extract_headers(&response);
    let content_type = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        .map(|(_, v)| v.clone())
        .unwrap_or_default();
    let bytes = response.bytes().await.map_err(|e| ConnectorError::Transport(e.to_string()))?;

    if status >= 400 {
        let details = decode_body_arbitrary(&content_type, &bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()));
        return Err(ConnectorError::Upstream { status, details: Some(details) });
    }

    let mut value = decode_success_body(schema, result_type, status, &content_type, &bytes)?;
    if let Some(forwarding) = &core_config.response_header_forwarding {
        value = envelope_with_headers(forwarding, &headers, value);
    }
    Ok((value, headers))
}

/// wreq's client is built with the `gzip`/`deflate` features, which
/// transparently decompress response bodies — no manual `decompress` call
/// is needed on the read side (unlike the request side, which this crate
/// controls explicitly below).
fn extract_headers(response: &wreq::Response) -> Vec<(String, String)> {
    response
        .headers()
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect()
}

fn compress_declared_body(request: &mut RetryableRequest) -> Result<(), ConnectorError> {
    let Some(body) = &request.body else { return Ok(()) };
    let Some(declared) = request.header("Content-Encoding") else { return Ok(()) };
    let encoding = ContentEncoding::parse(declared);
    if matches!(encoding, ContentEncoding::Identity) {
        return Ok(());
    }
    let compressed = compression::compress(encoding, body)?;
    request.body = Some(bytes::Bytes::from(compressed));
    Ok(())
}

fn decode_success_body(schema: &HttpSchema, result_type: &TypeRef, status: u16, content_type: &str, bytes: &[u8]) -> Result<Value, ConnectorError> {
    if status == 204 {
        return Ok(Value::Bool(true));
    }
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    let base = base_content_type(content_type);

    if base == "application/x-ndjson" {
        let item_type = match result_type.underlying() {
            TypeRef::Array(inner) => inner.as_ref(),
            other => other,
        };
        let mut items = Vec::new();
        for line in bytes.split(|b| *b == b'\n') {
            let trimmed = trim_ascii_whitespace(line);
            if trimmed.is_empty() {
                continue;
            }
            items.push(decode_json(schema, item_type, trimmed)?);
        }
        return Ok(Value::Array(items));
    }

    if base == "application/json" || base.ends_with("+json") {
        if result_type.underlying().root_name() == Some("String") {
            return match serde_json::from_slice::<String>(bytes) {
                Ok(s) => Ok(Value::String(s)),
                Err(_) => Ok(Value::String(String::from_utf8_lossy(bytes).to_string())),
            };
        }
        return Ok(decode_json(schema, result_type, bytes)?);
    }

    if base == "application/xml" || base == "text/xml" {
        return Ok(decode_xml(schema, result_type, bytes)?);
    }

    if base.starts_with("text/") {
        return Ok(Value::String(String::from_utf8_lossy(bytes).to_string()));
    }

    if base.starts_with("application/") || base.starts_with("image/") || base.starts_with("video/") {
        return Ok(Value::Bytes(bytes.to_vec()));
    }

    Ok(Value::String(String::from_utf8_lossy(bytes).to_string()))
}

fn base_content_type(content_type: &str) -> String {
    content_type.split(';').next().unwrap_or(content_type).trim().to_ascii_lowercase()
}

fn trim_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !b.is_ascii_whitespace()).map(|i| i + 1).unwrap_or(start);
    &bytes[start..end]
}

fn envelope_with_headers(forwarding: &httpconn_common::ResponseHeaderForwarding, headers: &[(String, String)], value: Value) -> Value {
    let mut filtered = std::collections::BTreeMap::new();
    for name in &forwarding.allowlist {
        if let Some((_, v)) = headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            filtered.insert(name.clone(), Value::String(v.clone()));
        }
    }
    let mut obj = std::collections::BTreeMap::new();
    obj.insert(forwarding.headers_field.clone(), Value::Object(filtered));
    obj.insert(forwarding.result_field.clone(), value);
    Value::Object(obj)
}
