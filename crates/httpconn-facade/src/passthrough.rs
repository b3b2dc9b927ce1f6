//! Raw passthrough operation (§6 `sendHttpRequest`): a one-shot request
//! against an absolute URL, with no namespace, schema, or server lookup.
//! Bypasses the Request Builder/Upstream Manager entirely since there is
//! no declared operation shape to build from.

use bytes::Bytes;
use httpconn_codec::body::decode_body_arbitrary;
use httpconn_codec::compression::{self, ContentEncoding};
use httpconn_core::error::ConnectorError;
use httpconn_core::request::{RequestUrl, RetryableRequest};
use httpconn_schema::{HttpMethod, RetryPolicy, RuntimeSettings, Value};

fn parse_method(raw: &str) -> Result<HttpMethod, ConnectorError> {
    match raw.to_ascii_lowercase().as_str() {
        "get" => Ok(HttpMethod::Get),
        "post" => Ok(HttpMethod::Post),
        "put" => Ok(HttpMethod::Put),
        "patch" => Ok(HttpMethod::Patch),
        "delete" => Ok(HttpMethod::Delete),
        other => Err(ConnectorError::InvalidArgument {
            path: "method".to_string(),
            message: format!("unsupported method: {other}"),
        }),
    }
}

fn parse_retry(arguments: &serde_json::Map<String, serde_json::Value>) -> RetryPolicy {
    let Some(raw) = arguments.get("retry").and_then(|v| v.as_object()) else {
        return RetryPolicy::default();
    };
    let default = RetryPolicy::default();
    RetryPolicy {
        times: raw.get("times").and_then(|v| v.as_u64()).map(|v| v as u32).unwrap_or(default.times),
        delay_ms: raw.get("delayMs").and_then(|v| v.as_u64()).unwrap_or(default.delay_ms),
        http_status: raw
            .get("httpStatus")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|s| s.as_u64()).map(|s| s as u16).collect())
            .unwrap_or(default.http_status),
    }
}

fn build_runtime(arguments: &serde_json::Map<String, serde_json::Value>) -> Result<RuntimeSettings, ConnectorError> {
    let default = RuntimeSettings::default();
    let timeout_ms = match arguments.get("timeout").and_then(|v| v.as_i64()) {
        Some(seconds) if seconds >= 0 => (seconds as u64) * 1000,
        Some(_) => {
            return Err(ConnectorError::InvalidArgument {
                path: "timeout".to_string(),
                message: "timeout must be >= 0".to_string(),
            })
        }
        None => default.timeout_ms,
    };
    Ok(RuntimeSettings { timeout_ms, retry: parse_retry(arguments) })
}

/// `sendHttpRequest` (§6): `{ url, method, additionalHeaders?, body?,
/// timeout?, retry? }`. Caller-forwarded headers have already been pulled
/// out by [`crate::connector::Connector::invoke`] and are passed in
/// separately so they win over `additionalHeaders` the same way a
/// declared operation's forwarded headers would.
pub async fn build_passthrough_request(
    arguments: &serde_json::Map<String, serde_json::Value>,
    forwarded_headers: &std::collections::BTreeMap<String, String>,
) -> Result<RetryableRequest, ConnectorError> {
    let url = arguments
        .get("url")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ConnectorError::InvalidArgument { path: "url".to_string(), message: "url is required".to_string() })?;
    if !RequestUrl::is_absolute(url) {
        return Err(ConnectorError::InvalidArgument {
            path: "url".to_string(),
            message: "sendHttpRequest requires an absolute URL".to_string(),
        });
    }
    let method_raw = arguments
        .get("method")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ConnectorError::InvalidArgument { path: "method".to_string(), message: "method is required".to_string() })?;
    let method = parse_method(method_raw)?;

    let mut headers: Vec<(String, String)> = arguments
        .get("additionalHeaders")
        .and_then(|v| v.as_object())
        .map(|obj| obj.iter().filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))).collect())
        .unwrap_or_default();
    for (k, v) in forwarded_headers {
        if let Some(existing) = headers.iter_mut().find(|(name, _)| name.eq_ignore_ascii_case(k)) {
            existing.1 = v.clone();
        } else {
            headers.push((k.clone(), v.clone()));
        }
    }

    let (body, content_type) = match arguments.get("body") {
        None | Some(serde_json::Value::Null) => (None, None),
        Some(json) => {
            let value = Value::from_json(json);
            (Some(Bytes::from(value.stringify().into_bytes())), Some("application/json".to_string()))
        }
    };

    let runtime = build_runtime(arguments)?;

    Ok(RetryableRequest {
        method,
        url: RequestUrl::Absolute(url.to_string()),
        namespace: String::new(),
        server_id: None,
        content_type,
        headers,
        body,
        runtime,
    })
}

/// Send a passthrough request directly, bypassing the dispatch engine's
/// schema-aware decoding (there is no declared result type): a bare retry
/// loop plus content-type-sniffed decoding via `decode_body_arbitrary`.
pub async fn send_passthrough(
    upstream: &httpconn_core::upstream::UpstreamManager,
    mut request: RetryableRequest,
) -> Result<(Value, Vec<(String, String)>), ConnectorError> {
    compress_declared_body(&mut request)?;

    let times = request.runtime.retry.times;
    let mut final_response = None;
    for attempt in 0..=times {
        let mut attempt_request = request.clone();
        let response = upstream.execute_request(&mut attempt_request, &[]).await?;
        let status = response.status().as_u16();
        let is_success = (200..300).contains(&status);
        let retryable_status = request.runtime.retry.http_status.contains(&status);
        if is_success || !retryable_status || attempt == times {
            final_response = Some(response);
            break;
        }
        tracing::debug!(status, attempt, "retrying passthrough request");
        tokio::time::sleep(request.runtime.retry.delay()).await;
    }

    let response = final_response.expect("loop always assigns a response or returns early on transport error");
    let status = response.status().as_u16();
    let headers: Vec<(String, String)> = response
        .headers()
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect();
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

    if status == 204 || bytes.is_empty() {
        return Ok((Value::Bool(true), headers));
    }
    let value = decode_body_arbitrary(&content_type, &bytes)?;
    Ok((value, headers))
}

fn compress_declared_body(request: &mut RetryableRequest) -> Result<(), ConnectorError> {
    let Some(body) = &request.body else { return Ok(()) };
    let Some(declared) = request.header("Content-Encoding") else { return Ok(()) };
    let encoding = ContentEncoding::parse(declared);
    if matches!(encoding, ContentEncoding::Identity) {
        return Ok(());
    }
    let compressed = compression::compress(encoding, body)?;
    request.body = Some(Bytes::from(compressed));
    Ok(())
}
