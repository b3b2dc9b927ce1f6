//! The intermediate request/response shapes the dispatcher owns for the
//! duration of one send cycle (§3 `RetryableRequest`/`DistributedResponse`).

use bytes::Bytes;
use httpconn_schema::{HttpMethod, RuntimeSettings, Value};

/// A request's URL, before or after the Upstream Manager's distribution
/// step (§4.5 `BuildDistributedRequestsWithOptions`).
///
/// The Request Builder emits `Relative` for every operation whose `url`
/// is a path template (the common case); `Absolute` only occurs for the
/// raw passthrough operation (§6 `sendHttpRequest`), which names no
/// namespace/server and skips distribution entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestUrl {
    Relative(String),
    Absolute(String),
}

impl RequestUrl {
    pub fn is_absolute(raw: &str) -> bool {
        raw.starts_with("http://") || raw.starts_with("https://")
    }

    pub fn as_str(&self) -> &str {
        match self {
            RequestUrl::Relative(s) | RequestUrl::Absolute(s) => s.as_str(),
        }
    }
}

/// One concrete, restartable HTTP request (§3). `body` is `Bytes` rather
/// than a stream: cloning is O(1) (a refcount bump), so the retry loop
/// re-sends the exact same bytes on every attempt without needing a seek
/// cursor of its own.
#[derive(Debug, Clone)]
pub struct RetryableRequest {
    pub method: HttpMethod,
    pub url: RequestUrl,
    /// Empty for the raw passthrough operation, which has no namespace.
    pub namespace: String,
    pub server_id: Option<String>,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
    pub runtime: RuntimeSettings,
}

impl RetryableRequest {
    pub fn content_length(&self) -> Option<usize> {
        self.body.as_ref().map(|b| b.len())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if let Some(existing) = self.headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            existing.1 = value.into();
        } else {
            self.headers.push((name, value.into()));
        }
    }
}

/// One server's contribution to a fan-out call (§3).
#[derive(Debug, Clone)]
pub struct ServerResult {
    pub server: String,
    pub data: Value,
}

#[derive(Debug, Clone)]
pub struct ServerError {
    pub server: String,
    pub code: u16,
    pub message: String,
    pub details: Option<Value>,
}

/// Output of a distributed (sequence or parallel) dispatch (§3). Order of
/// `results`/`errors` mirrors the order of the input server list.
#[derive(Debug, Clone, Default)]
pub struct DistributedResponse {
    pub results: Vec<ServerResult>,
    pub errors: Vec<ServerError>,
}

impl DistributedResponse {
    pub fn is_total_failure(&self) -> bool {
        self.results.is_empty() && !self.errors.is_empty()
    }
}
