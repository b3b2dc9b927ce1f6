//! External interface (§6): `Register`/`Invoke`, wiring the Request
//! Builder, Upstream Manager, and Dispatch Engine behind the two calls a
//! collaborator actually needs.

use std::collections::BTreeMap;
use std::time::Duration;

use httpconn_common::CoreConfig;
use httpconn_core::error::ConnectorError;
use httpconn_core::upstream::{HttpOptions, UpstreamManager};
use httpconn_schema::{HttpSchema, Settings, Value};

use crate::passthrough::{build_passthrough_request, send_passthrough};

const SEND_HTTP_REQUEST: &str = "sendHttpRequest";

/// Holds every registered namespace's schema (needed by `Invoke` to find
/// an operation and build its request) alongside the `UpstreamManager`
/// that owns the namespace's clients, credentials, and presets.
pub struct Connector {
    upstream: UpstreamManager,
    config: CoreConfig,
    schemas: tokio::sync::RwLock<BTreeMap<String, HttpSchema>>,
}

impl Connector {
    pub fn new(default_client: wreq::Client, config: CoreConfig) -> Self {
        Self {
            upstream: UpstreamManager::new(default_client),
            config,
            schemas: tokio::sync::RwLock::new(BTreeMap::new()),
        }
    }

    /// §6 `Register(ctx, namespace, schema, settings)`.
    pub async fn register(&self, namespace: &str, schema: HttpSchema, settings: &Settings) -> Result<(), ConnectorError> {
        self.upstream
            .register(namespace, &schema, settings, self.config.header_forwarding_enabled)
            .await?;
        self.schemas.write().await.insert(namespace.to_string(), schema);
        Ok(())
    }

    /// §6 `Invoke(ctx, operationName, arguments, forwardedHeaders, httpOptions)`.
    ///
    /// `operation_name` is `"<namespace>.<operation>"` except for the raw
    /// passthrough operation, which names no namespace. Each attempt is
    /// bounded by the operation's own per-request timeout already (the
    /// Dispatch Engine wraps every send in `tokio::time::timeout`); this
    /// call additionally bounds the whole invocation — including retries
    /// and fan-out — by an optional caller deadline, matching
    /// `gproxy-core/src/upstream_client`'s per-attempt `tokio::time::
    /// timeout` pattern rather than introducing a cancellation-token type
    /// absent from the stack.
    pub async fn invoke(
        &self,
        operation_name: &str,
        arguments: serde_json::Value,
        forwarded_headers: BTreeMap<String, String>,
        http_options: &HttpOptions,
        deadline: Option<Duration>,
    ) -> Result<(Value, Vec<(String, String)>), ConnectorError> {
        let work = self.invoke_inner(operation_name, arguments, forwarded_headers, http_options);
        match deadline {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(result) => result,
                Err(_) => Err(ConnectorError::Transport(format!("invocation timed out after {limit:?}"))),
            },
            None => work.await,
        }
    }

    async fn invoke_inner(
        &self,
        operation_name: &str,
        arguments: serde_json::Value,
        forwarded_headers: BTreeMap<String, String>,
        http_options: &HttpOptions,
    ) -> Result<(Value, Vec<(String, String)>), ConnectorError> {
        if operation_name == SEND_HTTP_REQUEST {
            let args = arguments.as_object().cloned().unwrap_or_default();
            let request = build_passthrough_request(&args, &forwarded_headers).await?;
            return send_passthrough(&self.upstream, request).await;
        }

        let (namespace, op_name) = operation_name
            .split_once('.')
            .ok_or_else(|| ConnectorError::InvalidArgument {
                path: "operationName".to_string(),
                message: format!("expected \"<namespace>.<operation>\", got {operation_name}"),
            })?;

        let schemas = self.schemas.read().await;
        let schema = schemas
            .get(namespace)
            .ok_or_else(|| ConnectorError::UnknownUpstream(namespace.to_string()))?;
        let operation = schema
            .operation(op_name)
            .ok_or_else(|| ConnectorError::InvalidArgument {
                path: "operationName".to_string(),
                message: format!("unknown operation: {operation_name}"),
            })?;

        let args_object = arguments.as_object().cloned().unwrap_or_default();
        let (extracted_headers, args_object) =
            httpconn_dispatch::extract_forwarded_headers(operation, self.config.forwarded_headers_argument.as_deref(), args_object);
        let mut headers = extracted_headers;
        for (k, v) in &forwarded_headers {
            headers.insert(k.clone(), v.clone());
        }

        let mut arguments = serde_json::Value::Object(args_object);
        self.upstream.apply_presets(namespace, op_name, &mut arguments, &headers).await?;
        let args_object = arguments.as_object().cloned().unwrap_or_default();

        let built = httpconn_dispatch::build_request(namespace, operation, schema, &args_object)?;
        let mut request = built.request;
        for (k, v) in &headers {
            request.set_header(k.clone(), v.clone());
        }

        let requests = self.upstream.build_distributed_requests(request, http_options).await?;
        let input = httpconn_dispatch::DispatchInput {
            requests,
            schema,
            result_type: &operation.result_type,
            security: &built.security,
            http_options,
        };
        httpconn_dispatch::send(&self.upstream, input, &self.config).await
    }
}
