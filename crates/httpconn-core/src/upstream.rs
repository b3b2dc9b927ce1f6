//! Upstream Manager (§4.5): per-namespace registration of servers,
//! credentials, and TLS-customized HTTP clients; server selection;
//! credential injection on a single `http.Request`.
//!
//! Grounded on `gproxy-core/src/upstream_client/mod.rs` (client
//! construction/caching per distinct config) and `gproxy-core/src/
//! auth.rs` (credential-selection shape, simplified from gproxy's
//! key/user lookup to this core's scheme-name lookup).

use std::collections::HashMap;
use std::sync::Arc;

use httpconn_schema::{AuthRequirement, HttpSchema, Settings};
use rand::Rng;
use tokio::sync::RwLock;

use crate::credential::Credential;
use crate::error::ConnectorError;
use crate::preset::PresetEngine;
use crate::request::{RequestUrl, RetryableRequest};
use crate::tls;

/// Caller-supplied fan-out controls (§4.6, §4.5), carried alongside an
/// operation invocation.
#[derive(Debug, Clone, Default)]
pub struct HttpOptions {
    /// Restrict distribution to these server IDs; empty means "every
    /// registered server".
    pub servers: Vec<String>,
    pub parallel: bool,
    pub distributed: bool,
    pub concurrency: u32,
}

struct ServerEntry {
    id: String,
    base_url: String,
    /// `None` means "use the namespace client" — the common case when a
    /// server declares no TLS override of its own.
    client: Option<wreq::Client>,
    headers: Vec<(String, String)>,
    credentials: HashMap<String, Credential>,
    presets: PresetEngine,
    security: Vec<AuthRequirement>,
}

struct UpstreamSetting {
    client: wreq::Client,
    headers: Vec<(String, String)>,
    credentials: HashMap<String, Credential>,
    presets: PresetEngine,
    security: Vec<AuthRequirement>,
    servers: Vec<ServerEntry>,
}

impl UpstreamSetting {
    fn server(&self, id: &str) -> Option<&ServerEntry> {
        self.servers.iter().find(|s| s.id == id)
    }
}

pub struct UpstreamManager {
    default_client: wreq::Client,
    upstreams: RwLock<HashMap<String, Arc<UpstreamSetting>>>,
}

impl UpstreamManager {
    pub fn new(default_client: wreq::Client) -> Self {
        Self {
            default_client,
            upstreams: RwLock::new(HashMap::new()),
        }
    }

    /// §4.5 `Register`. Configuration errors for an individual
    /// credential or server are logged and that piece is skipped rather
    /// than failing the whole call, so schema introspection can run in
    /// incomplete environments (§7).
    pub async fn register(
        &self,
        namespace: impl Into<String>,
        schema: &HttpSchema,
        settings: &Settings,
        header_forwarding_enabled: bool,
    ) -> Result<(), ConnectorError> {
        let namespace = namespace.into();

        let client = match &settings.tls {
            Some(tls_config) => tls::build_tls_client(&self.default_client, tls_config)?.unwrap_or_else(|| self.default_client.clone()),
            None => self.default_client.clone(),
        };

        let mut credentials = HashMap::new();
        for (name, scheme) in &settings.security_schemes {
            match Credential::build(scheme, client.clone()) {
                Ok(cred) => {
                    if cred.requires_header_forwarding() && !header_forwarding_enabled {
                        tracing::warn!(namespace = %namespace, scheme = %name, "security scheme requires header forwarding but forwarding is disabled");
                    }
                    credentials.insert(name.clone(), cred);
                }
                Err(err) => {
                    tracing::warn!(namespace = %namespace, scheme = %name, error = %err, "skipping security scheme that failed to construct");
                }
            }
        }

        let presets = PresetEngine::compile(&settings.argument_presets, schema)?;

        let headers = resolve_headers(&settings.headers);

        let mut servers = Vec::new();
        for (index, server_config) in settings.servers.iter().enumerate() {
            let base_url = match server_config.url.resolve() {
                Ok(url) => url,
                Err(err) => {
                    tracing::warn!(namespace = %namespace, server = %server_config.id, error = %err, "skipping server with unresolvable URL");
                    continue;
                }
            };

            let server_client = match &server_config.tls {
                Some(tls_config) => tls::build_tls_client(&client, tls_config)?,
                None => None,
            };

            let mut server_credentials = HashMap::new();
            for (name, scheme) in &server_config.security_schemes {
                let base_for_scheme = server_client.clone().unwrap_or_else(|| client.clone());
                match Credential::build(scheme, base_for_scheme) {
                    Ok(cred) => {
                        if cred.requires_header_forwarding() && !header_forwarding_enabled {
                            tracing::warn!(namespace = %namespace, server = %server_config.id, scheme = %name, "security scheme requires header forwarding but forwarding is disabled");
                        }
                        server_credentials.insert(name.clone(), cred);
                    }
                    Err(err) => {
                        tracing::warn!(namespace = %namespace, server = %server_config.id, scheme = %name, error = %err, "skipping security scheme that failed to construct");
                    }
                }
            }

            let server_presets = PresetEngine::compile(&server_config.argument_presets, schema)?;
            let id = if server_config.id.is_empty() {
                index.to_string()
            } else {
                server_config.id.clone()
            };

            servers.push(ServerEntry {
                id,
                base_url,
                client: server_client,
                headers: resolve_headers(&server_config.headers),
                credentials: server_credentials,
                presets: server_presets,
                security: server_config.security.clone(),
            });
        }

        let setting = Arc::new(UpstreamSetting {
            client,
            headers,
            credentials,
            presets,
            security: settings.security.clone(),
            servers,
        });

        self.upstreams.write().await.insert(namespace, setting);
        Ok(())
    }

    /// Apply namespace-level argument presets (§4.4) ahead of request
    /// building. Server-level presets are a finer-grained extension this
    /// core does not reach for: which server handles a call is only
    /// decided during distribution, after arguments are already
    /// materialized into a wire request.
    pub async fn apply_presets(
        &self,
        namespace: &str,
        operation_name: &str,
        arguments: &mut serde_json::Value,
        headers: &std::collections::BTreeMap<String, String>,
    ) -> Result<(), ConnectorError> {
        let upstreams = self.upstreams.read().await;
        let Some(setting) = upstreams.get(namespace) else {
            return Ok(());
        };
        setting.presets.apply(operation_name, arguments, headers)
    }

    /// §4.5 `BuildDistributedRequestsWithOptions`.
    pub async fn build_distributed_requests(
        &self,
        draft: RetryableRequest,
        options: &HttpOptions,
    ) -> Result<Vec<RetryableRequest>, ConnectorError> {
        if RequestUrl::is_absolute(draft.url.as_str()) {
            return Ok(vec![draft]);
        }

        let upstreams = self.upstreams.read().await;
        let setting = upstreams
            .get(&draft.namespace)
            .ok_or_else(|| ConnectorError::UnknownUpstream(draft.namespace.clone()))?
            .clone();
        drop(upstreams);

        let candidates: Vec<&ServerEntry> = if options.servers.is_empty() {
            setting.servers.iter().collect()
        } else {
            setting
                .servers
                .iter()
                .filter(|s| options.servers.contains(&s.id))
                .collect()
        };

        if candidates.is_empty() {
            return Err(ConnectorError::UnknownUpstream(format!(
                "namespace {} has no servers matching the requested selection",
                draft.namespace
            )));
        }

        if candidates.len() == 1 || !options.distributed {
            let server = select_server(&candidates);
            let grafted = graft_request(draft, server)?;
            return Ok(vec![grafted]);
        }

        let mut out = Vec::with_capacity(candidates.len());
        for server in candidates {
            out.push(graft_request(draft.clone(), server)?);
        }
        Ok(out)
    }

    /// §4.5 `ExecuteRequest`: choose a client, merge default headers,
    /// apply auth, send. The caller (dispatch engine) owns retry/decode.
    pub async fn execute_request(
        &self,
        req: &mut RetryableRequest,
        operation_security: &[AuthRequirement],
    ) -> Result<wreq::Response, ConnectorError> {
        let upstreams = self.upstreams.read().await;
        let setting = upstreams.get(&req.namespace).cloned();
        drop(upstreams);

        let Some(setting) = setting else {
            return self.send_without_upstream(req).await;
        };

        let server = req.server_id.as_deref().and_then(|id| setting.server(id));

        let mut client = server
            .and_then(|s| s.client.clone())
            .unwrap_or_else(|| setting.client.clone());

        // §4.5 step 3 orders this namespace defaults -> server defaults ->
        // existing request headers, later wins if non-empty. `merge_default_headers`
        // only fills a header the request doesn't already carry a non-empty
        // value for, so the more specific layer must run first to get
        // first claim on an empty slot, with the least specific layer
        // (namespace) only mopping up what's still unset.
        if let Some(server) = server {
            merge_default_headers(req, &server.headers);
        }
        merge_default_headers(req, &setting.headers);

        let requirements: &[AuthRequirement] = if !operation_security.is_empty() {
            operation_security
        } else {
            &setting.security
        };

        if !AuthRequirement::is_optional(requirements) {
            'reqs: for requirement in requirements {
                if let Some(server) = server
                    && let Some(cred) = server.credentials.get(&requirement.scheme)
                {
                    match cred.inject(req).await {
                        Ok(true) => {
                            client = cred.client(client);
                            break 'reqs;
                        }
                        Ok(false) => {}
                        Err(err) => tracing::warn!(error = %err, scheme = %requirement.scheme, "credential injection failed, trying next"),
                    }
                }
                if let Some(cred) = setting.credentials.get(&requirement.scheme) {
                    match cred.inject(req).await {
                        Ok(true) => {
                            client = cred.client(client);
                            break 'reqs;
                        }
                        Ok(false) => {}
                        Err(err) => tracing::warn!(error = %err, scheme = %requirement.scheme, "credential injection failed, trying next"),
                    }
                }
            }
        }

        send(&client, req).await
    }

    async fn send_without_upstream(&self, req: &mut RetryableRequest) -> Result<wreq::Response, ConnectorError> {
        send(&self.default_client, req).await
    }
}

async fn send(client: &wreq::Client, req: &RetryableRequest) -> Result<wreq::Response, ConnectorError> {
    let method = http_method(req.method);
    let mut builder = client.request(method, req.url.as_str());
    if let Some(content_type) = &req.content_type
        && req.header("content-type").is_none()
    {
        builder = builder.header("Content-Type", content_type);
    }
    for (k, v) in &req.headers {
        builder = builder.header(k, v);
    }
    if let Some(body) = &req.body {
        builder = builder.body(body.clone());
    }

    let timeout = req.runtime.timeout();
    match tokio::time::timeout(timeout, builder.send()).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(err)) => Err(ConnectorError::Transport(err.to_string())),
        Err(_) => Err(ConnectorError::Transport(format!("request timed out after {timeout:?}"))),
    }
}

fn http_method(method: httpconn_schema::HttpMethod) -> wreq::Method {
    use httpconn_schema::HttpMethod;
    match method {
        HttpMethod::Get => wreq::Method::GET,
        HttpMethod::Post => wreq::Method::POST,
        HttpMethod::Put => wreq::Method::PUT,
        HttpMethod::Patch => wreq::Method::PATCH,
        HttpMethod::Delete => wreq::Method::DELETE,
    }
}

fn resolve_headers(headers: &std::collections::BTreeMap<String, httpconn_schema::EnvString>) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(k, v)| match v.resolve() {
            Ok(value) => Some((k.clone(), value)),
            Err(err) => {
                tracing::warn!(header = %k, error = %err, "skipping header with unresolvable value");
                None
            }
        })
        .collect()
}

/// Merge default headers under the request's own: "later values win only
/// if non-empty" (§4.5 step 3) — i.e. a default only fills a header the
/// request doesn't already carry a non-empty value for.
fn merge_default_headers(req: &mut RetryableRequest, defaults: &[(String, String)]) {
    for (k, v) in defaults {
        let has_value = req.header(k).is_some_and(|existing| !existing.is_empty());
        if !has_value {
            req.set_header(k.clone(), v.clone());
        }
    }
}

/// Uniform random choice over `0..len`, inclusive of the last candidate.
fn select_server<'a>(candidates: &[&'a ServerEntry]) -> &'a ServerEntry {
    if candidates.len() == 1 {
        return candidates[0];
    }
    let index = rand::rng().random_range(0..candidates.len());
    candidates[index]
}

fn graft_request(draft: RetryableRequest, server: &ServerEntry) -> Result<RetryableRequest, ConnectorError> {
    let relative = draft.url.as_str();
    let grafted_url = graft_url(&server.base_url, relative)?;
    Ok(RetryableRequest {
        url: RequestUrl::Absolute(grafted_url),
        server_id: Some(server.id.clone()),
        ..draft
    })
}

fn graft_url(base_url: &str, relative: &str) -> Result<String, ConnectorError> {
    let mut base = url::Url::parse(base_url).map_err(|e| ConnectorError::Codec(format!("invalid server URL {base_url}: {e}")))?;
    let (path_part, query_part) = match relative.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (relative, None),
    };
    let joined = join_paths(base.path(), path_part);
    base.set_path(&joined);
    base.set_query(query_part);
    Ok(base.to_string())
}

fn join_paths(base: &str, rel: &str) -> String {
    let base_trimmed = base.trim_end_matches('/');
    let rel_trimmed = rel.trim_start_matches('/');
    if rel_trimmed.is_empty() {
        base_trimmed.to_string()
    } else if base_trimmed.is_empty() {
        format!("/{rel_trimmed}")
    } else {
        format!("{base_trimmed}/{rel_trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_paths_without_double_slash() {
        assert_eq!(join_paths("/v1", "/pets"), "/v1/pets");
        assert_eq!(join_paths("/v1/", "/pets"), "/v1/pets");
        assert_eq!(join_paths("", "/pets"), "/pets");
    }

    #[test]
    fn grafts_query_string_onto_base() {
        let grafted = graft_url("https://api.example.com/v1", "/pets?status=available").unwrap();
        assert_eq!(grafted, "https://api.example.com/v1/pets?status=available");
    }
}
