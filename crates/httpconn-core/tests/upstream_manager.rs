//! Upstream Manager coverage against a real HTTP server (`wiremock`):
//! credential injection actually reaching the wire, header-merge
//! precedence, and multi-server distributed fan-out. The Request
//! Builder/Dispatch Engine side of the same scenarios is covered in
//! `httpconn-dispatch`'s `tests/end_to_end.rs`.

use std::collections::BTreeMap;

use bytes::Bytes;
use httpconn_core::upstream::{HttpOptions, UpstreamManager};
use httpconn_schema::{
    ApiKeyLocation, AuthRequirement, EnvString, HttpMethod, RuntimeSettings, SecurityScheme, ServerConfig, Settings,
};
use httpconn_core::request::{RequestUrl, RetryableRequest};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn draft(path: &str) -> RetryableRequest {
    RetryableRequest {
        method: HttpMethod::Get,
        url: RequestUrl::Relative(path.to_string()),
        namespace: "svc".to_string(),
        server_id: None,
        content_type: None,
        headers: vec![],
        body: None,
        runtime: RuntimeSettings::default(),
    }
}

#[tokio::test]
async fn api_key_header_credential_reaches_the_mock_server() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/widgets"))
        .and(header("X-Api-Key", "s3cr3t"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let mut security_schemes = BTreeMap::new();
    security_schemes.insert(
        "apiKeyAuth".to_string(),
        SecurityScheme::ApiKey {
            location: ApiKeyLocation::Header,
            name: "X-Api-Key".to_string(),
            value: EnvString::literal("s3cr3t"),
        },
    );

    let settings = Settings {
        servers: vec![ServerConfig {
            id: "primary".to_string(),
            url: EnvString::literal(mock_server.uri()),
            headers: BTreeMap::new(),
            security_schemes: BTreeMap::new(),
            security: vec![],
            tls: None,
            argument_presets: vec![],
        }],
        security_schemes,
        security: vec![AuthRequirement {
            scheme: "apiKeyAuth".to_string(),
            scopes: vec![],
        }],
        ..Settings::default()
    };

    let upstream = UpstreamManager::new(wreq::Client::new());
    let schema = httpconn_schema::HttpSchema {
        functions: BTreeMap::new(),
        procedures: BTreeMap::new(),
        object_types: BTreeMap::new(),
        scalar_types: BTreeMap::new(),
    };
    upstream.register("svc", &schema, &settings, true).await.unwrap();

    let http_options = HttpOptions::default();
    let mut requests = upstream
        .build_distributed_requests(draft("/widgets"), &http_options)
        .await
        .unwrap();
    assert_eq!(requests.len(), 1);

    let response = upstream.execute_request(&mut requests[0], &[]).await.unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn namespace_default_header_fills_in_behind_a_server_override() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .and(header("X-From-Server", "server-value"))
        .and(header("X-From-Namespace", "namespace-value"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let mut namespace_headers = BTreeMap::new();
    namespace_headers.insert("X-From-Server".to_string(), EnvString::literal("namespace-value"));
    namespace_headers.insert("X-From-Namespace".to_string(), EnvString::literal("namespace-value"));

    let mut server_headers = BTreeMap::new();
    server_headers.insert("X-From-Server".to_string(), EnvString::literal("server-value"));

    let settings = Settings {
        servers: vec![ServerConfig {
            id: "primary".to_string(),
            url: EnvString::literal(mock_server.uri()),
            headers: server_headers,
            security_schemes: BTreeMap::new(),
            security: vec![],
            tls: None,
            argument_presets: vec![],
        }],
        headers: namespace_headers,
        ..Settings::default()
    };

    let upstream = UpstreamManager::new(wreq::Client::new());
    let schema = httpconn_schema::HttpSchema {
        functions: BTreeMap::new(),
        procedures: BTreeMap::new(),
        object_types: BTreeMap::new(),
        scalar_types: BTreeMap::new(),
    };
    upstream.register("svc", &schema, &settings, true).await.unwrap();

    let http_options = HttpOptions::default();
    let mut requests = upstream
        .build_distributed_requests(draft("/ping"), &http_options)
        .await
        .unwrap();
    assert_eq!(requests.len(), 1);

    let response = upstream.execute_request(&mut requests[0], &[]).await.unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn a_request_header_already_set_beats_both_defaults() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .and(header("X-From-Server", "caller-value"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let mut server_headers = BTreeMap::new();
    server_headers.insert("X-From-Server".to_string(), EnvString::literal("server-value"));

    let settings = Settings {
        servers: vec![ServerConfig {
            id: "primary".to_string(),
            url: EnvString::literal(mock_server.uri()),
            headers: server_headers,
            security_schemes: BTreeMap::new(),
            security: vec![],
            tls: None,
            argument_presets: vec![],
        }],
        ..Settings::default()
    };

    let upstream = UpstreamManager::new(wreq::Client::new());
    let schema = httpconn_schema::HttpSchema {
        functions: BTreeMap::new(),
        procedures: BTreeMap::new(),
        object_types: BTreeMap::new(),
        scalar_types: BTreeMap::new(),
    };
    upstream.register("svc", &schema, &settings, true).await.unwrap();

    let http_options = HttpOptions::default();
    let mut caller_draft = draft("/ping");
    caller_draft.set_header("X-From-Server", "caller-value");
    let mut requests = upstream
        .build_distributed_requests(caller_draft, &http_options)
        .await
        .unwrap();
    assert_eq!(requests.len(), 1);

    let response = upstream.execute_request(&mut requests[0], &[]).await.unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn distributed_fan_out_grafts_every_server_in_the_namespace() {
    let server_a = MockServer::start().await;
    let server_b = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server_a)
        .await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server_b)
        .await;

    let settings = Settings {
        servers: vec![
            ServerConfig {
                id: "a".to_string(),
                url: EnvString::literal(server_a.uri()),
                headers: BTreeMap::new(),
                security_schemes: BTreeMap::new(),
                security: vec![],
                tls: None,
                argument_presets: vec![],
            },
            ServerConfig {
                id: "b".to_string(),
                url: EnvString::literal(server_b.uri()),
                headers: BTreeMap::new(),
                security_schemes: BTreeMap::new(),
                security: vec![],
                tls: None,
                argument_presets: vec![],
            },
        ],
        ..Settings::default()
    };

    let upstream = UpstreamManager::new(wreq::Client::new());
    let schema = httpconn_schema::HttpSchema {
        functions: BTreeMap::new(),
        procedures: BTreeMap::new(),
        object_types: BTreeMap::new(),
        scalar_types: BTreeMap::new(),
    };
    upstream.register("svc", &schema, &settings, true).await.unwrap();

    let http_options = HttpOptions {
        distributed: true,
        ..HttpOptions::default()
    };
    let mut requests = upstream
        .build_distributed_requests(draft("/ping"), &http_options)
        .await
        .unwrap();
    assert_eq!(requests.len(), 2);
    let mut server_ids: Vec<_> = requests.iter().filter_map(|r| r.server_id.clone()).collect();
    server_ids.sort();
    assert_eq!(server_ids, vec!["a".to_string(), "b".to_string()]);

    for req in requests.iter_mut() {
        let response = upstream.execute_request(req, &[]).await.unwrap();
        assert_eq!(response.status(), 200);
    }

    assert_eq!(server_a.received_requests().await.unwrap().len(), 1);
    assert_eq!(server_b.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn content_type_header_is_propagated_onto_the_wire() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .and(header("Content-Type", "application/json"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let settings = Settings {
        servers: vec![ServerConfig {
            id: "primary".to_string(),
            url: EnvString::literal(mock_server.uri()),
            headers: BTreeMap::new(),
            security_schemes: BTreeMap::new(),
            security: vec![],
            tls: None,
            argument_presets: vec![],
        }],
        ..Settings::default()
    };

    let upstream = UpstreamManager::new(wreq::Client::new());
    let schema = httpconn_schema::HttpSchema {
        functions: BTreeMap::new(),
        procedures: BTreeMap::new(),
        object_types: BTreeMap::new(),
        scalar_types: BTreeMap::new(),
    };
    upstream.register("svc", &schema, &settings, true).await.unwrap();

    let http_options = HttpOptions::default();
    let mut request_draft = draft("/ping");
    request_draft.content_type = Some("application/json".to_string());
    request_draft.body = Some(Bytes::from_static(b"{}"));
    let mut requests = upstream
        .build_distributed_requests(request_draft, &http_options)
        .await
        .unwrap();
    assert_eq!(requests.len(), 1);

    let response = upstream.execute_request(&mut requests[0], &[]).await.unwrap();
    assert_eq!(response.status(), 200);
}
