//! End-to-end coverage of the external interface (§6): `Connector::
//! register` + `Connector::invoke` against a real HTTP server
//! (`wiremock`), and the raw `sendHttpRequest` passthrough's
//! forwarded-header precedence over `additionalHeaders`.

use std::collections::BTreeMap;
use std::time::Duration;

use httpconn_common::CoreConfig;
use httpconn_core::upstream::HttpOptions;
use httpconn_facade::Connector;
use httpconn_schema::{
    ArgumentSpec, EnvString, FieldHttpHints, FieldSpec, HttpMethod, HttpSchema, ObjectType,
    OperationInfo, ParamEncoding, ParamLocation, RequestParameter, RequestSpec, RuntimeSettings,
    ScalarRepresentation, ScalarType, ServerConfig, Settings, TypeRef,
};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn thing_schema() -> HttpSchema {
    let mut object_types = BTreeMap::new();
    let mut fields = BTreeMap::new();
    fields.insert("name".to_string(), FieldSpec { field_type: TypeRef::named("String"), http: None });
    object_types.insert("Thing".to_string(), ObjectType { fields, xml: None });

    let mut scalar_types = BTreeMap::new();
    scalar_types.insert("String".to_string(), ScalarType { representation: ScalarRepresentation::String });

    let mut arguments = BTreeMap::new();
    arguments.insert(
        "id".to_string(),
        ArgumentSpec {
            field: FieldSpec { field_type: TypeRef::named("String"), http: None },
            http: Some(RequestParameter {
                name: "id".to_string(),
                argument_name: "id".to_string(),
                location: ParamLocation::Path,
                encoding: ParamEncoding::default(),
                schema: FieldHttpHints::default(),
            }),
        },
    );

    let operation = OperationInfo {
        request: RequestSpec {
            url: "/things/{id}".to_string(),
            method: HttpMethod::Get,
            headers: BTreeMap::new(),
            security: vec![],
            servers: None,
            request_body: None,
            runtime: RuntimeSettings::default(),
        },
        arguments,
        result_type: TypeRef::named("Thing"),
    };

    let mut functions = BTreeMap::new();
    functions.insert("getThing".to_string(), operation);

    HttpSchema { functions, procedures: BTreeMap::new(), object_types, scalar_types }
}

fn settings_for(url: &str) -> Settings {
    Settings {
        servers: vec![ServerConfig {
            id: "primary".to_string(),
            url: EnvString::literal(url),
            headers: BTreeMap::new(),
            security_schemes: BTreeMap::new(),
            security: vec![],
            tls: None,
            argument_presets: vec![],
        }],
        ..Settings::default()
    }
}

#[tokio::test]
async fn register_then_invoke_round_trips_through_a_live_server() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/things/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"name": "widget"})))
        .mount(&mock_server)
        .await;

    let connector = Connector::new(wreq::Client::new(), CoreConfig::default());
    connector
        .register("svc", thing_schema(), &settings_for(&mock_server.uri()))
        .await
        .unwrap();

    let (value, _headers) = connector
        .invoke(
            "svc.getThing",
            serde_json::json!({"id": "7"}),
            BTreeMap::new(),
            &HttpOptions::default(),
            Some(Duration::from_secs(5)),
        )
        .await
        .unwrap();

    let object = value.as_object().expect("decoded body is an object");
    assert_eq!(object.get("name").and_then(|v| v.as_str()), Some("widget"));
}

#[tokio::test]
async fn unknown_operation_name_is_rejected_before_any_request_is_sent() {
    let connector = Connector::new(wreq::Client::new(), CoreConfig::default());
    connector
        .register("svc", thing_schema(), &settings_for("http://127.0.0.1:0"))
        .await
        .unwrap();

    let err = connector
        .invoke(
            "svc.doesNotExist",
            serde_json::json!({}),
            BTreeMap::new(),
            &HttpOptions::default(),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, httpconn_core::ConnectorError::InvalidArgument { .. }));
}

#[tokio::test]
async fn send_http_request_lets_forwarded_headers_win_over_additional_headers() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .and(header("x-request-id", "from-caller"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(&mock_server)
        .await;

    let connector = Connector::new(wreq::Client::new(), CoreConfig::default());

    let mut forwarded = BTreeMap::new();
    forwarded.insert("X-Request-Id".to_string(), "from-caller".to_string());

    let arguments = serde_json::json!({
        "url": format!("{}/webhook", mock_server.uri()),
        "method": "post",
        "additionalHeaders": {"x-request-id": "from-body"},
    });

    let (value, _headers) = connector
        .invoke("sendHttpRequest", arguments, forwarded, &HttpOptions::default(), None)
        .await
        .unwrap();

    let object = value.as_object().expect("decoded body is an object");
    assert_eq!(object.get("ok").and_then(|v| v.as_bool()), Some(true));

    let received = mock_server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].headers.get("x-request-id").unwrap(), "from-caller");
}
