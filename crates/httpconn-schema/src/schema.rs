use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::env_string::EnvString;
use crate::scalar::ScalarType;
use crate::type_ref::TypeRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// Where a named parameter is placed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Body,
    FormData,
}

/// OpenAPI 3.1 `style` keyword for a parameter's serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamStyle {
    Form,
    SpaceDelimited,
    PipeDelimited,
    DeepObject,
    Simple,
    Matrix,
    Label,
}

impl Default for ParamStyle {
    fn default() -> Self {
        ParamStyle::Form
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamEncoding {
    pub style: ParamStyle,
    pub explode: Option<bool>,
    pub allow_reserved: bool,
    pub content_type: Option<String>,
    pub headers: Vec<RequestParameter>,
}

impl ParamEncoding {
    /// Explode defaults to `true` for `form` style, `false` otherwise, per
    /// OpenAPI 3.1 `style`/`explode` interaction.
    pub fn explode(&self) -> bool {
        self.explode
            .unwrap_or(matches!(self.style, ParamStyle::Form))
    }
}

/// XML serialization hints attached to an object type or a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct XmlHints {
    pub name: Option<String>,
    pub prefix: Option<String>,
    pub namespace: Option<String>,
    pub attribute: bool,
    pub text: bool,
    pub wrapped: bool,
}

/// HTTP-facing hints for a single field: its XML rendering plus, for array
/// fields, the hints to apply to each item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldHttpHints {
    pub xml: Option<XmlHints>,
    pub items: Option<Box<FieldHttpHints>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub field_type: TypeRef,
    pub http: Option<FieldHttpHints>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectType {
    pub fields: BTreeMap<String, FieldSpec>,
    pub xml: Option<XmlHints>,
}

/// Per-field wire encoding inside a structured request body (used by
/// multipart and, to a lesser degree, urlencoded bodies).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncodingRule {
    pub content_type: Vec<String>,
    pub headers: Vec<RequestParameter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    pub content_type: String,
    pub encoding: BTreeMap<String, EncodingRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestParameter {
    pub name: String,
    pub argument_name: String,
    pub location: ParamLocation,
    #[serde(default)]
    pub encoding: ParamEncoding,
    pub schema: FieldHttpHints,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentSpec {
    pub field: FieldSpec,
    pub http: Option<RequestParameter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthRequirement {
    pub scheme: String,
    pub scopes: Vec<String>,
}

impl AuthRequirement {
    /// An empty requirement set (no scheme named) means auth is optional.
    pub fn is_optional(reqs: &[AuthRequirement]) -> bool {
        reqs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub times: u32,
    pub delay_ms: u64,
    pub http_status: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            times: 0,
            delay_ms: 1000,
            http_status: vec![429, 500, 502, 503],
        }
    }
}

impl RetryPolicy {
    /// Retry delays below 100ms are clamped up to the floor.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms.max(100))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    pub timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl RuntimeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Merge operation-level overrides onto a connector-wide default:
    /// any field the operation did not set keeps the default's value.
    pub fn merge(default: &RuntimeSettings, override_: Option<&RuntimeSettings>) -> RuntimeSettings {
        match override_ {
            Some(o) => o.clone(),
            None => default.clone(),
        }
    }
}

/// An inline server override scoped to a single operation (rare; most
/// servers live in [`crate::settings::Settings`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineServer {
    pub id: String,
    pub url: EnvString,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    pub url: String,
    pub method: HttpMethod,
    pub headers: BTreeMap<String, EnvString>,
    pub security: Vec<AuthRequirement>,
    pub servers: Option<Vec<InlineServer>>,
    pub request_body: Option<RequestBody>,
    pub runtime: RuntimeSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationInfo {
    pub request: RequestSpec,
    pub arguments: BTreeMap<String, ArgumentSpec>,
    pub result_type: TypeRef,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpSchema {
    pub functions: BTreeMap<String, OperationInfo>,
    pub procedures: BTreeMap<String, OperationInfo>,
    pub object_types: BTreeMap<String, ObjectType>,
    pub scalar_types: BTreeMap<String, ScalarType>,
}

impl HttpSchema {
    pub fn operation(&self, name: &str) -> Option<&OperationInfo> {
        self.functions.get(name).or_else(|| self.procedures.get(name))
    }

    pub fn operation_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().chain(self.procedures.keys()).map(String::as_str)
    }

    pub fn object_type(&self, name: &str) -> Option<&ObjectType> {
        self.object_types.get(name)
    }

    pub fn scalar_type(&self, name: &str) -> Option<&ScalarType> {
        self.scalar_types.get(name)
    }
}
