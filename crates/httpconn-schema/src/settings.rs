use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::env_string::EnvString;
use crate::schema::AuthRequirement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApiKeyLocation {
    Header,
    Query,
    Cookie,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthFlow {
    pub token_url: EnvString,
    pub client_id: EnvString,
    pub client_secret: EnvString,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub endpoint_params: BTreeMap<String, String>,
}

/// Tagged union over the security-scheme kinds a connector may need to
/// authenticate with. `OAuth2` only carries flows here; only
/// `client_credentials` is implemented out of that map, everything else
/// degrades to a no-op plus a forwarding requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SecurityScheme {
    ApiKey {
        location: ApiKeyLocation,
        name: String,
        value: EnvString,
    },
    Basic {
        username: EnvString,
        password: EnvString,
        /// When true, render as an `Authorization: Basic` header rather
        /// than embedding userinfo in the URL.
        header: bool,
    },
    Http {
        scheme: String,
        header: Option<String>,
        value: EnvString,
    },
    OAuth2 {
        flows: BTreeMap<String, OAuthFlow>,
    },
    OpenIdConnect {
        url: String,
    },
    Cookie,
    MutualTls,
}

impl SecurityScheme {
    pub fn kind_name(&self) -> &'static str {
        match self {
            SecurityScheme::ApiKey { .. } => "apiKey",
            SecurityScheme::Basic { .. } => "basic",
            SecurityScheme::Http { .. } => "http",
            SecurityScheme::OAuth2 { .. } => "oauth2",
            SecurityScheme::OpenIdConnect { .. } => "openIdConnect",
            SecurityScheme::Cookie => "cookie",
            SecurityScheme::MutualTls => "mutualTLS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TlsVersion {
    #[serde(rename = "1.0")]
    V1_0,
    #[serde(rename = "1.1")]
    V1_1,
    #[serde(rename = "1.2")]
    V1_2,
    #[serde(rename = "1.3")]
    V1_3,
}

impl TlsVersion {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "1.0" => Some(TlsVersion::V1_0),
            "1.1" => Some(TlsVersion::V1_1),
            "1.2" => Some(TlsVersion::V1_2),
            "1.3" => Some(TlsVersion::V1_3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    pub cert_file: Option<String>,
    pub cert_pem: Option<String>,
    pub key_file: Option<String>,
    pub key_pem: Option<String>,
    pub ca_file: Option<String>,
    pub ca_pem: Option<String>,
    pub insecure_skip_verify: bool,
    pub include_system_ca_certs_pool: bool,
    pub server_name: Option<String>,
    pub min_version: Option<String>,
    pub max_version: Option<String>,
    pub cipher_suites: Vec<String>,
    pub reload_interval: Option<Duration>,
}

impl TlsConfig {
    /// No client cert/key and not skipping verification: the default
    /// transport already does everything this config would ask for.
    pub fn is_trivial(&self) -> bool {
        !self.insecure_skip_verify
            && self.cert_pem.is_none()
            && self.cert_file.is_none()
            && self.ca_pem.is_none()
            && self.ca_file.is_none()
            && self.server_name.is_none()
            && self.min_version.is_none()
            && self.max_version.is_none()
            && self.cipher_suites.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PresetValue {
    Literal(serde_json::Value),
    Env(String),
    ForwardHeader(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgumentPresetConfig {
    pub path: String,
    pub value: PresetValue,
    #[serde(default)]
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    pub id: String,
    pub url: EnvString,
    #[serde(default)]
    pub headers: BTreeMap<String, EnvString>,
    #[serde(default)]
    pub security_schemes: BTreeMap<String, SecurityScheme>,
    #[serde(default)]
    pub security: Vec<AuthRequirement>,
    pub tls: Option<TlsConfig>,
    #[serde(default)]
    pub argument_presets: Vec<ArgumentPresetConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub servers: Vec<ServerConfig>,
    #[serde(default)]
    pub headers: BTreeMap<String, EnvString>,
    #[serde(default)]
    pub security_schemes: BTreeMap<String, SecurityScheme>,
    #[serde(default)]
    pub security: Vec<AuthRequirement>,
    pub tls: Option<TlsConfig>,
    #[serde(default)]
    pub argument_presets: Vec<ArgumentPresetConfig>,
}
