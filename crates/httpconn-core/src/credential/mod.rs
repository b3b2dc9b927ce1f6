//! Credential abstraction: one variant per security-scheme kind,
//! dispatched through a closed enum and a small switch in the Upstream
//! Manager rather than a trait object per scheme.

pub mod mask;
pub mod oauth2;

use base64::Engine;
use httpconn_schema::{ApiKeyLocation, SecurityScheme};

use crate::ConnectorError;
use crate::request::RetryableRequest;

pub use oauth2::OAuth2Credential;

#[derive(Debug, Clone)]
pub struct ApiKeyCredential {
    pub location: ApiKeyLocation,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct BasicCredential {
    pub username: String,
    pub password: String,
    pub header: bool,
}

#[derive(Debug, Clone)]
pub struct HttpSchemeCredential {
    pub scheme: String,
    pub header: String,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct CookieCredential;

#[derive(Debug, Clone, Default)]
pub struct MutualTlsCredential;

#[derive(Debug, Clone, Default)]
pub struct NoOpCredential;

/// The closed sum type over every security-scheme kind (§4.2, §9).
#[derive(Clone)]
pub enum Credential {
    ApiKey(ApiKeyCredential),
    Basic(BasicCredential),
    Http(HttpSchemeCredential),
    OAuth2(OAuth2Credential),
    Cookie(CookieCredential),
    MutualTls(MutualTlsCredential),
    NoOp(NoOpCredential),
}

impl Credential {
    /// Build a credential from a declared security scheme (§4.5
    /// `Register` step 2). `base_client` is the namespace/server HTTP
    /// client this credential's requests should ride on absent an
    /// override (only OAuth2's token-fetch client differs).
    pub fn build(scheme: &SecurityScheme, base_client: wreq::Client) -> Result<Credential, ConnectorError> {
        match scheme {
            SecurityScheme::ApiKey { location, name, value } => {
                let value = value
                    .resolve()
                    .map_err(|e| ConnectorError::CredentialUnavailable(e.to_string()))?;
                Ok(Credential::ApiKey(ApiKeyCredential {
                    location: *location,
                    name: name.clone(),
                    value,
                }))
            }
            SecurityScheme::Basic { username, password, header } => {
                let username = username
                    .resolve()
                    .map_err(|e| ConnectorError::CredentialUnavailable(e.to_string()))?;
                let password = password
                    .resolve()
                    .map_err(|e| ConnectorError::CredentialUnavailable(e.to_string()))?;
                Ok(Credential::Basic(BasicCredential {
                    username,
                    password,
                    header: *header,
                }))
            }
            SecurityScheme::Http { scheme, header, value } => {
                let value = value
                    .resolve()
                    .map_err(|e| ConnectorError::CredentialUnavailable(e.to_string()))?;
                let normalized_scheme = if scheme.eq_ignore_ascii_case("bearer") {
                    "Bearer".to_string()
                } else {
                    scheme.clone()
                };
                Ok(Credential::Http(HttpSchemeCredential {
                    scheme: normalized_scheme,
                    header: header.clone().unwrap_or_else(|| "Authorization".to_string()),
                    value,
                }))
            }
            SecurityScheme::OAuth2 { flows } => match OAuth2Credential::from_flows(flows, base_client)? {
                Some(cred) => Ok(Credential::OAuth2(cred)),
                // Any flow other than clientCredentials (authorizationCode,
                // implicit, password) degrades to a no-op that still
                // signals the caller must forward Authorization (§9).
                None => Ok(Credential::NoOp(NoOpCredential)),
            },
            SecurityScheme::OpenIdConnect { .. } => Ok(Credential::NoOp(NoOpCredential)),
            SecurityScheme::Cookie => Ok(Credential::Cookie(CookieCredential)),
            SecurityScheme::MutualTls => Ok(Credential::MutualTls(MutualTlsCredential)),
        }
    }

    pub async fn inject(&self, req: &mut RetryableRequest) -> Result<bool, ConnectorError> {
        match self {
            Credential::ApiKey(cred) => inject_api_key(cred, req),
            Credential::Basic(cred) => inject_basic(cred, req),
            Credential::Http(cred) => {
                req.set_header(&cred.header, format!("{} {}", cred.scheme, cred.value));
                Ok(true)
            }
            Credential::OAuth2(cred) => cred.inject(req).await,
            Credential::Cookie(_) | Credential::MutualTls(_) | Credential::NoOp(_) => Ok(false),
        }
    }

    pub fn inject_mock(&self, req: &mut RetryableRequest) -> bool {
        match self {
            Credential::ApiKey(cred) => {
                let masked = mask::mask_secret(&cred.value);
                apply_api_key(req, cred.location, &cred.name, &masked);
                true
            }
            Credential::Basic(cred) => {
                if cred.header {
                    req.set_header("Authorization", format!("Basic {}", mask::mask_basic()));
                }
                true
            }
            Credential::Http(cred) => {
                req.set_header(&cred.header, format!("{} {}", cred.scheme, mask::mask_secret(&cred.value)));
                true
            }
            Credential::OAuth2(cred) => cred.inject_mock(req),
            Credential::Cookie(_) | Credential::MutualTls(_) | Credential::NoOp(_) => false,
        }
    }

    /// Whether this credential variant relies on the caller forwarding an
    /// `Authorization`/`Cookie` header rather than injecting one itself
    /// (§4.2, §9): cookie auth and any non-client-credentials OAuth2/
    /// OpenID Connect flow.
    pub fn requires_header_forwarding(&self) -> bool {
        matches!(self, Credential::Cookie(_) | Credential::NoOp(_))
    }

    pub fn mask(&self) -> String {
        match self {
            Credential::ApiKey(cred) => mask::mask_secret(&cred.value),
            Credential::Basic(_) => mask::mask_basic(),
            Credential::Http(cred) => format!("{} {}", cred.scheme, mask::mask_secret(&cred.value)),
            Credential::OAuth2(cred) => cred.mask(),
            Credential::Cookie(_) | Credential::MutualTls(_) | Credential::NoOp(_) => String::new(),
        }
    }

    /// The client that should send the request after this credential has
    /// been applied. Only OAuth2 has a hook here today (a no-op one); kept
    /// as a dispatch point for future variants (e.g. a dedicated mTLS
    /// transport) rather than special-cased in the Upstream Manager.
    pub fn client(&self, base: wreq::Client) -> wreq::Client {
        match self {
            Credential::OAuth2(cred) => cred.client(base),
            _ => base,
        }
    }
}

fn apply_api_key(req: &mut RetryableRequest, location: ApiKeyLocation, name: &str, value: &str) {
    match location {
        ApiKeyLocation::Header => req.set_header(name, value),
        ApiKeyLocation::Query => append_query_param(req, name, value),
        ApiKeyLocation::Cookie => append_cookie(req, name, value),
    }
}

fn inject_api_key(cred: &ApiKeyCredential, req: &mut RetryableRequest) -> Result<bool, ConnectorError> {
    apply_api_key(req, cred.location, &cred.name, &cred.value);
    Ok(true)
}

fn inject_basic(cred: &BasicCredential, req: &mut RetryableRequest) -> Result<bool, ConnectorError> {
    if cred.header {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", cred.username, cred.password));
        req.set_header("Authorization", format!("Basic {encoded}"));
        return Ok(true);
    }
    embed_userinfo(req, &cred.username, &cred.password)?;
    Ok(true)
}

fn embed_userinfo(req: &mut RetryableRequest, username: &str, password: &str) -> Result<(), ConnectorError> {
    let raw = req.url.as_str().to_string();
    let mut parsed = url::Url::parse(&raw).map_err(|e| ConnectorError::Codec(e.to_string()))?;
    parsed
        .set_username(username)
        .map_err(|_| ConnectorError::CredentialUnavailable("URL cannot carry userinfo".to_string()))?;
    parsed
        .set_password(Some(password))
        .map_err(|_| ConnectorError::CredentialUnavailable("URL cannot carry userinfo".to_string()))?;
    req.url = crate::request::RequestUrl::Absolute(parsed.to_string());
    Ok(())
}

fn append_query_param(req: &mut RetryableRequest, name: &str, value: &str) {
    let raw = req.url.as_str().to_string();
    if let Ok(mut parsed) = url::Url::parse(&raw) {
        parsed.query_pairs_mut().append_pair(name, value);
        req.url = crate::request::RequestUrl::Absolute(parsed.to_string());
    } else {
        let sep = if raw.contains('?') { '&' } else { '?' };
        let encoded_value = percent_encode_query(value);
        req.url = crate::request::RequestUrl::Relative(format!("{raw}{sep}{name}={encoded_value}"));
    }
}

fn percent_encode_query(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn append_cookie(req: &mut RetryableRequest, name: &str, value: &str) {
    let pair = format!("{name}={value}");
    match req.headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case("cookie")) {
        Some((_, existing)) => {
            existing.push_str("; ");
            existing.push_str(&pair);
        }
        None => req.headers.push(("Cookie".to_string(), pair)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpconn_schema::HttpMethod;
    use httpconn_schema::RuntimeSettings;

    fn req(url: &str) -> RetryableRequest {
        RetryableRequest {
            method: HttpMethod::Get,
            url: crate::request::RequestUrl::Absolute(url.to_string()),
            namespace: "ns".to_string(),
            server_id: Some("0".to_string()),
            content_type: None,
            headers: vec![],
            body: None,
            runtime: RuntimeSettings::default(),
        }
    }

    #[tokio::test]
    async fn api_key_header_injects() {
        let cred = Credential::ApiKey(ApiKeyCredential {
            location: ApiKeyLocation::Header,
            name: "X-Api-Key".to_string(),
            value: "secret-value".to_string(),
        });
        let mut request = req("https://api.example.com/v1/pets");
        assert!(cred.inject(&mut request).await.unwrap());
        assert_eq!(request.header("X-Api-Key"), Some("secret-value"));
    }

    #[tokio::test]
    async fn api_key_query_injects() {
        let cred = Credential::ApiKey(ApiKeyCredential {
            location: ApiKeyLocation::Query,
            name: "api_key".to_string(),
            value: "secret-value".to_string(),
        });
        let mut request = req("https://api.example.com/v1/pets");
        cred.inject(&mut request).await.unwrap();
        assert!(request.url.as_str().contains("api_key=secret-value"));
    }

    #[test]
    fn mock_never_leaks_secret() {
        let secret = "sk-ant-super-secret-value";
        let cred = Credential::ApiKey(ApiKeyCredential {
            location: ApiKeyLocation::Header,
            name: "X-Api-Key".to_string(),
            value: secret.to_string(),
        });
        let mut request = req("https://api.example.com/v1/pets");
        cred.inject_mock(&mut request);
        let header = request.header("X-Api-Key").unwrap();
        assert!(!header.contains(secret));
    }

    #[test]
    fn bearer_scheme_is_normalized() {
        let cred = Credential::build(
            &SecurityScheme::Http {
                scheme: "bearer".to_string(),
                header: None,
                value: httpconn_schema::EnvString::literal("tok"),
            },
            wreq::Client::new(),
        )
        .unwrap();
        match cred {
            Credential::Http(inner) => assert_eq!(inner.scheme, "Bearer"),
            _ => panic!("expected http credential"),
        }
    }
}
