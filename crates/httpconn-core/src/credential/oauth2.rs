//! OAuth2 client-credentials flow: the only OAuth2 flow this core
//! implements end to end. Every other flow in `settings.securitySchemes`
//! degrades to [`super::NoOpCredential`] plus `requires_header_forwarding`.
//!
//! Token caching follows the same shape as `gproxy-provider-impl/src/
//! provider/geminicli/refresh.rs`'s OAuth refresh cache: one cached token
//! behind a `tokio::sync::RwLock`, refreshed lazily and shared across
//! concurrent callers.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use httpconn_schema::OAuthFlow;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::ConnectorError;
use crate::request::RetryableRequest;

use super::mask::mask_secret;

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    /// `None` means the token endpoint didn't report an expiry; treat it
    /// as valid until a 401 forces a refresh (not modeled here — the
    /// dispatcher doesn't retry on 401 by default per §4.7's retry list).
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() + Duration::from_secs(30) < at,
            None => true,
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct Inner {
    token_url: String,
    client_id: String,
    client_secret: String,
    scopes: Vec<String>,
    endpoint_params: BTreeMap<String, String>,
    base_client: wreq::Client,
    cached: RwLock<Option<CachedToken>>,
}

#[derive(Clone)]
pub struct OAuth2Credential {
    inner: Arc<Inner>,
}

impl OAuth2Credential {
    pub fn from_flows(
        flows: &BTreeMap<String, OAuthFlow>,
        base_client: wreq::Client,
    ) -> Result<Option<Self>, ConnectorError> {
        let Some(flow) = flows.get("clientCredentials") else {
            return Ok(None);
        };
        let token_url = flow
            .token_url
            .resolve()
            .map_err(|e| ConnectorError::CredentialUnavailable(e.to_string()))?;
        let client_id = flow
            .client_id
            .resolve()
            .map_err(|e| ConnectorError::CredentialUnavailable(e.to_string()))?;
        let client_secret = flow
            .client_secret
            .resolve()
            .map_err(|e| ConnectorError::CredentialUnavailable(e.to_string()))?;
        Ok(Some(Self {
            inner: Arc::new(Inner {
                token_url,
                client_id,
                client_secret,
                scopes: flow.scopes.clone(),
                endpoint_params: flow.endpoint_params.clone(),
                base_client,
                cached: RwLock::new(None),
            }),
        }))
    }

    pub async fn inject(&self, req: &mut RetryableRequest) -> Result<bool, ConnectorError> {
        let token = self.ensure_token().await?;
        req.set_header("Authorization", format!("Bearer {token}"));
        Ok(true)
    }

    pub fn inject_mock(&self, req: &mut RetryableRequest) -> bool {
        req.set_header("Authorization", format!("Bearer {}", mask_secret(&self.inner.client_secret)));
        true
    }

    /// The client that should send requests once this credential has
    /// been applied. OAuth2 client-credentials doesn't need a
    /// per-credential transport (unlike mTLS); the caller's base/server
    /// client already works once the header is set.
    pub fn client(&self, base: wreq::Client) -> wreq::Client {
        base
    }

    pub fn mask(&self) -> String {
        format!("Bearer {}", mask_secret(&self.inner.client_secret))
    }

    async fn ensure_token(&self) -> Result<String, ConnectorError> {
        if let Some(cached) = self.inner.cached.read().await.as_ref()
            && cached.is_fresh()
        {
            return Ok(cached.access_token.clone());
        }
        let mut guard = self.inner.cached.write().await;
        if let Some(cached) = guard.as_ref()
            && cached.is_fresh()
        {
            return Ok(cached.access_token.clone());
        }
        let fetched = self.fetch_token().await?;
        let access_token = fetched.access_token.clone();
        *guard = Some(fetched);
        Ok(access_token)
    }

    async fn fetch_token(&self) -> Result<CachedToken, ConnectorError> {
        let mut form: Vec<(String, String)> = vec![
            ("grant_type".to_string(), "client_credentials".to_string()),
            ("client_id".to_string(), self.inner.client_id.clone()),
            ("client_secret".to_string(), self.inner.client_secret.clone()),
        ];
        if !self.inner.scopes.is_empty() {
            form.push(("scope".to_string(), self.inner.scopes.join(" ")));
        }
        for (k, v) in &self.inner.endpoint_params {
            form.push((k.clone(), v.clone()));
        }

        let response = self
            .inner
            .base_client
            .post(&self.inner.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| ConnectorError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::CredentialUnavailable(format!(
                "oauth2 client_credentials token request failed: {status}: {body}"
            )));
        }
        let payload: TokenResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::CredentialUnavailable(format!("invalid token response: {e}")))?;
        let expires_at = payload
            .expires_in
            .map(|secs| Instant::now() + Duration::from_secs(secs));
        Ok(CachedToken {
            access_token: payload.access_token,
            expires_at,
        })
    }
}
