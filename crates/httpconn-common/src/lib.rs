//! Ambient, connector-wide configuration — the handful of cross-cutting
//! knobs that sit outside the declarative [`httpconn_schema::HttpSchema`]
//! and [`httpconn_schema::Settings`]: how many requests a distributed
//! dispatch may run concurrently, which header names get redacted from
//! logs, and the envelope field names the facade wraps responses in.

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum CoreConfigError {
    #[error("missing required connector config field: {0}")]
    MissingField(&'static str),
    #[error("invalid mask pattern: {0}")]
    InvalidMaskPattern(String),
}

/// Final, merged configuration used by a running connector instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Upper bound on concurrently in-flight requests for a single
    /// bounded-parallel dispatch, unless an operation overrides it.
    pub max_parallel_requests: usize,
    /// Header and argument-field names matching this pattern are replaced
    /// with `***` before being written to any log line.
    pub mask_pattern: String,
    /// Response envelope field names the facade wraps a dispatched
    /// result in (status code, headers, decoded body).
    pub envelope: EnvelopeFieldNames,
    /// Name of the argument field holding forwarded caller headers, if
    /// the collaborator that generates operation schemas declares one
    /// (§4.6). `None` disables forwarded-header extraction entirely.
    pub forwarded_headers_argument: Option<String>,
    /// When `false`, a credential that requires header forwarding
    /// (cookie, non-client-credentials OAuth2) only gets a debug log at
    /// `Register` time instead of a warning, since the deployment isn't
    /// relying on it.
    pub header_forwarding_enabled: bool,
    /// Response-header forwarding envelope settings (§6). `None` means
    /// responses are returned unwrapped.
    pub response_header_forwarding: Option<ResponseHeaderForwarding>,
}

/// Config for the `{<headersField>: ..., <resultField>: value}` envelope
/// a successful dispatch is wrapped in when response-header forwarding is
/// enabled (§6, §4.7).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseHeaderForwarding {
    pub headers_field: String,
    pub result_field: String,
    /// Only headers named here are forwarded; empty means forward none
    /// (the envelope is still applied, with an empty headers map).
    pub allowlist: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeFieldNames {
    pub status: String,
    pub headers: String,
    pub body: String,
}

impl Default for EnvelopeFieldNames {
    fn default() -> Self {
        Self {
            status: "status".to_string(),
            headers: "headers".to_string(),
            body: "body".to_string(),
        }
    }
}

impl CoreConfig {
    pub fn mask_regex(&self) -> Result<Regex, CoreConfigError> {
        Regex::new(&self.mask_pattern).map_err(|e| CoreConfigError::InvalidMaskPattern(e.to_string()))
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_parallel_requests: 10,
            mask_pattern: "(?i)(authorization|api[_-]?key|secret|token|password|cookie)".to_string(),
            envelope: EnvelopeFieldNames::default(),
            forwarded_headers_argument: None,
            header_forwarding_enabled: true,
            response_header_forwarding: None,
        }
    }
}

/// Optional layer used for merging connector configuration from defaults,
/// settings-file values, and environment overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoreConfigPatch {
    pub max_parallel_requests: Option<usize>,
    pub mask_pattern: Option<String>,
    pub envelope_status_field: Option<String>,
    pub envelope_headers_field: Option<String>,
    pub envelope_body_field: Option<String>,
    pub forwarded_headers_argument: Option<String>,
    pub header_forwarding_enabled: Option<bool>,
    pub response_header_forwarding: Option<ResponseHeaderForwarding>,
}

impl CoreConfigPatch {
    pub fn overlay(&mut self, other: CoreConfigPatch) {
        if other.max_parallel_requests.is_some() {
            self.max_parallel_requests = other.max_parallel_requests;
        }
        if other.mask_pattern.is_some() {
            self.mask_pattern = other.mask_pattern;
        }
        if other.envelope_status_field.is_some() {
            self.envelope_status_field = other.envelope_status_field;
        }
        if other.envelope_headers_field.is_some() {
            self.envelope_headers_field = other.envelope_headers_field;
        }
        if other.envelope_body_field.is_some() {
            self.envelope_body_field = other.envelope_body_field;
        }
        if other.forwarded_headers_argument.is_some() {
            self.forwarded_headers_argument = other.forwarded_headers_argument;
        }
        if other.header_forwarding_enabled.is_some() {
            self.header_forwarding_enabled = other.header_forwarding_enabled;
        }
        if other.response_header_forwarding.is_some() {
            self.response_header_forwarding = other.response_header_forwarding;
        }
    }

    pub fn into_config(self) -> CoreConfig {
        let default = CoreConfig::default();
        CoreConfig {
            max_parallel_requests: self.max_parallel_requests.unwrap_or(default.max_parallel_requests),
            mask_pattern: self.mask_pattern.unwrap_or(default.mask_pattern),
            envelope: EnvelopeFieldNames {
                status: self.envelope_status_field.unwrap_or(default.envelope.status),
                headers: self.envelope_headers_field.unwrap_or(default.envelope.headers),
                body: self.envelope_body_field.unwrap_or(default.envelope.body),
            },
            forwarded_headers_argument: self
                .forwarded_headers_argument
                .or(default.forwarded_headers_argument),
            header_forwarding_enabled: self
                .header_forwarding_enabled
                .unwrap_or(default.header_forwarding_enabled),
            response_header_forwarding: self
                .response_header_forwarding
                .or(default.response_header_forwarding),
        }
    }
}

impl From<CoreConfig> for CoreConfigPatch {
    fn from(value: CoreConfig) -> Self {
        Self {
            max_parallel_requests: Some(value.max_parallel_requests),
            mask_pattern: Some(value.mask_pattern),
            envelope_status_field: Some(value.envelope.status),
            envelope_headers_field: Some(value.envelope.headers),
            envelope_body_field: Some(value.envelope.body),
            forwarded_headers_argument: value.forwarded_headers_argument,
            header_forwarding_enabled: Some(value.header_forwarding_enabled),
            response_header_forwarding: value.response_header_forwarding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_overlay_keeps_unset_fields() {
        let mut base = CoreConfigPatch {
            max_parallel_requests: Some(5),
            ..Default::default()
        };
        base.overlay(CoreConfigPatch {
            mask_pattern: Some("custom".to_string()),
            ..Default::default()
        });
        assert_eq!(base.max_parallel_requests, Some(5));
        assert_eq!(base.mask_pattern.as_deref(), Some("custom"));
    }

    #[test]
    fn default_mask_pattern_matches_authorization() {
        let config = CoreConfig::default();
        let re = config.mask_regex().unwrap();
        assert!(re.is_match("Authorization"));
        assert!(re.is_match("x-api-key"));
        assert!(!re.is_match("content-type"));
    }
}
