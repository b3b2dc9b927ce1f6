//! Connector-wide error type (§6, §7): every failure collapses to a
//! `{code, message, details}` shape so the facade can build the same
//! envelope regardless of where in the pipeline it occurred.

use std::fmt;

use httpconn_schema::Value;

#[derive(Debug, Clone)]
pub enum ConnectorError {
    /// An argument failed schema validation before a request was built.
    InvalidArgument { path: String, message: String },
    /// No server is registered for the operation's namespace.
    UnknownUpstream(String),
    /// The operation names a security scheme the settings never defined.
    UnknownSecurityScheme(String),
    /// A required credential field or secret could not be resolved, e.g.
    /// an [`httpconn_schema::EnvString`] with neither an env var nor a
    /// literal value set, or a missing OAuth2 token endpoint.
    CredentialUnavailable(String),
    /// Request or response body failed to encode or decode.
    Codec(String),
    /// The underlying HTTP transport failed: DNS, TLS, connect, timeout.
    Transport(String),
    /// The upstream responded with a non-2xx status. `details` carries
    /// whatever the response body decoded to, if anything.
    Upstream { status: u16, details: Option<Value> },
}

impl ConnectorError {
    pub fn code(&self) -> &'static str {
        match self {
            ConnectorError::InvalidArgument { .. } => "invalid_argument",
            ConnectorError::UnknownUpstream(_) => "unknown_upstream",
            ConnectorError::UnknownSecurityScheme(_) => "unknown_security_scheme",
            ConnectorError::CredentialUnavailable(_) => "credential_unavailable",
            ConnectorError::Codec(_) => "codec_error",
            ConnectorError::Transport(_) => "transport_error",
            ConnectorError::Upstream { .. } => "upstream_error",
        }
    }

    pub fn details(&self) -> Option<Value> {
        match self {
            ConnectorError::Upstream { details, .. } => details.clone(),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorError::InvalidArgument { path, message } => write!(f, "invalid argument at {path}: {message}"),
            ConnectorError::UnknownUpstream(ns) => write!(f, "no upstream registered for namespace {ns}"),
            ConnectorError::UnknownSecurityScheme(name) => write!(f, "unknown security scheme: {name}"),
            ConnectorError::CredentialUnavailable(msg) => write!(f, "credential unavailable: {msg}"),
            ConnectorError::Codec(msg) => write!(f, "{msg}"),
            ConnectorError::Transport(msg) => write!(f, "transport error: {msg}"),
            ConnectorError::Upstream { status, .. } => write!(f, "upstream responded with status {status}"),
        }
    }
}

impl std::error::Error for ConnectorError {}

impl From<httpconn_codec::CodecError> for ConnectorError {
    fn from(err: httpconn_codec::CodecError) -> Self {
        ConnectorError::Codec(err.to_string())
    }
}

pub type ConnectorResult<T> = Result<T, ConnectorError>;
