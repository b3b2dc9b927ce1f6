//! Credential abstraction, TLS client factory, argument preset engine,
//! and the Upstream Manager that ties them together (§4.2-§4.5).

pub mod credential;
pub mod error;
pub mod preset;
pub mod request;
pub mod tls;
pub mod upstream;

pub use credential::Credential;
pub use error::{ConnectorError, ConnectorResult};
pub use preset::PresetEngine;
pub use request::{DistributedResponse, RequestUrl, RetryableRequest, ServerError, ServerResult};
pub use tls::build_tls_client;
pub use upstream::{HttpOptions, UpstreamManager};
