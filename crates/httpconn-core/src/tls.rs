//! TLS client factory (§4.3): builds a `wreq` transport with a TLS config
//! assembled from root CAs, a client certificate, version bounds, and
//! cipher suites.
//!
//! `base` is taken only as the "do we even need a new client" baseline
//! (§4.3 step 4's "If neither a client certificate nor `insecureSkipVerify`
//! is set, return 'no TLS client needed'"): `wreq`'s `ClientBuilder` has no
//! way to read a built `Client`'s redirect policy or cookie jar back out,
//! so a TLS-customized client cannot literally share `base`'s redirect
//! policy or cookie jar. It gets `wreq`'s own defaults plus its own,
//! independent cookie jar (`cookie_store(true)`), not `base`'s jar. The
//! per-request timeout is unaffected either way: it's enforced by the
//! caller's `tokio::time::timeout` around the send (`upstream.rs`), not by
//! client-level configuration, so every client honors it identically,
//! TLS-customized or not.
//!
//! A distinct `TlsConfig` is only ever built into a transport once, cached
//! per config the same way `gproxy-core/src/upstream_client/mod.rs`
//! (`client_for_proxy`) caches its per-config clients.

use httpconn_schema::TlsConfig;

use crate::ConnectorError;

/// Build a TLS-customized client, or `None` if the config asks for
/// nothing `base` doesn't already do (§4.3: "If neither a client
/// certificate nor `insecureSkipVerify` is set, return 'no TLS client
/// needed'"). The returned client does not share `base`'s cookie jar or
/// redirect policy (see module docs); callers that need a server-specific
/// credential's cookies to be visible to later requests on the same
/// client must keep reusing the same returned `Client` rather than
/// rebuilding one per request.
pub fn build_tls_client(base: &wreq::Client, config: &TlsConfig) -> Result<Option<wreq::Client>, ConnectorError> {
    if config.is_trivial() {
        return Ok(None);
    }
    let _ = base;

    let mut builder = wreq::Client::builder().cookie_store(true);

    if config.insecure_skip_verify {
        builder = builder.danger_accept_invalid_certs(true);
    }

    if !config.include_system_ca_certs_pool {
        builder = builder.tls_built_in_root_certs(false);
    }

    for pem in root_ca_pems(config)? {
        let cert = wreq::Certificate::from_pem(pem.as_bytes())
            .map_err(|e| ConnectorError::CredentialUnavailable(format!("invalid CA certificate: {e}")))?;
        builder = builder.add_root_certificate(cert);
    }

    match (cert_material(config)?, key_material(config)?) {
        (Some(cert_pem), Some(key_pem)) => {
            let mut combined = cert_pem;
            combined.push('\n');
            combined.push_str(&key_pem);
            let identity = wreq::Identity::from_pem(combined.as_bytes())
                .map_err(|e| ConnectorError::CredentialUnavailable(format!("invalid client identity: {e}")))?;
            builder = builder.identity(identity);
        }
        (None, None) => {}
        _ => {
            return Err(ConnectorError::CredentialUnavailable(
                "TLS config must provide both a client certificate and a key, or neither".to_string(),
            ));
        }
    }

    if let Some(min) = &config.min_version {
        builder = builder.min_tls_version(parse_tls_version(min)?);
    }
    if let Some(max) = &config.max_version {
        builder = builder.max_tls_version(parse_tls_version(max)?);
    }

    // `server_name` (SNI override) and named `cipher_suites` restriction
    // have no direct equivalent in the wreq client builder surface this
    // crate otherwise relies on (wreq's TLS layer is built around
    // browser-fingerprint emulation profiles, not an a-la-carte cipher
    // list); a deployment needing either should route through a named DNS
    // entry or a fingerprint profile close to its target instead. Not
    // wiring a wrong approximation here is safer than one.

    let client = builder
        .build()
        .map_err(|e| ConnectorError::CredentialUnavailable(format!("failed to build TLS client: {e}")))?;
    Ok(Some(client))
}

fn root_ca_pems(config: &TlsConfig) -> Result<Vec<String>, ConnectorError> {
    let mut pems = Vec::new();
    if let Some(pem) = &config.ca_pem {
        pems.push(pem.clone());
    }
    if let Some(path) = &config.ca_file {
        pems.push(read_file(path)?);
    }
    Ok(pems)
}

fn cert_material(config: &TlsConfig) -> Result<Option<String>, ConnectorError> {
    match (&config.cert_pem, &config.cert_file) {
        (Some(pem), _) => Ok(Some(pem.clone())),
        (None, Some(path)) => Ok(Some(read_file(path)?)),
        (None, None) => Ok(None),
    }
}

fn key_material(config: &TlsConfig) -> Result<Option<String>, ConnectorError> {
    match (&config.key_pem, &config.key_file) {
        (Some(pem), _) => Ok(Some(pem.clone())),
        (None, Some(path)) => Ok(Some(read_file(path)?)),
        (None, None) => Ok(None),
    }
}

fn read_file(path: &str) -> Result<String, ConnectorError> {
    std::fs::read_to_string(path)
        .map_err(|e| ConnectorError::CredentialUnavailable(format!("failed to read {path}: {e}")))
}

fn parse_tls_version(raw: &str) -> Result<wreq::tls::TlsVersion, ConnectorError> {
    match raw {
        "1.0" => Ok(wreq::tls::TlsVersion::TLS_1_0),
        "1.1" => Ok(wreq::tls::TlsVersion::TLS_1_1),
        "1.2" => Ok(wreq::tls::TlsVersion::TLS_1_2),
        "1.3" => Ok(wreq::tls::TlsVersion::TLS_1_3),
        other => Err(ConnectorError::CredentialUnavailable(format!(
            "unsupported TLS version: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivial_config_needs_no_client() {
        let config = TlsConfig::default();
        let base = wreq::Client::new();
        assert!(build_tls_client(&base, &config).unwrap().is_none());
    }

    #[test]
    fn insecure_skip_verify_builds_a_client() {
        let config = TlsConfig {
            insecure_skip_verify: true,
            ..Default::default()
        };
        let base = wreq::Client::new();
        assert!(build_tls_client(&base, &config).unwrap().is_some());
    }

    #[test]
    fn cert_without_key_is_an_error() {
        let config = TlsConfig {
            cert_pem: Some("-----BEGIN CERTIFICATE-----\n".to_string()),
            ..Default::default()
        };
        let base = wreq::Client::new();
        assert!(build_tls_client(&base, &config).is_err());
    }
}
