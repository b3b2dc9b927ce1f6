use httpconn_codec::parse_data_uri;

#[test]
fn bare_base64_defaults_to_octet_stream() {
    let parsed = parse_data_uri("aGVsbG8gd29ybGQ=").unwrap();
    assert_eq!(parsed.media_type, "application/octet-stream");
    assert_eq!(parsed.data, b"hello world");
    assert!(parsed.parameters.is_empty());
}

#[test]
fn data_uri_with_explicit_media_type() {
    let parsed = parse_data_uri("data:image/png;base64,aGVsbG8=").unwrap();
    assert_eq!(parsed.media_type, "image/png");
    assert_eq!(parsed.data, b"hello");
}

#[test]
fn data_uri_without_base64_is_percent_decoded() {
    let parsed = parse_data_uri("data:text/plain,Hello%2C%20World!").unwrap();
    assert_eq!(parsed.media_type, "text/plain");
    assert_eq!(parsed.data, b"Hello, World!");
}

#[test]
fn data_uri_with_charset_parameter() {
    let parsed = parse_data_uri("data:text/plain;charset=utf-8;base64,aGk=").unwrap();
    assert_eq!(parsed.media_type, "text/plain");
    assert!(parsed.parameters.iter().any(|(k, v)| k == "charset" && v == "utf-8"));
    assert_eq!(parsed.data, b"hi");
}

#[test]
fn invalid_base64_is_rejected() {
    assert!(parse_data_uri("!!!not base64!!!").is_err());
}
