//! Configuration file and environment loading

#![allow(unsafe_code)] // Required for set_var in Rust 2024 edition

use std::io::Write;
use std::time::Duration;

use extapp_server::config::{ConfigError, LogOutput, LogRotation, ServerConfig};
use pretty_assertions::assert_eq;

fn write_config(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

const MINIMAL_TOML: &str = r#"
[handshake.application]
id = "acme-app"

[handshake.platform]
base_url = "https://platform.example.com"
"#;

#[test]
fn test_minimal_toml_uses_defaults() {
    let file = write_config(".toml", MINIMAL_TOML);
    let config = ServerConfig::from_file_with_prefix(file.path(), "EXTAPP_TEST_MINIMAL").unwrap();

    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.bind_address, "127.0.0.1");
    assert_eq!(config.logging.output, LogOutput::Stderr);
    assert_eq!(config.handshake.application.id.as_deref(), Some("acme-app"));
    assert_eq!(
        config.handshake.platform.authenticate_url().unwrap().as_str(),
        "https://platform.example.com/v1/extension-app/authenticate"
    );
    assert_eq!(config.handshake.platform.timeout(), Duration::from_secs(5));
    assert!(config.handshake.assertion.issuers.is_empty());
}

#[test]
fn test_full_toml() {
    let file = write_config(
        ".toml",
        r#"
[server]
bind_address = "0.0.0.0"
port = 9443
shutdown_grace_secs = 3

[logging]
level = "extapp_auth=debug,info"
structured = true
output = "both"
directory = "/var/log/extapp"
rotation = "daily"

[handshake.application]
id = "acme-app"

[handshake.platform]
base_url = "https://platform.example.com/"
timeout_ms = 750
service_token = "svc-secret"

[handshake.assertion]
expected_audience = "acme-audience"
allowed_algorithms = ["ES256", "RS256"]

[[handshake.assertion.issuers]]
kind = "jwks"
issuer = "platform.example.com"
jwks_uri = "https://platform.example.com/.well-known/jwks.json"
cache_ttl_secs = 60
"#,
    );
    let config = ServerConfig::from_file_with_prefix(file.path(), "EXTAPP_TEST_FULL").unwrap();

    assert_eq!(config.server.socket_addr().unwrap().to_string(), "0.0.0.0:9443");
    assert_eq!(config.server.shutdown_grace(), Duration::from_secs(3));
    assert!(config.logging.structured);
    assert_eq!(config.logging.output, LogOutput::Both);
    assert_eq!(config.logging.rotation, LogRotation::Daily);
    assert_eq!(config.handshake.platform.timeout(), Duration::from_millis(750));
    assert!(config.handshake.platform.service_token.is_some());
    assert_eq!(config.handshake.assertion.allowed_algorithms.len(), 2);
    assert_eq!(config.handshake.assertion.issuers.len(), 1);
    assert_eq!(
        config.handshake.assertion.issuers[0].issuer(),
        "platform.example.com"
    );
}

#[test]
fn test_json_config() {
    let file = write_config(
        ".json",
        r#"{
            "server": {"port": 9000},
            "handshake": {
                "application": {"id": "acme-app"},
                "platform": {"base_url": "https://platform.example.com"}
            }
        }"#,
    );
    let config = ServerConfig::from_file_with_prefix(file.path(), "EXTAPP_TEST_JSON").unwrap();
    assert_eq!(config.server.port, 9000);
}

#[test]
fn test_environment_overrides_file() {
    // GIVEN: a file setting the default port and no explicit bind address
    let file = write_config(".toml", MINIMAL_TOML);

    // WHEN: overrides are present under a prefix unique to this test
    // SAFETY: no other test reads or writes variables with this prefix
    unsafe {
        std::env::set_var("EXTAPP_TEST_ENV_SERVER__PORT", "9100");
        std::env::set_var("EXTAPP_TEST_ENV_HANDSHAKE__APPLICATION__ID", "override-app");
    }
    let config = ServerConfig::from_file_with_prefix(file.path(), "EXTAPP_TEST_ENV").unwrap();

    // THEN: environment values win
    assert_eq!(config.server.port, 9100);
    assert_eq!(
        config.handshake.application.id.as_deref(),
        Some("override-app")
    );
}

#[test]
fn test_unsupported_extension() {
    let file = write_config(".ini", "port = 1");
    let err = ServerConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat));
}

#[test]
fn test_missing_platform_is_parse_error() {
    let file = write_config(
        ".toml",
        r#"
[handshake.application]
id = "acme-app"
"#,
    );
    let err = ServerConfig::from_file_with_prefix(file.path(), "EXTAPP_TEST_MISSING").unwrap_err();
    assert!(matches!(err, ConfigError::ParseError(_)));
}

#[test]
fn test_missing_application_id_loads_but_cannot_start() {
    let file = write_config(
        ".toml",
        r#"
[handshake.platform]
base_url = "https://platform.example.com"
"#,
    );
    let config = ServerConfig::from_file_with_prefix(file.path(), "EXTAPP_TEST_NOID").unwrap();
    assert!(config.handshake.expected_identity().is_err());
}
