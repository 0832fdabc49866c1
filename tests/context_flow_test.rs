//! Integration tests for the process-wide context
//!
//! Verifies:
//! - `init` derives a client and audience from the configuration and the
//!   context-backed entry points use them
//! - a context without a management key cannot validate tokens
//! - re-initialization switches the active project
//! - invalid configurations are rejected without clobbering the context
//!
//! Every test here touches the global context and is serialized.

mod common;

use descope_mcp::{validate_token, DescopeConfig, DescopeMcpError};
use serial_test::serial;
use wiremock::MockServer;

const AUDIENCE: &str = "https://mcp.example.com";

fn discovery_config(server: &MockServer, project_id: &str) -> DescopeConfig {
    DescopeConfig::new(format!(
        "{}/{}/.well-known/openid-configuration",
        server.uri(),
        project_id
    ))
}

/// Without an explicit audience, tokens must be validated against the
/// discovery URL itself.
#[tokio::test]
#[serial]
async fn test_audience_defaults_to_discovery_url() {
    let server = MockServer::start().await;
    common::mount_jwks(&server, "P2abc").await;

    let config = discovery_config(&server, "P2abc").with_management_key("mk-test");
    let discovery_url = config.discovery_url.clone();
    descope_mcp::init(config).unwrap();

    let token = common::mint_token(&common::session_claims(&discovery_url, &["read"]));
    let claims = validate_token(&token, None, None)
        .await
        .expect("token addressed to the discovery URL must validate");

    assert_eq!(claims.subject(), Some("user-123"));
    descope_mcp::reset();
}

/// After `init`, the context-backed entry point must validate tokens with
/// no explicit client or audience.
#[tokio::test]
#[serial]
async fn test_validate_through_context() {
    let server = MockServer::start().await;
    common::mount_jwks(&server, "P2abc").await;

    descope_mcp::init(
        discovery_config(&server, "P2abc")
            .with_management_key("mk-test")
            .with_audience(AUDIENCE),
    )
    .unwrap();

    let token = common::mint_token(&common::session_claims(AUDIENCE, &["read", "write"]));
    let claims = validate_token(&token, None, None)
        .await
        .expect("token must validate through the context");

    assert_eq!(claims.subject(), Some("user-123"));
    assert_eq!(claims.scopes, vec!["read", "write"]);
    descope_mcp::reset();
}

/// A context initialized without a management key has no client, so
/// context-backed validation must fail as a configuration error.
#[tokio::test]
#[serial]
async fn test_keyless_context_cannot_validate() {
    let server = MockServer::start().await;
    descope_mcp::init(discovery_config(&server, "P2abc").with_audience(AUDIENCE)).unwrap();

    let err = validate_token("some-token", None, None).await.unwrap_err();
    let err = err.downcast::<DescopeMcpError>().unwrap();
    assert!(
        matches!(&err, DescopeMcpError::Config(msg) if msg.contains("no Descope client available")),
        "got: {:?}",
        err
    );
    descope_mcp::reset();
}

/// Re-initializing must switch validation to the new project's key
/// endpoint and audience.
#[tokio::test]
#[serial]
async fn test_reinit_switches_projects() {
    let first = MockServer::start().await;
    common::mount_jwks(&first, "P2abc").await;
    let second = MockServer::start().await;
    common::mount_jwks(&second, "P9xyz").await;

    descope_mcp::init(
        discovery_config(&first, "P2abc")
            .with_management_key("mk-first")
            .with_audience(AUDIENCE),
    )
    .unwrap();
    let token = common::mint_token(&common::session_claims(AUDIENCE, &["read"]));
    validate_token(&token, None, None)
        .await
        .expect("first project must validate");

    descope_mcp::init(
        discovery_config(&second, "P9xyz")
            .with_management_key("mk-second")
            .with_audience("https://second.example.com"),
    )
    .unwrap();
    let token = common::mint_token(&common::session_claims(
        "https://second.example.com",
        &["read"],
    ));
    let claims = validate_token(&token, None, None)
        .await
        .expect("second project must validate");

    assert_eq!(claims.subject(), Some("user-123"));
    descope_mcp::reset();
}

/// An invalid configuration must be rejected and leave the context
/// unusable rather than half-initialized.
#[tokio::test]
#[serial]
async fn test_invalid_config_is_rejected() {
    descope_mcp::reset();
    let err = descope_mcp::init(DescopeConfig::new("not a url")).unwrap_err();
    assert!(
        err.to_string().contains("Configuration error"),
        "got: {}",
        err
    );

    let err = validate_token("some-token", None, Some(AUDIENCE))
        .await
        .unwrap_err();
    let err = err.downcast::<DescopeMcpError>().unwrap();
    assert!(
        matches!(&err, DescopeMcpError::Config(msg) if msg.contains("no Descope client available")),
        "got: {:?}",
        err
    );
}
