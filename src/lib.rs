//! Descope authentication and authorization for MCP servers
//!
//! This library bridges the MCP tool protocol with the Descope identity
//! platform: bearer tokens are validated against a project's published
//! signing keys, tool invocations are authorized against required scopes
//! with structured denial payloads, and validated callers can be exchanged
//! for downstream OAuth access tokens held by Descope outbound apps.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `config`: discovery-URL configuration and project id derivation
//! - `client`: Descope API client for session validation and management REST
//! - `jwks`: cached retrieval of the project's signing keys
//! - `claims`: validated token claims and identity alias resolution
//! - `scopes`: scope checking and denial payload construction
//! - `session`: per-request validation and authorization entry points
//! - `connections`: connection token exchange for downstream services
//! - `context`: optional process-wide configuration context
//! - `sdk`: explicit-configuration handle for multi-project hosts
//! - `error`: error types and result aliases
//!
//! # Example
//!
//! ```no_run
//! use descope_mcp::{ConnectionTokenRequest, DescopeConfig, ExchangeCredentials};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     descope_mcp::init(
//!         DescopeConfig::new(
//!             "https://api.descope.com/P2abc/.well-known/openid-configuration",
//!         )
//!         .with_management_key("management-key"),
//!     )?;
//!
//!     let required = vec!["calendar.read".to_string()];
//!     let (claims, user_id) =
//!         descope_mcp::authorize("bearer-token", &required, None, None).await?;
//!     println!("caller {} holds {:?}", user_id, claims.scopes);
//!
//!     let request = ConnectionTokenRequest::for_user("google-calendar", user_id)
//!         .with_scopes(["calendar.readonly"]);
//!     let token =
//!         descope_mcp::get_connection_token(&request, &ExchangeCredentials::none()).await?;
//!     println!("downstream token: {}", token.access_token);
//!     Ok(())
//! }
//! ```

pub mod claims;
pub mod client;
pub mod config;
pub mod connections;
pub mod context;
pub mod error;
pub mod jwks;
pub mod scopes;
pub mod sdk;
pub mod session;

// Re-export commonly used types
pub use claims::{ClaimSet, UserClaims};
pub use client::{DescopeClient, DEFAULT_BASE_URL};
pub use config::DescopeConfig;
pub use connections::{
    get_connection_token, ConnectionToken, ConnectionTokenRequest, ExchangeCredentials, TokenOwner,
};
pub use context::{init, reset};
pub use error::{DescopeMcpError, Result};
pub use scopes::{check_scopes, require_scopes, ScopeDecision, ScopeDenial};
pub use sdk::DescopeMcp;
pub use session::{authorize, validate_token, validate_token_and_user_id};
