//! Error types for the descope-mcp library
//!
//! All fallible operations return [`Result`], an alias for `anyhow::Result`.
//! Errors that callers are expected to branch on are raised as
//! [`DescopeMcpError`] variants and can be recovered from an `anyhow::Error`
//! with `downcast_ref`.

#![allow(dead_code)]

use thiserror::Error;

use crate::scopes::ScopeDenial;

/// Main error type for descope-mcp operations
#[derive(Error, Debug)]
pub enum DescopeMcpError {
    /// Configuration is missing or unusable
    #[error("Configuration error: {0}")]
    Config(String),

    /// The bearer token itself was rejected (bad signature, expired,
    /// audience mismatch, malformed)
    #[error("Invalid token: {0}")]
    TokenInvalid(String),

    /// Token validation could not complete for an operational reason
    /// (network failure, unavailable key set)
    #[error("Token validation failed: {0}")]
    ValidationFailed(String),

    /// A valid token does not carry the scopes an operation requires
    #[error("Insufficient scope: {0}")]
    InsufficientScope(ScopeDenial),

    /// A validated token carries no recognizable user identity claim
    #[error("Identity not found: {0}")]
    IdentityNotFound(String),

    /// Connection token exchange failed; the message carries the
    /// underlying cause
    #[error("Failed to get connection token: {0}")]
    ConnectionToken(String),

    /// The identity provider API reported an error
    #[error("Provider error: {0}")]
    Provider(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Convenience result type used throughout the library
pub type Result<T> = anyhow::Result<T>;
