//! Descope project configuration
//!
//! A [`DescopeConfig`] carries the three values the library needs to talk to
//! a Descope project:
//!
//! - `discovery_url` -- the project's OIDC discovery document URL. The
//!   project id and the API base URL are derived from it.
//! - `management_key` -- optional management API key used for server-side
//!   connection token exchange.
//! - `audience` -- optional expected audience for validated session tokens.
//!   When absent, the discovery URL itself is used as the audience.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DescopeMcpError, Result};

/// Configuration for a Descope project
///
/// # Examples
///
/// ```
/// use descope_mcp::DescopeConfig;
///
/// let config = DescopeConfig::new(
///     "https://api.descope.com/P2abc/.well-known/openid-configuration",
/// )
/// .with_management_key("key-1");
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.project_id().as_deref(), Some("P2abc"));
/// assert_eq!(config.base_url().as_deref(), Some("https://api.descope.com"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescopeConfig {
    /// OIDC discovery document URL for the project
    pub discovery_url: String,

    /// Management API key for server-side token exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_key: Option<String>,

    /// Expected audience for validated session tokens; defaults to the
    /// discovery URL when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
}

impl DescopeConfig {
    /// Create a configuration from a discovery document URL
    pub fn new(discovery_url: impl Into<String>) -> Self {
        Self {
            discovery_url: discovery_url.into(),
            management_key: None,
            audience: None,
        }
    }

    /// Set the management API key
    pub fn with_management_key(mut self, management_key: impl Into<String>) -> Self {
        self.management_key = Some(management_key.into());
        self
    }

    /// Set an explicit token audience
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the discovery URL is empty, does
    /// not parse as an http(s) URL, or when a management key is present but
    /// empty.
    pub fn validate(&self) -> Result<()> {
        if self.discovery_url.trim().is_empty() {
            return Err(
                DescopeMcpError::Config("discovery_url must not be empty".to_string()).into(),
            );
        }

        let url = Url::parse(&self.discovery_url).map_err(|e| {
            DescopeMcpError::Config(format!("discovery_url is not a valid URL: {}", e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(DescopeMcpError::Config(format!(
                "discovery_url must use http or https, got '{}'",
                url.scheme()
            ))
            .into());
        }

        if let Some(key) = &self.management_key {
            if key.is_empty() {
                return Err(DescopeMcpError::Config(
                    "management_key must not be empty when set".to_string(),
                )
                .into());
            }
        }

        Ok(())
    }

    /// Expected audience for session token validation
    ///
    /// Returns the explicit audience when one is configured, otherwise the
    /// discovery URL.
    pub fn audience(&self) -> &str {
        match self.audience.as_deref() {
            Some(audience) if !audience.is_empty() => audience,
            _ => &self.discovery_url,
        }
    }

    /// Project id extracted from the discovery URL path
    ///
    /// Descope project ids start with `P` (for example
    /// `https://api.descope.com/P2abc/.well-known/...` yields `P2abc`).
    /// When no path segment looks like a project id, the first non-empty
    /// segment is used so that self-hosted or test URLs still resolve.
    /// Returns `None` when the URL does not parse or has no usable segment.
    pub fn project_id(&self) -> Option<String> {
        extract_project_id(&self.discovery_url)
    }

    /// API base URL (scheme and host) derived from the discovery URL
    pub fn base_url(&self) -> Option<String> {
        let url = Url::parse(&self.discovery_url).ok()?;
        let origin = url.origin();
        match origin {
            url::Origin::Tuple(..) => Some(origin.ascii_serialization()),
            url::Origin::Opaque(_) => None,
        }
    }
}

/// Extract a project id from a discovery URL path.
///
/// Prefers the first path segment with the `P` project-id prefix; falls back
/// to the first non-empty segment.
fn extract_project_id(discovery_url: &str) -> Option<String> {
    let url = Url::parse(discovery_url).ok()?;
    let segments: Vec<&str> = url
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .collect();

    if let Some(project) = segments
        .iter()
        .find(|segment| segment.starts_with('P') && segment.len() > 1)
    {
        return Some((*project).to_string());
    }

    segments.first().map(|segment| (*segment).to_string())
}
