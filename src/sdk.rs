//! Explicit-configuration SDK handle
//!
//! [`DescopeMcp`] packages a configuration, its derived client, and the
//! resolved audience into one value that can be threaded through a server
//! explicitly. It exposes the same operations as the context-backed free
//! functions but never reads or writes the global context, which makes it
//! the right shape for hosts serving several logical configurations from
//! one process. Single-tenant servers can keep using [`crate::init`] and
//! the free functions instead.

use crate::claims::ClaimSet;
use crate::client::{DescopeClient, DEFAULT_BASE_URL};
use crate::config::DescopeConfig;
use crate::connections::{self, ConnectionToken, ConnectionTokenRequest};
use crate::error::{DescopeMcpError, Result};
use crate::scopes::{self, ScopeDecision};
use crate::session;

/// A self-contained Descope SDK instance
///
/// # Examples
///
/// ```no_run
/// use descope_mcp::{DescopeConfig, DescopeMcp};
///
/// # async fn example() -> descope_mcp::Result<()> {
/// let sdk = DescopeMcp::new(
///     DescopeConfig::new("https://api.descope.com/P2abc/.well-known/openid-configuration")
///         .with_management_key("management-key"),
/// )?;
///
/// let required = vec!["calendar.read".to_string()];
/// let (claims, user_id) = sdk.authorize("bearer-token", &required).await?;
/// println!("caller {} holds {:?}", user_id, claims.scopes);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DescopeMcp {
    config: DescopeConfig,
    client: Option<DescopeClient>,
    audience: String,
}

impl DescopeMcp {
    /// Build an SDK instance from a configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the configuration fails
    /// validation.
    pub fn new(config: DescopeConfig) -> Result<Self> {
        config.validate()?;
        let client = DescopeClient::from_config(&config)?;
        let audience = config.audience().to_string();
        Ok(Self {
            config,
            client,
            audience,
        })
    }

    /// The configuration this instance was built from
    pub fn config(&self) -> &DescopeConfig {
        &self.config
    }

    /// The management client, when the configuration carries a management
    /// key
    pub fn client(&self) -> Option<&DescopeClient> {
        self.client.as_ref()
    }

    /// The audience tokens are validated against
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Validate a bearer token and return its claims
    ///
    /// # Errors
    ///
    /// See [`session::validate_token`]; additionally fails with a
    /// configuration error when this instance has no client.
    pub async fn validate_token(&self, token: &str) -> Result<ClaimSet> {
        let client = self.require_client()?;
        session::validate_token(token, Some(client), Some(&self.audience)).await
    }

    /// Validate a bearer token and extract the caller's identity
    pub async fn validate_token_and_user_id(&self, token: &str) -> Result<(ClaimSet, String)> {
        let claims = self.validate_token(token).await?;
        let user_id = session::subject_of(&claims)?;
        Ok((claims, user_id))
    }

    /// Validate a bearer token, enforce scopes, and extract identity
    ///
    /// # Errors
    ///
    /// Token failures, [`DescopeMcpError::InsufficientScope`], or
    /// [`DescopeMcpError::IdentityNotFound`], in that order of checking.
    pub async fn authorize(
        &self,
        token: &str,
        required_scopes: &[String],
    ) -> Result<(ClaimSet, String)> {
        let claims = self.validate_token(token).await?;
        scopes::require_scopes(&claims, required_scopes, None)?;
        let user_id = session::subject_of(&claims)?;
        Ok((claims, user_id))
    }

    /// Check claims against required scopes without erroring
    pub fn check_scopes(&self, claims: &ClaimSet, required_scopes: &[String]) -> ScopeDecision {
        scopes::check_scopes(claims, required_scopes)
    }

    /// Enforce required scopes on already-validated claims
    ///
    /// # Errors
    ///
    /// Returns [`DescopeMcpError::InsufficientScope`] with the denial
    /// payload when scopes are missing.
    pub fn require_scopes(
        &self,
        claims: &ClaimSet,
        required_scopes: &[String],
        description: Option<&str>,
    ) -> Result<()> {
        scopes::require_scopes(claims, required_scopes, description)
    }

    /// Fetch a connection token for a downstream service
    ///
    /// With `access_token` set, the caller's own token authenticates the
    /// exchange against this instance's project; otherwise the instance's
    /// management client is used. The global context is never consulted.
    ///
    /// # Errors
    ///
    /// Always [`DescopeMcpError::ConnectionToken`], wrapping the underlying
    /// cause.
    pub async fn connection_token(
        &self,
        request: &ConnectionTokenRequest,
        access_token: Option<&str>,
    ) -> Result<ConnectionToken> {
        self.exchange(request, access_token)
            .await
            .map_err(connections::wrap_exchange_error)
    }

    async fn exchange(
        &self,
        request: &ConnectionTokenRequest,
        access_token: Option<&str>,
    ) -> Result<ConnectionToken> {
        if let Some(token) = access_token.filter(|t| !t.is_empty()) {
            let (project_id, base_url) = match self.client.as_ref() {
                Some(client) => (
                    client.project_id().to_string(),
                    client.base_url().to_string(),
                ),
                None => {
                    let project_id = match self.config.project_id() {
                        Some(id) => id,
                        None => {
                            return Err(DescopeMcpError::Config(
                                "no project id can be derived from the discovery URL".to_string(),
                            )
                            .into())
                        }
                    };
                    let base_url = self
                        .config
                        .base_url()
                        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
                    (project_id, base_url)
                }
            };
            let sender = DescopeClient::with_base_url(project_id, None, base_url)?;
            return sender.exchange_outbound_token(request, token).await;
        }

        match self.client.as_ref() {
            Some(client) => client.outbound_app_token(request).await,
            None => Err(DescopeMcpError::Config(
                "no authentication method available: provide an access token or configure a \
                 management key"
                    .to_string(),
            )
            .into()),
        }
    }

    fn require_client(&self) -> Result<&DescopeClient> {
        match self.client.as_ref() {
            Some(client) => Ok(client),
            None => Err(DescopeMcpError::Config(
                "no Descope client available: configuration has no management key".to_string(),
            )
            .into()),
        }
    }
}
