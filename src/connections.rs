//! Connection token exchange for outbound apps
//!
//! MCP tools frequently act on a user's behalf against downstream services
//! (Google Calendar, Slack, and so on). Descope stores those OAuth grants as
//! "outbound apps"; this module turns a validated MCP caller into a
//! downstream access token by calling the management API.
//!
//! [`get_connection_token`] picks the first usable authentication method in
//! a fixed priority order:
//!
//! 1. the caller's own access token
//! 2. an explicitly supplied [`DescopeClient`]
//! 3. an explicit project id and management key pair
//! 4. the client held by the global context ([`crate::context`])
//!
//! Every failure, whatever the underlying cause, surfaces as
//! [`DescopeMcpError::ConnectionToken`] so callers have a single error shape
//! to report back through the tool protocol.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

use crate::client::{DescopeClient, DEFAULT_BASE_URL};
use crate::error::{DescopeMcpError, Result};

/// Endpoint minting a user-owned token carrying specific scopes
const USER_TOKEN_PATH: &str = "/v1/mgmt/outbound/app/user/token";

/// Endpoint returning the latest user-owned token regardless of scopes
const USER_LATEST_TOKEN_PATH: &str = "/v1/mgmt/outbound/app/user/token/latest";

/// Endpoint minting a tenant-owned token carrying specific scopes
const TENANT_TOKEN_PATH: &str = "/v1/mgmt/outbound/app/tenant/token";

/// Endpoint returning the latest tenant-owned token regardless of scopes
const TENANT_LATEST_TOKEN_PATH: &str = "/v1/mgmt/outbound/app/tenant/token/latest";

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Who a connection token is minted for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenOwner {
    /// A token tied to an individual user
    User(String),
    /// A token shared by a whole tenant
    Tenant(String),
}

impl TokenOwner {
    /// The user or tenant id the token belongs to
    pub fn id(&self) -> &str {
        match self {
            TokenOwner::User(id) => id,
            TokenOwner::Tenant(id) => id,
        }
    }
}

/// A request for a downstream access token
///
/// The owner and requested scopes select the management endpoint: requests
/// with scopes hit the scoped endpoints, requests without scopes fetch the
/// latest stored token.
///
/// # Examples
///
/// ```
/// use descope_mcp::ConnectionTokenRequest;
///
/// let request = ConnectionTokenRequest::for_user("google-calendar", "user-123")
///     .with_scopes(["calendar.readonly"]);
/// assert_eq!(request.endpoint_path(), "/v1/mgmt/outbound/app/user/token");
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionTokenRequest {
    /// Outbound app id as configured in the Descope project
    pub app_id: String,
    /// Owner of the stored OAuth grant
    pub owner: TokenOwner,
    /// Scopes to request; empty means "whatever the latest token has"
    pub scopes: Vec<String>,
    /// Tenant the user belongs to, for user-owned requests in multi-tenant
    /// projects
    pub tenant_id: Option<String>,
    /// Provider-specific options forwarded verbatim to the management API
    pub options: serde_json::Value,
}

impl ConnectionTokenRequest {
    /// Request a token owned by a user
    pub fn for_user(app_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            owner: TokenOwner::User(user_id.into()),
            scopes: Vec::new(),
            tenant_id: None,
            options: json!({}),
        }
    }

    /// Request a token owned by a tenant
    pub fn for_tenant(app_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            owner: TokenOwner::Tenant(tenant_id.into()),
            scopes: Vec::new(),
            tenant_id: None,
            options: json!({}),
        }
    }

    /// Set the scopes to request
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the tenant a user-owned request belongs to
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Set provider-specific options, such as `{"refreshToken": true}`
    pub fn with_options(mut self, options: serde_json::Value) -> Self {
        self.options = options;
        self
    }

    /// The scopes this request asks for, or `None` when the latest stored
    /// token should be returned as-is
    pub fn requested_scopes(&self) -> Option<&[String]> {
        if self.scopes.is_empty() {
            None
        } else {
            Some(&self.scopes)
        }
    }

    /// The management endpoint path this request maps to
    pub fn endpoint_path(&self) -> &'static str {
        match (&self.owner, self.requested_scopes().is_some()) {
            (TokenOwner::User(_), true) => USER_TOKEN_PATH,
            (TokenOwner::User(_), false) => USER_LATEST_TOKEN_PATH,
            (TokenOwner::Tenant(_), true) => TENANT_TOKEN_PATH,
            (TokenOwner::Tenant(_), false) => TENANT_LATEST_TOKEN_PATH,
        }
    }

    /// The JSON body sent to the management endpoint
    ///
    /// `options` is always present, defaulting to an empty object, because
    /// the management API treats a missing key differently from an empty
    /// one.
    pub fn payload(&self) -> serde_json::Value {
        let mut payload = serde_json::Map::new();
        payload.insert("appId".to_string(), json!(self.app_id));
        match &self.owner {
            TokenOwner::User(user_id) => {
                payload.insert("userId".to_string(), json!(user_id));
                if let Some(tenant_id) = self.tenant_id.as_deref().filter(|t| !t.is_empty()) {
                    payload.insert("tenantId".to_string(), json!(tenant_id));
                }
            }
            TokenOwner::Tenant(tenant_id) => {
                payload.insert("tenantId".to_string(), json!(tenant_id));
            }
        }
        if let Some(scopes) = self.requested_scopes() {
            payload.insert("scopes".to_string(), json!(scopes));
        }
        payload.insert("options".to_string(), self.options.clone());
        serde_json::Value::Object(payload)
    }
}

/// A downstream access token minted by the management API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionToken {
    /// Bearer token for the downstream service
    pub access_token: String,
    /// Outbound app the token belongs to
    pub app_id: String,
    /// User or tenant id the token was minted for
    pub owner_id: String,
}

// ---------------------------------------------------------------------------
// Exchange credentials
// ---------------------------------------------------------------------------

/// Authentication material for a token exchange
///
/// All fields are optional; [`get_connection_token`] walks them in priority
/// order and uses the first method that applies. The empty value defers
/// entirely to the global context.
#[derive(Clone, Default)]
pub struct ExchangeCredentials {
    /// The caller's own access token, forwarded as the exchange credential
    pub access_token: Option<String>,
    /// A pre-built client holding a management key
    pub client: Option<DescopeClient>,
    /// Project id, required with `management_key` and usable to override
    /// the project an access token exchange runs against
    pub project_id: Option<String>,
    /// Management key paired with `project_id`
    pub management_key: Option<String>,
}

impl fmt::Debug for ExchangeCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeCredentials")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<redacted>"),
            )
            .field("client", &self.client)
            .field("project_id", &self.project_id)
            .field(
                "management_key",
                &self.management_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl ExchangeCredentials {
    /// No explicit credentials; rely on the global context
    pub fn none() -> Self {
        Self::default()
    }

    /// Exchange using the caller's own access token
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            ..Self::default()
        }
    }

    /// Exchange through a pre-built client
    pub fn client(client: DescopeClient) -> Self {
        Self {
            client: Some(client),
            ..Self::default()
        }
    }

    /// Exchange with an explicit project id and management key
    pub fn management(project_id: impl Into<String>, management_key: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            management_key: Some(management_key.into()),
            ..Self::default()
        }
    }

    /// Override the project id, typically alongside [`bearer`](Self::bearer)
    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Exchange
// ---------------------------------------------------------------------------

/// Fetch a connection token for a downstream service
///
/// Authentication methods are tried in priority order: the caller's access
/// token, an explicit client, an explicit project id and management key
/// pair, and finally the global context's client.
///
/// # Errors
///
/// Always returns [`DescopeMcpError::ConnectionToken`], wrapping the
/// underlying cause. With no usable authentication method the cause is a
/// configuration error.
///
/// # Examples
///
/// ```no_run
/// use descope_mcp::{get_connection_token, ConnectionTokenRequest, ExchangeCredentials};
///
/// # async fn example() -> descope_mcp::Result<()> {
/// let request = ConnectionTokenRequest::for_user("google-calendar", "user-123")
///     .with_scopes(["calendar.readonly"]);
/// let token = get_connection_token(&request, &ExchangeCredentials::none()).await?;
/// println!("downstream token: {}", token.access_token);
/// # Ok(())
/// # }
/// ```
pub async fn get_connection_token(
    request: &ConnectionTokenRequest,
    credentials: &ExchangeCredentials,
) -> Result<ConnectionToken> {
    exchange(request, credentials).await.map_err(wrap_exchange_error)
}

async fn exchange(
    request: &ConnectionTokenRequest,
    credentials: &ExchangeCredentials,
) -> Result<ConnectionToken> {
    if let Some(access_token) = non_empty(credentials.access_token.as_deref()) {
        let project_id = match resolve_project_id(credentials.project_id.as_deref()) {
            Some(id) => id,
            None => {
                return Err(DescopeMcpError::Config(
                    "no project id available for the access token exchange: pass one explicitly \
                     or initialize the context"
                        .to_string(),
                )
                .into())
            }
        };
        tracing::debug!(project_id = %project_id, "exchanging with the caller's access token");
        let sender = DescopeClient::with_base_url(project_id, None, resolve_base_url())?;
        return sender.exchange_outbound_token(request, access_token).await;
    }

    if let Some(client) = credentials.client.as_ref() {
        tracing::debug!("exchanging through an explicitly supplied client");
        return client.outbound_app_token(request).await;
    }

    let explicit_pair = (
        non_empty(credentials.project_id.as_deref()),
        non_empty(credentials.management_key.as_deref()),
    );
    if let (Some(project_id), Some(management_key)) = explicit_pair {
        tracing::debug!(project_id = %project_id, "exchanging with explicit project credentials");
        let client = DescopeClient::with_base_url(
            project_id,
            Some(management_key.to_string()),
            resolve_base_url(),
        )?;
        return client.outbound_app_token(request).await;
    }

    if let Some(client) = crate::context::current_client() {
        tracing::debug!("exchanging through the global context's client");
        return client.outbound_app_token(request).await;
    }

    Err(DescopeMcpError::Config(
        "no authentication method available: provide an access token, a client, or project \
         credentials"
            .to_string(),
    )
    .into())
}

/// Fold any exchange failure into the uniform connection token error,
/// leaving already-wrapped errors untouched.
pub(crate) fn wrap_exchange_error(err: anyhow::Error) -> anyhow::Error {
    if let Some(DescopeMcpError::ConnectionToken(_)) = err.downcast_ref::<DescopeMcpError>() {
        return err;
    }
    tracing::warn!(error = %err, "connection token exchange failed");
    DescopeMcpError::ConnectionToken(err.to_string()).into()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn resolve_project_id(explicit: Option<&str>) -> Option<String> {
    match non_empty(explicit) {
        Some(id) => Some(id.to_string()),
        None => crate::context::current_project_id(),
    }
}

fn resolve_base_url() -> String {
    crate::context::current_base_url().unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}
