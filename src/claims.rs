//! Claims carried by a validated session token
//!
//! Descope tokens spell the user identity under several claim names
//! depending on how they were minted (`sub`, `userId`, `user_id`, or nested
//! under a `user` object). [`ClaimSet::subject`] normalises those aliases
//! into a single lookup so the rest of the library never has to know about
//! them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Claims decoded from a validated session token
///
/// Known claims are typed fields; everything else lands in `extra` so no
/// information from the token is lost.
///
/// # Examples
///
/// ```
/// use descope_mcp::ClaimSet;
///
/// let claims: ClaimSet = serde_json::from_value(serde_json::json!({
///     "sub": "user-123",
///     "scopes": ["read", "write"],
///     "customClaim": true
/// }))
/// .unwrap();
///
/// assert_eq!(claims.subject(), Some("user-123"));
/// assert_eq!(claims.scopes, vec!["read", "write"]);
/// assert!(claims.extra.contains_key("customClaim"));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimSet {
    /// Standard JWT subject claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Descope `userId` claim
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Snake-case `user_id` claim emitted by some token mints
    #[serde(rename = "user_id", default, skip_serializing_if = "Option::is_none")]
    pub user_id_snake: Option<String>,

    /// Tenant claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,

    /// `tenantId` claim
    #[serde(rename = "tenantId", default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    /// Scopes granted to the token
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,

    /// Audience claim; a string or an array of strings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Value>,

    /// Issuer claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Expiry, seconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,

    /// Issued-at, seconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,

    /// Nested user object carried by some token mints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserClaims>,

    /// All claims without a typed field above
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Nested `user` object inside a claim set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserClaims {
    /// `userId` inside the nested user object
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// `id` inside the nested user object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// `sub` inside the nested user object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Remaining fields of the nested user object
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ClaimSet {
    /// User identity normalised across the alias spellings
    ///
    /// Checks `sub`, `userId`, `user_id`, then `user.userId`, `user.id` and
    /// `user.sub`, in that order. Empty strings are skipped. Returns `None`
    /// when no alias carries a non-empty value.
    pub fn subject(&self) -> Option<&str> {
        non_empty(&self.sub)
            .or_else(|| non_empty(&self.user_id))
            .or_else(|| non_empty(&self.user_id_snake))
            .or_else(|| self.user.as_ref().and_then(UserClaims::subject))
    }

    /// Tenant identity, checking `tenant` then `tenantId`
    pub fn tenant(&self) -> Option<&str> {
        non_empty(&self.tenant).or_else(|| non_empty(&self.tenant_id))
    }
}

impl UserClaims {
    /// Identity from the nested object: `userId`, `id`, then `sub`
    fn subject(&self) -> Option<&str> {
        non_empty(&self.user_id)
            .or_else(|| non_empty(&self.id))
            .or_else(|| non_empty(&self.sub))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
