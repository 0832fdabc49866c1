//! Scope-based authorization
//!
//! Authorization is a pure decision over the validated claim set: an
//! operation names its required scopes and [`check_scopes`] answers with a
//! [`ScopeDecision`]. A denial carries a [`ScopeDenial`] payload shaped for
//! an RFC 6750 `insufficient_scope` challenge, so MCP servers can hand it to
//! clients without reshaping it.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::claims::ClaimSet;
use crate::error::{DescopeMcpError, Result};

/// Error code used in denial payloads, per RFC 6750
const INSUFFICIENT_SCOPE: &str = "insufficient_scope";

/// Denial payload for a failed scope check
///
/// `scope` is the combined advertisement (token scopes and required scopes,
/// deduplicated and sorted) that a client would need to re-request.
/// `missing_scopes` preserves the order of the required list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeDenial {
    /// Always `insufficient_scope`
    pub error: String,

    /// Space-separated union of token and required scopes, sorted
    pub scope: String,

    /// Human-readable description of the denial
    pub error_description: String,

    /// Required scopes the token does not hold, in required order
    pub missing_scopes: Vec<String>,

    /// Scopes the token holds
    pub token_scopes: Vec<String>,

    /// Scopes the operation requires
    pub required_scopes: Vec<String>,
}

impl ScopeDenial {
    /// Build a denial payload from the required and held scope lists
    ///
    /// # Examples
    ///
    /// ```
    /// use descope_mcp::ScopeDenial;
    ///
    /// let denial = ScopeDenial::new(
    ///     &["admin".to_string()],
    ///     &["read".to_string(), "write".to_string()],
    /// );
    ///
    /// assert_eq!(denial.error, "insufficient_scope");
    /// assert_eq!(denial.missing_scopes, vec!["admin"]);
    /// assert_eq!(denial.scope, "admin read write");
    /// ```
    pub fn new(required_scopes: &[String], token_scopes: &[String]) -> Self {
        let missing_scopes = missing_scopes(required_scopes, token_scopes);
        let combined: BTreeSet<&str> = token_scopes
            .iter()
            .chain(required_scopes.iter())
            .map(String::as_str)
            .collect();
        let scope = combined.into_iter().collect::<Vec<_>>().join(" ");
        let error_description = format!(
            "Token missing required scopes: {}",
            missing_scopes.join(", ")
        );

        Self {
            error: INSUFFICIENT_SCOPE.to_string(),
            scope,
            error_description,
            missing_scopes,
            token_scopes: token_scopes.to_vec(),
            required_scopes: required_scopes.to_vec(),
        }
    }

    /// Replace the default description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.error_description = description.into();
        self
    }

    /// Render the payload as a JSON object
    pub fn to_json(&self) -> Value {
        json!({
            "error": self.error,
            "scope": self.scope,
            "error_description": self.error_description,
            "missing_scopes": self.missing_scopes,
            "token_scopes": self.token_scopes,
            "required_scopes": self.required_scopes,
        })
    }
}

impl fmt::Display for ScopeDenial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error_description)
    }
}

/// Outcome of a scope check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeDecision {
    /// The token holds every required scope
    Authorized,
    /// The token is missing at least one required scope
    Denied(ScopeDenial),
}

impl ScopeDecision {
    /// True when the check passed
    pub fn is_authorized(&self) -> bool {
        matches!(self, ScopeDecision::Authorized)
    }

    /// The denial payload, when the check failed
    pub fn denial(&self) -> Option<&ScopeDenial> {
        match self {
            ScopeDecision::Authorized => None,
            ScopeDecision::Denied(denial) => Some(denial),
        }
    }
}

/// Check a validated claim set against an operation's required scopes
///
/// An empty requirement list authorizes unconditionally, without reading the
/// token's scopes.
///
/// # Examples
///
/// ```
/// use descope_mcp::{check_scopes, ClaimSet};
///
/// let claims: ClaimSet = serde_json::from_value(serde_json::json!({
///     "sub": "user-123",
///     "scopes": ["read", "write"]
/// }))
/// .unwrap();
///
/// assert!(check_scopes(&claims, &["read".to_string()]).is_authorized());
/// assert!(!check_scopes(&claims, &["admin".to_string()]).is_authorized());
/// ```
pub fn check_scopes(claims: &ClaimSet, required_scopes: &[String]) -> ScopeDecision {
    if required_scopes.is_empty() {
        return ScopeDecision::Authorized;
    }

    let denial = ScopeDenial::new(required_scopes, &claims.scopes);
    if denial.missing_scopes.is_empty() {
        ScopeDecision::Authorized
    } else {
        ScopeDecision::Denied(denial)
    }
}

/// Enforce an operation's required scopes, turning a denial into an error
///
/// A custom `description` replaces the default "Token missing required
/// scopes" wording in the denial payload.
///
/// # Errors
///
/// Returns [`DescopeMcpError::InsufficientScope`] carrying the denial
/// payload when the token is missing any required scope.
pub fn require_scopes(
    claims: &ClaimSet,
    required_scopes: &[String],
    description: Option<&str>,
) -> Result<()> {
    match check_scopes(claims, required_scopes) {
        ScopeDecision::Authorized => Ok(()),
        ScopeDecision::Denied(denial) => {
            let denial = match description {
                Some(description) => denial.with_description(description),
                None => denial,
            };
            tracing::warn!(
                missing = ?denial.missing_scopes,
                "token rejected: missing required scopes"
            );
            Err(DescopeMcpError::InsufficientScope(denial).into())
        }
    }
}

/// Required scopes the token does not hold, in required order, deduplicated.
fn missing_scopes(required_scopes: &[String], token_scopes: &[String]) -> Vec<String> {
    let mut missing: Vec<String> = Vec::new();
    for scope in required_scopes {
        if !token_scopes.contains(scope) && !missing.contains(scope) {
            missing.push(scope.clone());
        }
    }
    missing
}
