//! Session token validation
//!
//! The functions here are the request-path entry points an MCP server calls
//! for every incoming tool invocation: verify the bearer token, check the
//! scopes a tool demands, and extract the caller's identity.
//!
//! Each function accepts an optional [`DescopeClient`] and audience; when
//! omitted they fall back to the global context ([`crate::context`]), so a
//! server that calls [`crate::init`] at startup passes `None` for both.

use crate::claims::ClaimSet;
use crate::client::DescopeClient;
use crate::error::{DescopeMcpError, Result};
use crate::scopes;

/// Validate a bearer token and return its claims
///
/// The token signature, expiry, and audience are checked by
/// [`DescopeClient::validate_session`]. Failures are split into
/// [`DescopeMcpError::TokenInvalid`] for problems with the token itself and
/// [`DescopeMcpError::ValidationFailed`] for operational problems such as an
/// unreachable key endpoint, so transports can map them to 401 versus 500.
///
/// # Errors
///
/// Returns [`DescopeMcpError::TokenInvalid`] for an empty or rejected
/// token, [`DescopeMcpError::Config`] when no client or audience is
/// available, and [`DescopeMcpError::ValidationFailed`] when verification
/// could not be carried out.
pub async fn validate_token(
    token: &str,
    client: Option<&DescopeClient>,
    audience: Option<&str>,
) -> Result<ClaimSet> {
    if token.is_empty() {
        return Err(DescopeMcpError::TokenInvalid("access token is required".to_string()).into());
    }

    let client = match client {
        Some(client) => client.clone(),
        None => match crate::context::current_client() {
            Some(client) => client,
            None => {
                return Err(DescopeMcpError::Config(
                    "no Descope client available: pass one explicitly or initialize the context"
                        .to_string(),
                )
                .into())
            }
        },
    };

    let audience = match audience.filter(|a| !a.is_empty()) {
        Some(audience) => audience.to_string(),
        None => match crate::context::current_audience() {
            Some(audience) => audience,
            None => {
                return Err(DescopeMcpError::Config(
                    "no audience configured: pass one explicitly or initialize the context"
                        .to_string(),
                )
                .into())
            }
        },
    };

    client
        .validate_session(token, &audience)
        .await
        .map_err(classify_validation_error)
}

/// Validate a bearer token and also extract the caller's identity
///
/// # Errors
///
/// Everything [`validate_token`] returns, plus
/// [`DescopeMcpError::IdentityNotFound`] when the validated claims carry no
/// usable user id.
pub async fn validate_token_and_user_id(
    token: &str,
    client: Option<&DescopeClient>,
    audience: Option<&str>,
) -> Result<(ClaimSet, String)> {
    let claims = validate_token(token, client, audience).await?;
    let user_id = subject_of(&claims)?;
    Ok((claims, user_id))
}

/// Validate a bearer token, enforce required scopes, and extract identity
///
/// This is the full per-request gate in one call: validation failures come
/// back as token errors, missing scopes as
/// [`DescopeMcpError::InsufficientScope`] carrying an RFC 6750 style denial
/// payload, and a missing identity as
/// [`DescopeMcpError::IdentityNotFound`].
///
/// # Examples
///
/// ```no_run
/// use descope_mcp::session;
///
/// # async fn example() -> descope_mcp::Result<()> {
/// let required = vec!["calendar.read".to_string()];
/// let (claims, user_id) = session::authorize("bearer-token", &required, None, None).await?;
/// println!("caller {} holds {:?}", user_id, claims.scopes);
/// # Ok(())
/// # }
/// ```
pub async fn authorize(
    token: &str,
    required_scopes: &[String],
    client: Option<&DescopeClient>,
    audience: Option<&str>,
) -> Result<(ClaimSet, String)> {
    let claims = validate_token(token, client, audience).await?;
    scopes::require_scopes(&claims, required_scopes, None)?;
    let user_id = subject_of(&claims)?;
    Ok((claims, user_id))
}

/// Extract the caller's identity from validated claims
///
/// # Errors
///
/// Returns [`DescopeMcpError::IdentityNotFound`] when no alias in the claim
/// set carries a non-empty user id.
pub fn subject_of(claims: &ClaimSet) -> Result<String> {
    match claims.subject() {
        Some(subject) => Ok(subject.to_string()),
        None => Err(DescopeMcpError::IdentityNotFound(
            "validated token carries no user id claim".to_string(),
        )
        .into()),
    }
}

/// Split verification failures into token problems and operational
/// problems.
///
/// Classification is by message text, which is deliberately kept in this
/// one place: [`DescopeClient`] phrases token rejections with "invalid",
/// "expired", or "audience", and operational failures without them.
fn classify_validation_error(err: anyhow::Error) -> anyhow::Error {
    let detail = match err.downcast_ref::<DescopeMcpError>() {
        Some(DescopeMcpError::Provider(message)) => message.clone(),
        _ => err.to_string(),
    };
    let lowered = detail.to_lowercase();
    if lowered.contains("invalid") || lowered.contains("expired") || lowered.contains("audience") {
        DescopeMcpError::TokenInvalid(detail).into()
    } else {
        DescopeMcpError::ValidationFailed(detail).into()
    }
}
