//! Descope API client
//!
//! [`DescopeClient`] is the single trust point for provider interaction:
//!
//! - session token verification against the project's published JWKS
//!   (`validate_session`)
//! - management API calls that mint connection tokens for downstream OAuth
//!   providers (`outbound_app_token`)
//!
//! The client is bound to a project id and, optionally, a management key.
//! All endpoints are built from a base URL that defaults to the public
//! Descope API but can be overridden, which lets tests point the client at
//! a mock server.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::jwk::KeyAlgorithm;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::Deserialize;

use crate::claims::ClaimSet;
use crate::config::DescopeConfig;
use crate::connections::{ConnectionToken, ConnectionTokenRequest};
use crate::error::{DescopeMcpError, Result};
use crate::jwks::JwksCache;

/// Default base URL for the Descope API
pub const DEFAULT_BASE_URL: &str = "https://api.descope.com";

/// Timeout for management API requests
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Clock skew tolerance when checking token expiry, in seconds
const CLOCK_SKEW_LEEWAY_SECS: u64 = 60;

/// Signature algorithms accepted on session tokens. Restricting to
/// asymmetric algorithms rules out key-confusion attacks where an HMAC
/// token is verified against a public key.
const ALLOWED_ALGORITHMS: [Algorithm; 4] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::ES256,
];

/// SDK identification headers sent with every provider request
const SDK_NAME_HEADER: &str = "x-descope-sdk-name";
const SDK_VERSION_HEADER: &str = "x-descope-sdk-version";
const PROJECT_ID_HEADER: &str = "x-descope-project-id";
const SDK_NAME: &str = "mcp-rust";

/// Client for a single Descope project
///
/// # Examples
///
/// ```no_run
/// use descope_mcp::DescopeClient;
///
/// # async fn example() -> descope_mcp::Result<()> {
/// let client = DescopeClient::new("P2abc", Some("management-key".to_string()))?;
/// let claims = client
///     .validate_session("session-token", "https://mcp.example.com")
///     .await?;
/// println!("validated {:?}", claims.subject());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DescopeClient {
    project_id: String,
    management_key: Option<String>,
    base_url: String,
    http: Client,
    jwks: Arc<JwksCache>,
}

impl fmt::Debug for DescopeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescopeClient")
            .field("project_id", &self.project_id)
            .field(
                "management_key",
                &self.management_key.as_ref().map(|_| "<redacted>"),
            )
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl DescopeClient {
    /// Create a client against the public Descope API
    ///
    /// An empty management key is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the project id is empty or the
    /// HTTP client cannot be initialized.
    pub fn new(project_id: impl Into<String>, management_key: Option<String>) -> Result<Self> {
        Self::with_base_url(project_id, management_key, DEFAULT_BASE_URL)
    }

    /// Create a client against an explicit base URL
    ///
    /// Useful for self-hosted deployments and for pointing tests at a mock
    /// server. A trailing slash on the base URL is ignored.
    pub fn with_base_url(
        project_id: impl Into<String>,
        management_key: Option<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let project_id = project_id.into();
        if project_id.is_empty() {
            return Err(DescopeMcpError::Config("project id must not be empty".to_string()).into());
        }

        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();
        let management_key = management_key.filter(|key| !key.is_empty());

        // Identification headers ride on every request this client sends,
        // JWKS fetches included, so they live on the Client itself.
        let mut headers = HeaderMap::new();
        headers.insert(SDK_NAME_HEADER, HeaderValue::from_static(SDK_NAME));
        headers.insert(
            SDK_VERSION_HEADER,
            HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
        );
        headers.insert(
            PROJECT_ID_HEADER,
            HeaderValue::from_str(&project_id).map_err(|e| {
                DescopeMcpError::Config(format!("project id is not a valid header value: {}", e))
            })?,
        );

        let http = Client::builder()
            .timeout(EXCHANGE_TIMEOUT)
            .user_agent(concat!("descope-mcp/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| {
                DescopeMcpError::Config(format!("failed to create HTTP client: {}", e))
            })?;

        let jwks_url = format!("{}/{}/.well-known/jwks.json", base_url, project_id);
        tracing::debug!(project_id = %project_id, base_url = %base_url, "initialized Descope client");

        Ok(Self {
            project_id,
            management_key,
            base_url,
            http,
            jwks: Arc::new(JwksCache::new(jwks_url)),
        })
    }

    /// Build a client from a [`DescopeConfig`]
    ///
    /// Returns `Ok(None)` when the configuration has no management key, or
    /// when no project id can be extracted from the discovery URL. Callers
    /// that only hold a bearer token do not need a configured client, so
    /// both cases defer to per-call credentials instead of failing.
    pub fn from_config(config: &DescopeConfig) -> Result<Option<Self>> {
        let management_key = match config.management_key.as_deref() {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => {
                tracing::debug!("no management key configured, skipping client construction");
                return Ok(None);
            }
        };

        let project_id = match config.project_id() {
            Some(id) => id,
            None => {
                tracing::warn!(
                    discovery_url = %config.discovery_url,
                    "could not extract a project id from the discovery URL"
                );
                return Ok(None);
            }
        };

        let base_url = config
            .base_url()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Ok(Some(Self::with_base_url(
            project_id,
            Some(management_key),
            base_url,
        )?))
    }

    /// The project id this client is bound to
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// The API base URL this client talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// True when the client can call management endpoints
    pub fn has_management_key(&self) -> bool {
        self.management_key.is_some()
    }

    /// Verify a session token and return its claims
    ///
    /// The token's signature is checked against the project JWKS, and the
    /// `exp` and `aud` claims are enforced (with a small clock skew
    /// tolerance). The audience must match `audience` exactly.
    ///
    /// # Errors
    ///
    /// Returns a provider error describing the failure: a malformed or
    /// mis-signed token, an expired token, an audience mismatch, or an
    /// unreachable key set.
    pub async fn validate_session(&self, session_token: &str, audience: &str) -> Result<ClaimSet> {
        if session_token.is_empty() {
            return Err(
                DescopeMcpError::Provider("invalid session token: token is empty".to_string())
                    .into(),
            );
        }

        let header = decode_header(session_token)
            .map_err(|e| DescopeMcpError::Provider(format!("invalid token header: {}", e)))?;

        if !ALLOWED_ALGORITHMS.contains(&header.alg) {
            return Err(DescopeMcpError::Provider(format!(
                "invalid token algorithm: {:?} is not accepted",
                header.alg
            ))
            .into());
        }

        let kid = match header.kid.as_deref() {
            Some(kid) if !kid.is_empty() => kid,
            _ => {
                return Err(DescopeMcpError::Provider(
                    "invalid token header: missing key id".to_string(),
                )
                .into())
            }
        };

        let jwk = self.jwks.find_key(&self.http, kid).await?;
        if let Some(key_algorithm) = jwk.common.key_algorithm {
            if !algorithm_matches(key_algorithm, header.alg) {
                return Err(DescopeMcpError::Provider(format!(
                    "invalid token: algorithm {:?} does not match signing key '{}'",
                    header.alg, kid
                ))
                .into());
            }
        }

        let decoding_key = DecodingKey::from_jwk(&jwk).map_err(|e| {
            DescopeMcpError::Provider(format!("unusable signing key '{}': {}", kid, e))
        })?;

        let mut validation = Validation::new(header.alg);
        validation.set_audience(&[audience]);
        validation.leeway = CLOCK_SKEW_LEEWAY_SECS;

        let data = decode::<ClaimSet>(session_token, &decoding_key, &validation)
            .map_err(|e| DescopeMcpError::Provider(validation_error_message(&e)))?;

        tracing::debug!(subject = ?data.claims.subject(), "session token validated");
        Ok(data.claims)
    }

    /// Mint a connection token using this client's management key
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the client was built without a
    /// management key, or a provider error when the endpoint rejects the
    /// request.
    pub async fn outbound_app_token(
        &self,
        request: &ConnectionTokenRequest,
    ) -> Result<ConnectionToken> {
        let management_key = match self.management_key.as_deref() {
            Some(key) => key.to_string(),
            None => {
                return Err(DescopeMcpError::Config(
                    "management key required for connection token calls".to_string(),
                )
                .into())
            }
        };
        self.exchange_outbound_token(request, &management_key).await
    }

    /// Mint a user-owned token carrying specific scopes
    ///
    /// An empty scope list falls back to the latest stored token, matching
    /// the management API's scope-presence rule.
    pub async fn user_token(
        &self,
        app_id: &str,
        user_id: &str,
        scopes: &[String],
    ) -> Result<ConnectionToken> {
        let request =
            ConnectionTokenRequest::for_user(app_id, user_id).with_scopes(scopes.iter().cloned());
        self.outbound_app_token(&request).await
    }

    /// Fetch the latest stored user-owned token regardless of scopes
    pub async fn user_token_latest(
        &self,
        app_id: &str,
        user_id: &str,
    ) -> Result<ConnectionToken> {
        self.outbound_app_token(&ConnectionTokenRequest::for_user(app_id, user_id))
            .await
    }

    /// Mint a tenant-owned token carrying specific scopes
    pub async fn tenant_token(
        &self,
        app_id: &str,
        tenant_id: &str,
        scopes: &[String],
    ) -> Result<ConnectionToken> {
        let request = ConnectionTokenRequest::for_tenant(app_id, tenant_id)
            .with_scopes(scopes.iter().cloned());
        self.outbound_app_token(&request).await
    }

    /// Fetch the latest stored tenant-owned token regardless of scopes
    pub async fn tenant_token_latest(
        &self,
        app_id: &str,
        tenant_id: &str,
    ) -> Result<ConnectionToken> {
        self.outbound_app_token(&ConnectionTokenRequest::for_tenant(app_id, tenant_id))
            .await
    }

    /// Mint a connection token authenticating with an explicit credential.
    ///
    /// The Authorization header carries `Bearer {project_id}:{credential}`;
    /// the credential is either a management key or a caller's session
    /// token, depending on the exchange strategy.
    pub(crate) async fn exchange_outbound_token(
        &self,
        request: &ConnectionTokenRequest,
        credential: &str,
    ) -> Result<ConnectionToken> {
        let url = self.endpoint(request.endpoint_path());
        let payload = request.payload();
        tracing::debug!(app_id = %request.app_id, url = %url, "requesting connection token");

        let response = self
            .http
            .post(&url)
            .bearer_auth(format!("{}:{}", self.project_id, credential))
            .json(&payload)
            .timeout(EXCHANGE_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                DescopeMcpError::Provider(format!("connection token request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DescopeMcpError::Provider(format!(
                "connection token endpoint returned {}: {}",
                status, body
            ))
            .into());
        }

        let body: OutboundTokenResponse = response.json().await.map_err(|e| {
            DescopeMcpError::Provider(format!("connection token response malformed: {}", e))
        })?;

        tracing::debug!(app_id = %request.app_id, "connection token issued");
        Ok(ConnectionToken {
            access_token: body.token.access_token,
            app_id: request.app_id.clone(),
            owner_id: request.owner.id().to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Response body of the outbound app token endpoints
#[derive(Debug, Deserialize)]
struct OutboundTokenResponse {
    token: OutboundTokenBody,
}

#[derive(Debug, Deserialize)]
struct OutboundTokenBody {
    #[serde(rename = "accessToken")]
    access_token: String,
}

fn algorithm_matches(key_algorithm: KeyAlgorithm, token_algorithm: Algorithm) -> bool {
    matches!(
        (key_algorithm, token_algorithm),
        (KeyAlgorithm::RS256, Algorithm::RS256)
            | (KeyAlgorithm::RS384, Algorithm::RS384)
            | (KeyAlgorithm::RS512, Algorithm::RS512)
            | (KeyAlgorithm::ES256, Algorithm::ES256)
    )
}

/// Map verification failures to stable, descriptive messages. The wording
/// matters: the session layer classifies errors by these phrases.
fn validation_error_message(err: &jsonwebtoken::errors::Error) -> String {
    use jsonwebtoken::errors::ErrorKind;

    match err.kind() {
        ErrorKind::ExpiredSignature => "token has expired".to_string(),
        ErrorKind::InvalidAudience => "token audience mismatch".to_string(),
        ErrorKind::InvalidSignature => "invalid token signature".to_string(),
        ErrorKind::MissingRequiredClaim(claim) => {
            format!("invalid token: missing required claim '{}'", claim)
        }
        _ => format!("token validation failed: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn now_secs() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before epoch")
            .as_secs() as i64
    }

    fn hs256_token(claims: &serde_json::Value, secret: &[u8]) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret),
        )
        .expect("token must encode")
    }

    fn decode_err(
        token: &str,
        secret: &[u8],
        audience: Option<&str>,
    ) -> jsonwebtoken::errors::Error {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(audience) = audience {
            validation.set_audience(&[audience]);
        }
        decode::<ClaimSet>(token, &DecodingKey::from_secret(secret), &validation)
            .expect_err("decode must fail")
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn test_new_rejects_empty_project_id() {
        let err = DescopeClient::new("", None).unwrap_err();
        assert!(err.to_string().contains("project id must not be empty"));
    }

    #[test]
    fn test_with_base_url_trims_trailing_slash() {
        let client =
            DescopeClient::with_base_url("P2abc", None, "http://127.0.0.1:9000/").unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:9000");
        assert_eq!(
            client.endpoint("/v1/mgmt/outbound/app/user/token"),
            "http://127.0.0.1:9000/v1/mgmt/outbound/app/user/token"
        );
    }

    #[test]
    fn test_empty_management_key_treated_as_absent() {
        let client = DescopeClient::new("P2abc", Some(String::new())).unwrap();
        assert!(!client.has_management_key());
    }

    #[test]
    fn test_debug_redacts_management_key() {
        let client = DescopeClient::new("P2abc", Some("super-secret".to_string())).unwrap();
        let rendered = format!("{:?}", client);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("P2abc"));
    }

    #[test]
    fn test_project_id_must_be_usable_as_a_header_value() {
        let err = DescopeClient::new("P2abc\nX", None).unwrap_err();
        assert!(
            err.to_string().contains("not a valid header value"),
            "got: {}",
            err
        );
    }

    // -----------------------------------------------------------------------
    // from_config
    // -----------------------------------------------------------------------

    #[test]
    fn test_from_config_requires_management_key() {
        let config = DescopeConfig::new("https://api.descope.com/P2abc/.well-known/jwks.json");
        assert!(DescopeClient::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_from_config_requires_extractable_project_id() {
        let config = DescopeConfig::new("https://api.descope.com/").with_management_key("key-1");
        assert!(DescopeClient::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_from_config_binds_project_and_base_url() {
        let config = DescopeConfig::new(
            "http://127.0.0.1:9000/P2abc/.well-known/openid-configuration",
        )
        .with_management_key("key-1");
        let client = DescopeClient::from_config(&config)
            .unwrap()
            .expect("client must be built");
        assert_eq!(client.project_id(), "P2abc");
        assert_eq!(client.base_url(), "http://127.0.0.1:9000");
        assert!(client.has_management_key());
    }

    // -----------------------------------------------------------------------
    // Algorithm checks
    // -----------------------------------------------------------------------

    #[test]
    fn test_algorithm_matches_pairs() {
        assert!(algorithm_matches(KeyAlgorithm::RS256, Algorithm::RS256));
        assert!(algorithm_matches(KeyAlgorithm::ES256, Algorithm::ES256));
        assert!(!algorithm_matches(KeyAlgorithm::RS256, Algorithm::RS512));
        assert!(!algorithm_matches(KeyAlgorithm::ES256, Algorithm::RS256));
    }

    #[test]
    fn test_allowed_algorithms_exclude_hmac() {
        assert!(!ALLOWED_ALGORITHMS.contains(&Algorithm::HS256));
        assert!(ALLOWED_ALGORITHMS.contains(&Algorithm::RS256));
    }

    // -----------------------------------------------------------------------
    // Validation error phrasing
    // -----------------------------------------------------------------------

    #[test]
    fn test_expired_token_message_mentions_expired() {
        let token = hs256_token(
            &json!({"sub": "u", "exp": now_secs() - 3600, "iat": now_secs() - 7200}),
            b"secret",
        );
        let err = decode_err(&token, b"secret", None);
        assert_eq!(validation_error_message(&err), "token has expired");
    }

    #[test]
    fn test_audience_mismatch_message_mentions_audience() {
        let token = hs256_token(
            &json!({"sub": "u", "aud": "other", "exp": now_secs() + 300}),
            b"secret",
        );
        let err = decode_err(&token, b"secret", Some("expected"));
        assert_eq!(validation_error_message(&err), "token audience mismatch");
    }

    #[test]
    fn test_bad_signature_message_mentions_invalid() {
        let token = hs256_token(&json!({"sub": "u", "exp": now_secs() + 300}), b"secret");
        let err = decode_err(&token, b"wrong-secret", None);
        assert_eq!(validation_error_message(&err), "invalid token signature");
    }

    #[test]
    fn test_missing_exp_claim_message_mentions_invalid() {
        let token = hs256_token(&json!({"sub": "u"}), b"secret");
        let err = decode_err(&token, b"secret", None);
        assert_eq!(
            validation_error_message(&err),
            "invalid token: missing required claim 'exp'"
        );
    }

    // -----------------------------------------------------------------------
    // Response deserialization
    // -----------------------------------------------------------------------

    #[test]
    fn test_outbound_token_response_deserializes() {
        let json = r#"{"token": {"accessToken": "downstream-token", "appId": "app-1"}}"#;
        let response: OutboundTokenResponse =
            serde_json::from_str(json).expect("must deserialize");
        assert_eq!(response.token.access_token, "downstream-token");
    }
}
