//! Process-wide configuration context
//!
//! Most MCP servers talk to exactly one Descope project, so the SDK keeps a
//! single optional context: call [`init`] once at startup and every entry
//! point that takes an optional client or audience falls back to it.
//! Servers juggling several projects skip [`init`] and pass explicit values
//! instead.
//!
//! The context is guarded by a `std::sync::RwLock`; reads are soft and
//! return `None` if the lock is poisoned, so a panicked writer cannot take
//! the whole process down with it.

use std::sync::RwLock;

use crate::client::DescopeClient;
use crate::config::DescopeConfig;
use crate::error::{DescopeMcpError, Result};

static CONTEXT: RwLock<Option<DescopeContext>> = RwLock::new(None);

#[derive(Debug, Clone)]
struct DescopeContext {
    config: DescopeConfig,
    client: Option<DescopeClient>,
    audience: String,
}

/// Initialize the global context from a configuration
///
/// Validates the configuration, builds a management client when a
/// management key is present, and resolves the audience (explicit value or
/// the discovery URL). Calling [`init`] again replaces the previous
/// context.
///
/// # Errors
///
/// Returns a configuration error when the configuration is invalid; the
/// existing context is left untouched in that case.
///
/// # Examples
///
/// ```no_run
/// use descope_mcp::DescopeConfig;
///
/// # fn example() -> descope_mcp::Result<()> {
/// let config = DescopeConfig::new(
///     "https://api.descope.com/P2abc/.well-known/openid-configuration",
/// )
/// .with_management_key("management-key");
/// descope_mcp::init(config)?;
/// # Ok(())
/// # }
/// ```
pub fn init(config: DescopeConfig) -> Result<()> {
    config.validate()?;
    let client = DescopeClient::from_config(&config)?;
    let audience = config.audience().to_string();

    let mut guard = CONTEXT
        .write()
        .map_err(|_| DescopeMcpError::Config("failed to acquire context lock".to_string()))?;
    tracing::info!(
        audience = %audience,
        management = client.is_some(),
        "Descope context initialized"
    );
    *guard = Some(DescopeContext {
        config,
        client,
        audience,
    });
    Ok(())
}

/// Clear the global context
///
/// Subsequent calls that rely on the context fail with configuration
/// errors until [`init`] is called again.
pub fn reset() {
    if let Ok(mut guard) = CONTEXT.write() {
        *guard = None;
        tracing::debug!("Descope context cleared");
    }
}

/// The context's management client, when one is configured
pub fn current_client() -> Option<DescopeClient> {
    current().and_then(|ctx| ctx.client)
}

/// The context's configuration
pub fn current_config() -> Option<DescopeConfig> {
    current().map(|ctx| ctx.config)
}

/// The audience tokens are validated against
pub fn current_audience() -> Option<String> {
    current().map(|ctx| ctx.audience)
}

/// Project id known to the context, preferring the client's binding over
/// one re-derived from the configuration
pub(crate) fn current_project_id() -> Option<String> {
    current().and_then(|ctx| match ctx.client.as_ref() {
        Some(client) => Some(client.project_id().to_string()),
        None => ctx.config.project_id(),
    })
}

/// API base URL known to the context
pub(crate) fn current_base_url() -> Option<String> {
    current().and_then(|ctx| match ctx.client.as_ref() {
        Some(client) => Some(client.base_url().to_string()),
        None => ctx.config.base_url(),
    })
}

fn current() -> Option<DescopeContext> {
    if let Ok(guard) = CONTEXT.read() {
        guard.clone()
    } else {
        None
    }
}
