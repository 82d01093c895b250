//! RFC 9728 protected resource metadata

use serde::{Deserialize, Serialize};

use crate::config::GatewayConfig;

/// Only bearer method the gateway accepts
pub const BEARER_METHOD_HEADER: &str = "header";

/// Document served at `/.well-known/oauth-protected-resource`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    /// Resource identifier (the gateway's public base URL)
    pub resource: String,
    /// Authorization servers that issue tokens for this resource
    pub authorization_servers: Vec<String>,
    /// Scopes a token must carry, in the form tokens are checked against
    pub scopes_supported: Vec<String>,
    /// How the bearer token is presented
    pub bearer_methods_supported: Vec<String>,
    /// Human readable resource name
    pub resource_name: String,
}

impl ProtectedResourceMetadata {
    /// Describe the configured gateway
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            resource: config.base_url.clone(),
            authorization_servers: vec![config.authorization_server()],
            scopes_supported: config.verifier.effective_required_scopes().to_strings(),
            bearer_methods_supported: vec![BEARER_METHOD_HEADER.to_string()],
            resource_name: config.resource_name.clone(),
        }
    }
}
