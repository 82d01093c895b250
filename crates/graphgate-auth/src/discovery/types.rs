//! Discovery document types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::MetadataLoadError;
use crate::http_client::is_secure_or_loopback;

/// Identity provider metadata from an OpenID Connect discovery document
///
/// Only the fields the gateway consumes are typed; everything else is kept in
/// [`additional_fields`](Self::additional_fields).
///
/// ```json
/// {
///   "issuer": "https://login.microsoftonline.com/{tenant}/v2.0",
///   "jwks_uri": "https://login.microsoftonline.com/{tenant}/discovery/v2.0/keys",
///   "token_endpoint": "https://login.microsoftonline.com/{tenant}/oauth2/v2.0/token",
///   "authorization_endpoint": "https://login.microsoftonline.com/{tenant}/oauth2/v2.0/authorize"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdentityMetadata {
    /// Issuer identifier
    pub issuer: String,

    /// Signing key set location
    pub jwks_uri: String,

    /// Token endpoint used for the on-behalf-of exchange
    pub token_endpoint: String,

    /// Interactive authorization endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,

    /// Signing algorithms the provider uses for ID tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token_signing_alg_values_supported: Option<Vec<String>>,

    /// Scopes the provider advertises
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    /// Additional metadata fields
    #[serde(flatten)]
    pub additional_fields: HashMap<String, serde_json::Value>,
}

impl IdentityMetadata {
    /// Check that the consumed endpoints are usable
    ///
    /// # Errors
    ///
    /// Returns [`MetadataLoadError::Malformed`] if a field is empty, not a URL,
    /// or neither HTTPS nor loopback HTTP.
    pub fn validate(&self) -> Result<(), MetadataLoadError> {
        if self.issuer.trim().is_empty() {
            return Err(MetadataLoadError::Malformed("issuer is empty".to_string()));
        }

        for (field, value) in [
            ("jwks_uri", &self.jwks_uri),
            ("token_endpoint", &self.token_endpoint),
        ] {
            let url = Url::parse(value).map_err(|e| {
                MetadataLoadError::Malformed(format!("{field} is not a valid URL: {e}"))
            })?;
            if !is_secure_or_loopback(&url) {
                return Err(MetadataLoadError::Malformed(format!(
                    "{field} must use HTTPS: {value}"
                )));
            }
        }

        Ok(())
    }
}
