//! Discovery document loader

use tracing::{debug, error, info};
use url::Url;

use super::types::IdentityMetadata;
use crate::error::MetadataLoadError;
use crate::http_client::{SharedHttpClient, is_secure_or_loopback};

/// Public cloud authority
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Path appended to `{authority}/{tenant}`
pub const DISCOVERY_PATH: &str = "v2.0/.well-known/openid-configuration";

/// Loads [`IdentityMetadata`] for a tenant
#[derive(Debug, Clone)]
pub struct MetadataLoader {
    http: SharedHttpClient,
    authority: Url,
}

impl MetadataLoader {
    /// Create a loader for an authority base URL
    ///
    /// # Errors
    ///
    /// Returns [`MetadataLoadError::InvalidAuthority`] if the authority is not a
    /// URL, or is plain HTTP to a non-loopback host.
    pub fn new(http: SharedHttpClient, authority: &str) -> Result<Self, MetadataLoadError> {
        let authority = Url::parse(authority.trim_end_matches('/'))
            .map_err(|e| MetadataLoadError::InvalidAuthority(format!("{authority}: {e}")))?;

        if !is_secure_or_loopback(&authority) {
            return Err(MetadataLoadError::InvalidAuthority(format!(
                "{authority} must use HTTPS"
            )));
        }

        Ok(Self { http, authority })
    }

    /// Authority base URL without trailing separator
    pub fn authority(&self) -> &str {
        self.authority.as_str().trim_end_matches('/')
    }

    /// Discovery document location for a tenant
    ///
    /// # Errors
    ///
    /// Returns [`MetadataLoadError::InvalidTenant`] for an empty tenant or one
    /// containing characters that would escape its path segment.
    pub fn discovery_url(&self, tenant: &str) -> Result<String, MetadataLoadError> {
        validate_tenant(tenant)?;
        Ok(format!("{}/{}/{}", self.authority(), tenant, DISCOVERY_PATH))
    }

    /// Fetch and validate the tenant's discovery document
    ///
    /// # Errors
    ///
    /// Returns [`MetadataLoadError`] on an invalid tenant, transport failure,
    /// non-success status, or a document lacking `issuer`, `jwks_uri` or
    /// `token_endpoint`.
    pub async fn load(&self, tenant: &str) -> Result<IdentityMetadata, MetadataLoadError> {
        let url = self.discovery_url(tenant)?;
        let client = self.http.get()?;

        info!(discovery_url = %url, "Loading identity provider metadata");

        let response = client.get(&url).send().await.map_err(|e| {
            error!(discovery_url = %url, error = %e, "Discovery request failed");
            MetadataLoadError::Request(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(discovery_url = %url, status = %status, "Discovery endpoint returned error status");
            return Err(MetadataLoadError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| MetadataLoadError::Request(format!("Failed to read response: {e}")))?;

        let metadata: IdentityMetadata = serde_json::from_slice(&body).map_err(|e| {
            error!(discovery_url = %url, error = %e, "Discovery document did not parse");
            MetadataLoadError::Malformed(e.to_string())
        })?;
        metadata.validate()?;

        debug!(
            jwks_uri = %metadata.jwks_uri,
            token_endpoint = %metadata.token_endpoint,
            "Discovery endpoints resolved"
        );
        info!(issuer = %metadata.issuer, "Identity provider metadata loaded");

        Ok(metadata)
    }
}

fn validate_tenant(tenant: &str) -> Result<(), MetadataLoadError> {
    let valid = !tenant.is_empty()
        && tenant
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'));

    if valid {
        Ok(())
    } else {
        Err(MetadataLoadError::InvalidTenant(tenant.to_string()))
    }
}
