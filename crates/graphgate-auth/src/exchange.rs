//! On-behalf-of token exchange
//!
//! Trades a verified inbound token for one scoped to a downstream resource,
//! using the JWT-bearer grant with `requested_token_use=on_behalf_of`:
//!
//! ```text
//! POST {token_endpoint}
//! grant_type=urn:ietf:params:oauth:grant-type:jwt-bearer
//! assertion=<inbound token>
//! requested_token_use=on_behalf_of
//! scope=<space-joined target scopes>
//! client_id=<client id>
//! client_secret=<client secret>
//! ```
//!
//! The response body decides the outcome regardless of HTTP status. There is
//! no retry and no caching; every call performs a fresh exchange.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::discovery::IdentityMetadata;
use crate::error::{EXCHANGE_FAILED, ExchangeFailure, INVALID_RESPONSE};
use crate::http_client::SharedHttpClient;
use crate::jwt::unix_now;
use crate::scope::ScopeSet;

/// JWT-bearer assertion grant type
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// `requested_token_use` value for delegated exchange
pub const ON_BEHALF_OF: &str = "on_behalf_of";

/// Outcome of an exchange; success and failure are disjoint
pub type ExchangeResult = Result<ExchangedToken, ExchangeFailure>;

/// Relying party client credentials
#[derive(Clone)]
pub struct ClientCredentials {
    client_id: String,
    client_secret: SecretString,
}

impl ClientCredentials {
    /// Create credentials
    pub fn new(client_id: impl Into<String>, client_secret: SecretString) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
        }
    }

    /// Client id
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Downstream token obtained by an exchange
#[derive(Clone)]
pub struct ExchangedToken {
    access_token: SecretString,
    expires_at: Option<u64>,
    scope: Option<String>,
}

impl ExchangedToken {
    /// The downstream bearer token
    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    /// Expiry in seconds since the epoch, when the provider reported one
    pub fn expires_at(&self) -> Option<u64> {
        self.expires_at
    }

    /// Scopes granted, as reported by the provider
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }
}

impl fmt::Debug for ExchangedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangedToken")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Token endpoint response body
#[derive(Deserialize)]
struct TokenEndpointResponse {
    access_token: Option<String>,
    expires_in: Option<Value>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl TokenEndpointResponse {
    fn into_result(self, now: u64) -> ExchangeResult {
        match self.access_token {
            Some(access_token) if self.error.is_none() && !access_token.is_empty() => {
                let expires_in = self.expires_in.as_ref().and_then(|value| {
                    value
                        .as_u64()
                        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
                });
                Ok(ExchangedToken {
                    access_token: SecretString::new(access_token),
                    expires_at: expires_in.map(|secs| now.saturating_add(secs)),
                    scope: self.scope,
                })
            }
            _ => Err(ExchangeFailure::new(
                self.error.unwrap_or_else(|| EXCHANGE_FAILED.to_string()),
                self.error_description,
            )),
        }
    }
}

/// Delegated exchange against a provider token endpoint
#[derive(Debug, Clone)]
pub struct OnBehalfOfExchange {
    token_endpoint: String,
    credentials: ClientCredentials,
    http: SharedHttpClient,
}

impl OnBehalfOfExchange {
    /// Create an exchange engine for a token endpoint
    pub fn new(
        token_endpoint: impl Into<String>,
        credentials: ClientCredentials,
        http: SharedHttpClient,
    ) -> Self {
        Self {
            token_endpoint: token_endpoint.into(),
            credentials,
            http,
        }
    }

    /// Create an exchange engine for the discovered token endpoint
    pub fn from_metadata(
        metadata: &IdentityMetadata,
        credentials: ClientCredentials,
        http: SharedHttpClient,
    ) -> Self {
        Self::new(&metadata.token_endpoint, credentials, http)
    }

    /// Token endpoint in use
    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    /// Exchange `assertion` for a token carrying `target_scopes`
    pub async fn exchange(&self, assertion: &str, target_scopes: &ScopeSet) -> ExchangeResult {
        let client = self
            .http
            .get()
            .map_err(|e| ExchangeFailure::transport(e.to_string()))?;

        let scope = target_scopes.to_string();
        let params = [
            ("grant_type", JWT_BEARER_GRANT),
            ("assertion", assertion),
            ("requested_token_use", ON_BEHALF_OF),
            ("scope", scope.as_str()),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.expose_secret().as_str()),
        ];

        debug!(
            token_endpoint = %self.token_endpoint,
            scope = %scope,
            "Requesting on-behalf-of token"
        );

        let response = client
            .post(&self.token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                error!(token_endpoint = %self.token_endpoint, error = %e, "Token endpoint request failed");
                ExchangeFailure::transport(e.to_string())
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            error!(token_endpoint = %self.token_endpoint, error = %e, "Failed to read token response");
            ExchangeFailure::transport(e.to_string())
        })?;

        let parsed: TokenEndpointResponse = serde_json::from_slice(&body).map_err(|e| {
            warn!(status = %status, error = %e, "Token endpoint returned a non-JSON body");
            ExchangeFailure::new(
                INVALID_RESPONSE,
                Some(format!("token endpoint returned status {status} with unparsable body")),
            )
        })?;

        match parsed.into_result(unix_now()) {
            Ok(token) => {
                info!(
                    expires_at = ?token.expires_at(),
                    scope = ?token.scope(),
                    "On-behalf-of exchange succeeded"
                );
                Ok(token)
            }
            Err(failure) => {
                warn!(
                    status = %status,
                    error = %failure.error,
                    description = ?failure.description,
                    "On-behalf-of exchange failed"
                );
                Err(failure)
            }
        }
    }
}
