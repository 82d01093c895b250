//! Downstream resource API client and credential selection

use secrecy::SecretString;
use serde_json::Value;
use tracing::{debug, warn};

use graphgate_auth::{ExchangeFailure, OnBehalfOfExchange, Principal, ScopeSet, SharedHttpClient};

use crate::error::UpstreamApiError;

/// Longest downstream error body kept for logging
const MAX_ERROR_BODY: usize = 512;

/// Authenticated JSON client for the downstream API
#[derive(Debug, Clone)]
pub struct DownstreamClient {
    base_url: String,
    http: SharedHttpClient,
}

impl DownstreamClient {
    /// Create a client for a base URL such as `https://graph.microsoft.com/v1.0`
    pub fn new(base_url: impl Into<String>, http: SharedHttpClient) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET {base}{path}` with a bearer token, returning the JSON body
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamApiError`] on transport failure, any non-2xx status,
    /// or a body that is not JSON. Nothing is retried.
    pub async fn get_json(&self, token: &str, path: &str) -> Result<Value, UpstreamApiError> {
        let url = format!("{}{}", self.base_url, path);
        let client = self.http.get()?;

        debug!(url = %url, "Calling downstream API");

        let response = client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| UpstreamApiError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok().map(|mut body| {
                if body.len() > MAX_ERROR_BODY {
                    let mut cut = MAX_ERROR_BODY;
                    while !body.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    body.truncate(cut);
                }
                body
            });
            warn!(url = %url, status = %status, "Downstream API returned error status");
            return Err(UpstreamApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| UpstreamApiError::InvalidJson(e.to_string()))
    }
}

/// Where the downstream bearer token comes from
#[derive(Debug, Clone)]
pub enum DownstreamCredentials {
    /// Forward the verified inbound token
    PassThrough,
    /// Exchange the inbound token for one carrying `scopes`, on every call
    OnBehalfOf {
        exchange: OnBehalfOfExchange,
        scopes: ScopeSet,
    },
}

impl DownstreamCredentials {
    /// Token to present downstream on behalf of `principal`
    ///
    /// # Errors
    ///
    /// Returns the [`ExchangeFailure`] when the on-behalf-of exchange yields
    /// no token.
    pub async fn token_for(&self, principal: &Principal) -> Result<SecretString, ExchangeFailure> {
        match self {
            Self::PassThrough => Ok(SecretString::new(principal.token().to_string())),
            Self::OnBehalfOf { exchange, scopes } => {
                let exchanged = exchange.exchange(principal.token(), scopes).await?;
                Ok(SecretString::new(exchanged.access_token().to_string()))
            }
        }
    }

    /// Mode name for logs
    pub fn mode(&self) -> &'static str {
        match self {
            Self::PassThrough => "pass-through",
            Self::OnBehalfOf { .. } => "on-behalf-of",
        }
    }
}
