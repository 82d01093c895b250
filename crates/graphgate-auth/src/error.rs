//! Failure classes of the verify/exchange core
//!
//! - [`MetadataLoadError`] is fatal to startup.
//! - [`Rejection`] explains why a token was not accepted. It never crosses the
//!   [`TokenVerifier::verify`](crate::TokenVerifier::verify) boundary as an
//!   error; callers only see `None`.
//! - [`ExchangeFailure`] is a request-scoped value returned by the
//!   on-behalf-of exchange.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http_client::HttpClientError;

/// Identity provider discovery failed. The process must not start serving.
#[derive(Debug, Error)]
pub enum MetadataLoadError {
    /// Tenant identifier cannot be placed in a discovery URL
    #[error("Invalid tenant identifier: {0}")]
    InvalidTenant(String),

    /// Authority URL is malformed or not HTTPS
    #[error("Invalid authority URL: {0}")]
    InvalidAuthority(String),

    /// Network failure or timeout
    #[error("Discovery request failed: {0}")]
    Request(String),

    /// Discovery endpoint answered with a non-success status
    #[error("Discovery endpoint returned status {0}")]
    Status(u16),

    /// Document is not JSON or lacks a required field
    #[error("Malformed discovery document: {0}")]
    Malformed(String),

    /// Shared HTTP client unavailable
    #[error(transparent)]
    Http(#[from] HttpClientError),
}

/// Reason a token was rejected by a verifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Empty bearer string
    #[error("Token is empty")]
    Empty,

    /// Not a compact JWS or payload is not a JSON object
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// Header algorithm differs from the fixed verification algorithm
    #[error("Algorithm {0} is not accepted")]
    UnsupportedAlgorithm(String),

    /// Header carries no `kid`
    #[error("Token header has no key id")]
    MissingKeyId,

    /// Key set could not be fetched
    #[error("Signing key set unavailable: {0}")]
    KeySetUnavailable(String),

    /// `kid` not present in the key set, even after a refresh
    #[error("Key id '{0}' not found in signing key set")]
    UnknownKey(String),

    /// Signature did not verify
    #[error("Signature verification failed: {0}")]
    InvalidSignature(String),

    /// A required claim is absent or has the wrong type
    #[error("Missing or invalid claim '{0}'")]
    MissingClaim(&'static str),

    /// `exp` is at or before the current time
    #[error("Token expired")]
    Expired,

    /// `nbf` is after the current time
    #[error("Token is not yet valid")]
    NotYetValid,

    /// `aud` does not equal the configured audience
    #[error("Audience mismatch")]
    AudienceMismatch,

    /// `iss` is not in the allow-list
    #[error("Issuer '{0}' is not allowed")]
    IssuerNotAllowed(String),

    /// Token scopes are not a superset of the required scopes
    #[error("Missing required scopes: {0}")]
    MissingScopes(String),
}

/// Generic code used when the token endpoint gives no `error` field
pub const EXCHANGE_FAILED: &str = "exchange_failed";

/// Code used when the token endpoint could not be reached
pub const TRANSPORT_ERROR: &str = "transport_error";

/// Code used when the token endpoint body is not JSON
pub const INVALID_RESPONSE: &str = "invalid_response";

/// The on-behalf-of exchange produced no token
///
/// Carries the provider's `error` and `error_description` when it supplied
/// them, or one of the generic codes of this module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeFailure {
    /// Provider error code (e.g. `invalid_grant`)
    pub error: String,
    /// Human readable description from the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ExchangeFailure {
    /// Create a failure with a code and optional description
    pub fn new(error: impl Into<String>, description: Option<String>) -> Self {
        Self {
            error: error.into(),
            description,
        }
    }

    /// Failure raised before any provider answer was read
    pub fn transport(description: impl Into<String>) -> Self {
        Self::new(TRANSPORT_ERROR, Some(description.into()))
    }
}

impl fmt::Display for ExchangeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{}: {}", self.error, description),
            None => f.write_str(&self.error),
        }
    }
}

impl std::error::Error for ExchangeFailure {}
