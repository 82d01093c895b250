//! Error types for the gateway
//!
//! - [`ConfigError`]: invalid settings; fatal, prevents startup
//! - [`UpstreamApiError`]: downstream API failures; surfaced to the tool caller
//! - [`GatewayError`]: top-level error for `main` and tool dispatch, wrapping
//!   the above and the core's [`MetadataLoadError`] and [`ExchangeFailure`]

use graphgate_auth::{ExchangeFailure, HttpClientError, MetadataLoadError, VerifierConfigError};
use thiserror::Error;

/// Result type for gateway operations
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Invalid or incomplete configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting is absent or blank
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    /// Client id needed by the chosen verification or downstream mode
    #[error("--client-id (AZURE_CLIENT_ID) is required for {0}")]
    MissingClientId(&'static str),

    /// On-behalf-of needs the relying party's secret
    #[error("--client-secret (AZURE_CLIENT_SECRET) is required for on-behalf-of exchange")]
    MissingClientSecret,

    /// Claims-only requested without acknowledging the trust trade-off
    #[error(
        "claims-only verification skips signature checks; pass --allow-unverified-signatures to accept this"
    )]
    UnverifiedSignaturesNotAcknowledged,

    /// Nothing to require of inbound tokens
    #[error("at least one required scope must be configured")]
    EmptyRequiredScopes,

    /// Nothing to request from the token endpoint
    #[error("at least one downstream scope must be configured for on-behalf-of exchange")]
    EmptyDownstreamScopes,

    /// Normalization enabled with no namespace available
    #[error("scope normalization needs --scope-namespace or --client-id")]
    MissingScopeNamespace,

    /// A URL setting does not parse
    #[error("invalid URL for {field}: {value} ({reason})")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },

    /// Outbound calls would never time out
    #[error("--http-timeout-secs must be greater than zero")]
    ZeroTimeout,

    /// Verifier rejected the derived settings
    #[error(transparent)]
    Verifier(#[from] VerifierConfigError),
}

impl ConfigError {
    /// Create an invalid URL error
    pub fn invalid_url(
        field: &'static str,
        value: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::InvalidUrl {
            field,
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}

/// Downstream API call failed
#[derive(Error, Debug)]
pub enum UpstreamApiError {
    /// Non-success status; never retried
    #[error("downstream API returned status {status}")]
    Status { status: u16, body: Option<String> },

    /// Network failure or timeout
    #[error("downstream request failed: {0}")]
    Request(String),

    /// Body is not JSON
    #[error("downstream API returned invalid JSON: {0}")]
    InvalidJson(String),

    /// Shared HTTP client unavailable
    #[error(transparent)]
    Http(#[from] HttpClientError),
}

impl UpstreamApiError {
    /// HTTP status of the failure, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Main error type for the gateway
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Identity provider metadata could not be loaded
    #[error("identity provider metadata unavailable: {0}")]
    Metadata(#[from] MetadataLoadError),

    /// On-behalf-of exchange produced no token
    #[error("on-behalf-of exchange failed: {0}")]
    Exchange(#[from] ExchangeFailure),

    /// Downstream API failure
    #[error("{0}")]
    Upstream(#[from] UpstreamApiError),

    /// Tool received arguments it cannot use or produced no result
    #[error("tool error: {message}")]
    Tool { message: String },

    /// Listener or signal handling failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Create a tool error
    pub fn tool(message: impl Into<String>) -> Self {
        Self::Tool {
            message: message.into(),
        }
    }

    /// Process exit code for a fatal error
    pub fn exit_code(&self) -> u8 {
        1
    }
}
