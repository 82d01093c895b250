//! # graphgate-auth - Token Verification and On-Behalf-Of Exchange
//!
//! The verify/exchange core of a relying-party gateway: accept a bearer token
//! issued by one identity domain, establish that it is genuine and carries the
//! required scopes, and trade it for a token scoped to a downstream resource
//! without the user signing in again.
//!
//! ## Architecture
//!
//! - [`http_client`] - Shared, lazily constructed HTTP client handle with a single-release teardown
//! - [`discovery`] - Identity provider metadata loading (OpenID Connect discovery)
//! - [`scope`] - Typed scopes and short-form to qualified normalization
//! - [`jwt`] - Key set fetching and unverified claim decoding
//! - [`verifier`] - The [`TokenVerifier`] capability and its two strategies
//! - [`exchange`] - Delegated ("on-behalf-of") token exchange
//! - [`error`] - Failure classes of the core
//!
//! ## Flow
//!
//! ```text
//! bearer token ──► TokenVerifier ──► Principal ──┬──► (pass-through) token
//!                   │      │                     └──► OnBehalfOfExchange ──► downstream token
//!                   │      └── ScopeNamespace normalization
//!                   └── IdentityMetadata (issuer, jwks_uri, token_endpoint)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use graphgate_auth::{
//!     MetadataLoader, ScopeNamespace, ScopeSet, SharedHttpClient, VerificationStrategy,
//!     VerifierConfig,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let http = SharedHttpClient::new(Duration::from_secs(30));
//! let loader = MetadataLoader::new(http.clone(), graphgate_auth::discovery::DEFAULT_AUTHORITY)?;
//! let metadata = loader.load("contoso.onmicrosoft.com").await?;
//!
//! let config = VerifierConfig {
//!     strategy: VerificationStrategy::Signature,
//!     audience: "11111111-2222-3333-4444-555555555555".to_string(),
//!     issuers: vec![],
//!     required_scopes: ScopeSet::parse("access_as_user"),
//!     scope_namespace: Some(ScopeNamespace::new("api://11111111-2222-3333-4444-555555555555")),
//!     normalize_scopes: true,
//!     allow_unverified_signatures: false,
//!     diagnostics: false,
//! };
//! let verifier = config.build(&metadata, &http)?;
//!
//! if let Some(principal) = verifier.verify("eyJ0eXAi...").await {
//!     println!("verified client {}", principal.client_id());
//! }
//! http.close();
//! # Ok(())
//! # }
//! ```

pub mod discovery;
pub mod error;
pub mod exchange;
pub mod http_client;
pub mod jwt;
pub mod scope;
pub mod verifier;

pub use discovery::{IdentityMetadata, MetadataLoader};
pub use error::{ExchangeFailure, MetadataLoadError, Rejection};
pub use exchange::{ClientCredentials, ExchangeResult, ExchangedToken, OnBehalfOfExchange};
pub use http_client::{HttpClientError, SharedHttpClient};
pub use scope::{Scope, ScopeNamespace, ScopeSet, normalize};
pub use verifier::{
    ClaimPolicy, ClaimsOnlyVerifier, Principal, SignatureVerifier, TokenVerifier,
    VerificationStrategy, VerifierConfig, VerifierConfigError,
};
