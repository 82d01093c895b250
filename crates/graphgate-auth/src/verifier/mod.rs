//! # Token Verification
//!
//! One capability, [`TokenVerifier`], with two strategies:
//!
//! - [`SignatureVerifier`] - RS256 signature against the provider key set, then
//!   the claim policy (with `nbf`)
//! - [`ClaimsOnlyVerifier`] - claim policy only; an explicit trust trade-off for
//!   issuers whose tokens are opaque to relying parties
//!
//! Both share [`ClaimPolicy`] for claim extraction and scope checking.
//! [`TokenVerifier::verify`] never fails loudly: a rejected token yields `None`
//! and the reason is logged at `warn`.

mod claims_only;
mod diagnostics;
mod policy;
mod principal;
mod signature;

pub use claims_only::ClaimsOnlyVerifier;
pub use diagnostics::Diagnostics;
pub use policy::ClaimPolicy;
pub use principal::{Principal, UNKNOWN_CLIENT};
pub use signature::{SIGNATURE_ALGORITHM, SignatureVerifier};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::discovery::IdentityMetadata;
use crate::error::Rejection;
use crate::http_client::SharedHttpClient;
use crate::jwt::JwksClient;
use crate::scope::{ScopeNamespace, ScopeSet};

/// Bearer token verification capability
#[async_trait]
pub trait TokenVerifier: Send + Sync + fmt::Debug {
    /// Run every check and explain a rejection
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] of the first failing check.
    async fn check(&self, token: &str) -> Result<Principal, Rejection>;

    /// Strategy implemented by this verifier
    fn strategy(&self) -> VerificationStrategy;

    /// Claim policy applied after decoding
    fn policy(&self) -> &ClaimPolicy;

    /// Verify a token, yielding the principal or `None`
    async fn verify(&self, token: &str) -> Option<Principal> {
        match self.check(token).await {
            Ok(principal) => {
                debug!(
                    strategy = %self.strategy(),
                    client_id = %principal.client_id(),
                    scopes = %principal.scopes(),
                    "Token accepted"
                );
                Some(principal)
            }
            Err(rejection) => {
                warn!(strategy = %self.strategy(), reason = %rejection, "Token rejected");
                None
            }
        }
    }
}

/// How inbound tokens are verified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationStrategy {
    /// Signature checked against the provider key set
    #[default]
    Signature,
    /// Claims read at face value; signature not checked
    ClaimsOnly,
}

impl VerificationStrategy {
    /// Whether scopes are normalized unless configured otherwise
    pub fn normalizes_scopes_by_default(self) -> bool {
        matches!(self, Self::Signature)
    }

    /// Configuration name of the strategy
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Signature => "signature",
            Self::ClaimsOnly => "claims-only",
        }
    }
}

impl fmt::Display for VerificationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verifier construction errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifierConfigError {
    /// Claims-only requested without acknowledging the trust trade-off
    #[error(
        "claims-only verification skips signature checks and requires allow_unverified_signatures"
    )]
    UnverifiedSignaturesNotAllowed,

    /// No audience configured
    #[error("an audience is required")]
    MissingAudience,

    /// No issuer configured for a strategy without a discovered issuer
    #[error("at least one allowed issuer is required for {0} verification")]
    MissingIssuers(VerificationStrategy),

    /// No required scopes configured
    #[error("at least one required scope is required")]
    MissingRequiredScopes,

    /// Normalization enabled with no namespace to normalize into
    #[error("scope normalization requires a non-empty scope namespace")]
    NormalizationWithoutNamespace,
}

/// Everything needed to build a verifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Verification strategy
    pub strategy: VerificationStrategy,
    /// Exact `aud` value
    pub audience: String,
    /// Accepted `iss` values; empty means the discovered issuer (signature only)
    #[serde(default)]
    pub issuers: Vec<String>,
    /// Scopes every token must carry
    pub required_scopes: ScopeSet,
    /// Namespace for short-form scopes
    #[serde(default)]
    pub scope_namespace: Option<ScopeNamespace>,
    /// Normalize token and required scopes against the namespace
    pub normalize_scopes: bool,
    /// Operator acknowledgement of the claims-only trust trade-off
    #[serde(default)]
    pub allow_unverified_signatures: bool,
    /// Log presented versus expected claims at `debug`
    #[serde(default)]
    pub diagnostics: bool,
}

impl VerifierConfig {
    /// Build the configured verifier
    ///
    /// # Errors
    ///
    /// Returns [`VerifierConfigError`] for an empty audience or scope list,
    /// normalization without a namespace, claims-only verification without
    /// `allow_unverified_signatures`, or claims-only without issuers.
    pub fn build(
        &self,
        metadata: &IdentityMetadata,
        http: &SharedHttpClient,
    ) -> Result<Arc<dyn TokenVerifier>, VerifierConfigError> {
        if self.strategy == VerificationStrategy::ClaimsOnly && !self.allow_unverified_signatures {
            return Err(VerifierConfigError::UnverifiedSignaturesNotAllowed);
        }

        let policy = self.policy(metadata)?;

        let verifier: Arc<dyn TokenVerifier> = match self.strategy {
            VerificationStrategy::Signature => Arc::new(
                SignatureVerifier::new(JwksClient::new(&metadata.jwks_uri, http.clone()), policy)
                    .with_diagnostics(self.diagnostics),
            ),
            VerificationStrategy::ClaimsOnly => {
                warn!("Claims-only verification enabled: token signatures are not checked");
                Arc::new(ClaimsOnlyVerifier::new(policy).with_diagnostics(self.diagnostics))
            }
        };

        Ok(verifier)
    }

    /// Required scopes in the form tokens are checked against
    ///
    /// Qualified with the namespace when normalization is on, as written
    /// otherwise.
    pub fn effective_required_scopes(&self) -> ScopeSet {
        match &self.scope_namespace {
            Some(namespace) if self.normalize_scopes && !namespace.is_empty() => {
                self.required_scopes.normalized(namespace)
            }
            _ => self.required_scopes.clone(),
        }
    }

    /// Build the claim policy this configuration describes
    ///
    /// # Errors
    ///
    /// Returns [`VerifierConfigError`] as for [`build`](Self::build), except
    /// for the trust trade-off acknowledgement.
    pub fn policy(&self, metadata: &IdentityMetadata) -> Result<ClaimPolicy, VerifierConfigError> {
        if self.audience.trim().is_empty() {
            return Err(VerifierConfigError::MissingAudience);
        }
        if self.required_scopes.is_empty() {
            return Err(VerifierConfigError::MissingRequiredScopes);
        }

        let issuers = if self.issuers.is_empty() {
            match self.strategy {
                VerificationStrategy::Signature => vec![metadata.issuer.clone()],
                VerificationStrategy::ClaimsOnly => {
                    return Err(VerifierConfigError::MissingIssuers(self.strategy));
                }
            }
        } else {
            self.issuers.clone()
        };

        let policy = ClaimPolicy::new(&self.audience, issuers, self.required_scopes.clone());

        if !self.normalize_scopes {
            return Ok(policy);
        }

        match &self.scope_namespace {
            Some(namespace) if !namespace.is_empty() => {
                Ok(policy.with_scope_namespace(namespace.clone()))
            }
            _ => Err(VerifierConfigError::NormalizationWithoutNamespace),
        }
    }
}
