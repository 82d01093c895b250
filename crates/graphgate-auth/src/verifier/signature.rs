//! Signature-verified strategy
//!
//! Verifies the RS256 signature against the provider's published key set,
//! then applies the shared [`ClaimPolicy`] with `nbf` enforcement. Temporal,
//! audience and issuer checks are done by the policy rather than by
//! `jsonwebtoken`, so both strategies reject for identical reasons.

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation, decode, decode_header};
use tracing::debug;

use super::diagnostics::Diagnostics;
use super::policy::ClaimPolicy;
use super::principal::Principal;
use super::{TokenVerifier, VerificationStrategy};
use crate::error::Rejection;
use crate::jwt::{ClaimMap, JwksClient, unix_now};

/// The only accepted signing algorithm
pub const SIGNATURE_ALGORITHM: Algorithm = Algorithm::RS256;

/// Verifier for tokens whose signature can be checked by a relying party
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    jwks: JwksClient,
    policy: ClaimPolicy,
    diagnostics: Option<Diagnostics>,
}

impl SignatureVerifier {
    /// Create a verifier over a key set client and a claim policy
    ///
    /// `nbf` is always enforced in this strategy, whatever the policy says.
    pub fn new(jwks: JwksClient, policy: ClaimPolicy) -> Self {
        Self {
            jwks,
            policy: policy.with_not_before(true),
            diagnostics: None,
        }
    }

    /// Enable presented-versus-expected claim logging
    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled.then(|| Diagnostics::for_policy(&self.policy));
        self
    }

    /// Key set client
    pub fn jwks(&self) -> &JwksClient {
        &self.jwks
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(SIGNATURE_ALGORITHM);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        validation.leeway = 0;
        validation
    }
}

#[async_trait]
impl TokenVerifier for SignatureVerifier {
    async fn check(&self, token: &str) -> Result<Principal, Rejection> {
        if let Some(diagnostics) = &self.diagnostics {
            diagnostics.log_presented(token);
        }

        if token.is_empty() {
            return Err(Rejection::Empty);
        }

        let header = decode_header(token).map_err(|e| Rejection::Malformed(e.to_string()))?;

        if header.alg != SIGNATURE_ALGORITHM {
            return Err(Rejection::UnsupportedAlgorithm(format!("{:?}", header.alg)));
        }

        let kid = header.kid.ok_or(Rejection::MissingKeyId)?;
        let key = self.jwks.decoding_key(&kid).await?;

        let data = decode::<ClaimMap>(token, &key, &Self::validation()).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => Rejection::InvalidSignature(e.to_string()),
                _ => Rejection::Malformed(e.to_string()),
            }
        })?;

        debug!(kid = %kid, "Token signature verified");
        self.policy.evaluate(token, data.claims, unix_now())
    }

    fn strategy(&self) -> VerificationStrategy {
        VerificationStrategy::Signature
    }

    fn policy(&self) -> &ClaimPolicy {
        &self.policy
    }
}
