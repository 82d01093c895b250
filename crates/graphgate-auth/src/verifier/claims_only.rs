//! Claims-only ("opaque token") strategy
//!
//! **Trust trade-off: this strategy does not verify signatures.**
//!
//! Some issuers document their access tokens as opaque to everyone but the
//! resource they were minted for. Microsoft Graph tokens, for example, carry a
//! proof-of-possession `nonce` in the header that makes third-party signature
//! verification fail. A gateway receiving such tokens can only read `exp`,
//! `aud`, `iss` and `scp` at face value.
//!
//! The trade-off is only accepted when the operator sets
//! `allow_unverified_signatures`; see [`VerifierConfig`](super::VerifierConfig).
//! The claim checks themselves are never relaxed: `exp`, `aud` and `iss` are
//! required and the scope check uses AND semantics.

use async_trait::async_trait;

use super::diagnostics::Diagnostics;
use super::policy::ClaimPolicy;
use super::principal::Principal;
use super::{TokenVerifier, VerificationStrategy};
use crate::error::Rejection;
use crate::jwt::{decode_unverified, unix_now};

/// Verifier that trusts decoded claims without checking the signature
#[derive(Debug, Clone)]
pub struct ClaimsOnlyVerifier {
    policy: ClaimPolicy,
    diagnostics: Option<Diagnostics>,
}

impl ClaimsOnlyVerifier {
    /// Create a verifier over a claim policy
    ///
    /// The policy is applied as given. `nbf` is only checked when the policy
    /// was built with [`ClaimPolicy::with_not_before`]; the policy from
    /// [`VerifierConfig`](super::VerifierConfig) leaves it off.
    pub fn new(policy: ClaimPolicy) -> Self {
        Self {
            policy,
            diagnostics: None,
        }
    }

    /// Enable presented-versus-expected claim logging
    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled.then(|| Diagnostics::for_policy(&self.policy));
        self
    }
}

#[async_trait]
impl TokenVerifier for ClaimsOnlyVerifier {
    async fn check(&self, token: &str) -> Result<Principal, Rejection> {
        if let Some(diagnostics) = &self.diagnostics {
            diagnostics.log_presented(token);
        }

        // Signature deliberately not checked (see module docs)
        let claims = decode_unverified(token)?;
        self.policy.evaluate(token, claims, unix_now())
    }

    fn strategy(&self) -> VerificationStrategy {
        VerificationStrategy::ClaimsOnly
    }

    fn policy(&self) -> &ClaimPolicy {
        &self.policy
    }
}
