//! Claim checks shared by both verification strategies

use serde_json::Value;

use super::principal::Principal;
use crate::error::Rejection;
use crate::jwt::ClaimMap;
use crate::scope::{ScopeNamespace, ScopeSet};

/// Temporal, audience, issuer and scope policy applied to decoded claims
///
/// Checks run in a fixed order and stop at the first failure:
/// `exp`, `nbf` (when enforced), `aud`, `iss`, `scp`.
#[derive(Debug, Clone)]
pub struct ClaimPolicy {
    audience: String,
    issuers: Vec<String>,
    required_scopes: ScopeSet,
    scope_namespace: Option<ScopeNamespace>,
    enforce_not_before: bool,
}

impl ClaimPolicy {
    /// Policy with exact audience, issuer allow-list and required scopes
    pub fn new(
        audience: impl Into<String>,
        issuers: impl IntoIterator<Item = impl Into<String>>,
        required_scopes: ScopeSet,
    ) -> Self {
        Self {
            audience: audience.into(),
            issuers: issuers.into_iter().map(Into::into).collect(),
            required_scopes,
            scope_namespace: None,
            enforce_not_before: false,
        }
    }

    /// Normalize token scopes (and the required scopes) against a namespace
    pub fn with_scope_namespace(mut self, namespace: ScopeNamespace) -> Self {
        self.required_scopes = self.required_scopes.normalized(&namespace);
        self.scope_namespace = Some(namespace);
        self
    }

    /// Reject tokens whose `nbf` lies in the future
    pub fn with_not_before(mut self, enforce: bool) -> Self {
        self.enforce_not_before = enforce;
        self
    }

    /// Whether a future `nbf` is rejected
    pub fn enforces_not_before(&self) -> bool {
        self.enforce_not_before
    }

    /// Expected audience
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Accepted issuers
    pub fn issuers(&self) -> &[String] {
        &self.issuers
    }

    /// Scopes every token must carry, in comparison form
    pub fn required_scopes(&self) -> &ScopeSet {
        &self.required_scopes
    }

    /// Namespace used for normalization, if enabled
    pub fn scope_namespace(&self) -> Option<&ScopeNamespace> {
        self.scope_namespace.as_ref()
    }

    /// Whether token scopes are normalized before comparison
    pub fn normalizes_scopes(&self) -> bool {
        self.scope_namespace.is_some()
    }

    /// Scopes presented by a claim map, normalized when enabled
    pub fn presented_scopes(&self, claims: &ClaimMap) -> ScopeSet {
        let presented = claims
            .get("scp")
            .and_then(Value::as_str)
            .map(ScopeSet::parse)
            .unwrap_or_default();

        match &self.scope_namespace {
            Some(namespace) => presented.normalized(namespace),
            None => presented,
        }
    }

    /// Apply the policy and build the principal
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] of the first failing check.
    pub fn evaluate(&self, token: &str, claims: ClaimMap, now: u64) -> Result<Principal, Rejection> {
        let now_secs = now as f64;
        let expires_at = numeric_date(&claims, "exp")?.ok_or(Rejection::MissingClaim("exp"))?;
        if now_secs >= expires_at {
            return Err(Rejection::Expired);
        }

        if self.enforce_not_before
            && let Some(not_before) = numeric_date(&claims, "nbf")?
            && now_secs < not_before
        {
            return Err(Rejection::NotYetValid);
        }

        let audience_matches = match claims.get("aud") {
            Some(Value::String(aud)) => *aud == self.audience,
            Some(Value::Array(values)) => values
                .iter()
                .any(|v| v.as_str() == Some(self.audience.as_str())),
            _ => return Err(Rejection::MissingClaim("aud")),
        };
        if !audience_matches {
            return Err(Rejection::AudienceMismatch);
        }

        let issuer = claims
            .get("iss")
            .and_then(Value::as_str)
            .ok_or(Rejection::MissingClaim("iss"))?;
        if !self.issuers.iter().any(|allowed| allowed == issuer) {
            return Err(Rejection::IssuerNotAllowed(issuer.to_string()));
        }

        let scopes = self.presented_scopes(&claims);
        if !scopes.is_superset_of(&self.required_scopes) {
            return Err(Rejection::MissingScopes(
                scopes.missing_from(&self.required_scopes).to_string(),
            ));
        }

        // first whole second at which the token is expired
        Ok(Principal::new(token, scopes, expires_at.ceil() as u64, claims))
    }
}

/// Read a NumericDate claim, keeping fractional seconds
fn numeric_date(claims: &ClaimMap, name: &'static str) -> Result<Option<f64>, Rejection> {
    match claims.get(name) {
        None => Ok(None),
        Some(value) => value
            .as_f64()
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Some)
            .ok_or(Rejection::MissingClaim(name)),
    }
}
