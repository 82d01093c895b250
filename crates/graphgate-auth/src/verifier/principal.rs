//! Verified caller identity

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

use crate::jwt::ClaimMap;
use crate::scope::ScopeSet;

/// Client id reported when a token names neither `appid` nor `azp`
pub const UNKNOWN_CLIENT: &str = "unknown";

/// The caller established by a successful verification
///
/// Only a verifier can construct one, after every check passed. The scope set
/// already reflects the verifier's normalization setting.
#[derive(Clone)]
pub struct Principal {
    token: SecretString,
    client_id: String,
    subject: Option<String>,
    scopes: ScopeSet,
    expires_at: u64,
    claims: ClaimMap,
}

impl Principal {
    pub(crate) fn new(token: &str, scopes: ScopeSet, expires_at: u64, claims: ClaimMap) -> Self {
        let claim_str = |name: &str| claims.get(name).and_then(|v| v.as_str()).map(str::to_string);

        let client_id = claim_str("appid")
            .or_else(|| claim_str("azp"))
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());
        let subject = claim_str("oid").or_else(|| claim_str("sub"));

        Self {
            token: SecretString::new(token.to_string()),
            client_id,
            subject,
            scopes,
            expires_at,
            claims,
        }
    }

    /// The bearer token as presented
    pub fn token(&self) -> &str {
        self.token.expose_secret()
    }

    /// Calling application (`appid`, else `azp`, else `"unknown"`)
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// End user object id (`oid`, else `sub`)
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Granted scopes
    pub fn scopes(&self) -> &ScopeSet {
        &self.scopes
    }

    /// Expiry in seconds since the epoch
    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    /// Whether the token has expired at `now`
    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.expires_at
    }

    /// Every claim of the token
    pub fn claims(&self) -> &ClaimMap {
        &self.claims
    }

    /// A single claim
    pub fn claim(&self, name: &str) -> Option<&serde_json::Value> {
        self.claims.get(name)
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("token", &"[REDACTED]")
            .field("client_id", &self.client_id)
            .field("subject", &self.subject)
            .field("scopes", &self.scopes.to_strings())
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
