//! Presented-versus-expected claim logging
//!
//! Decodes the presented token without verification and logs the claims that
//! drive the decision next to the configured expectations. Output is at
//! `debug` only and never feeds the verification decision.

use serde_json::Value;
use tracing::{Level, debug};

use super::policy::ClaimPolicy;
use crate::jwt::decode_unverified;

/// Expected values captured from a policy at construction time
#[derive(Debug, Clone)]
pub struct Diagnostics {
    expected_audience: String,
    expected_issuers: Vec<String>,
    required_scopes: String,
}

impl Diagnostics {
    /// Capture the expectations of a policy
    pub fn for_policy(policy: &ClaimPolicy) -> Self {
        Self {
            expected_audience: policy.audience().to_string(),
            expected_issuers: policy.issuers().to_vec(),
            required_scopes: policy.required_scopes().to_string(),
        }
    }

    /// Log the claims carried by `token`
    pub fn log_presented(&self, token: &str) {
        if !tracing::enabled!(Level::DEBUG) {
            return;
        }

        let claims = match decode_unverified(token) {
            Ok(claims) => claims,
            Err(reason) => {
                debug!(reason = %reason, "Presented token could not be decoded for diagnostics");
                return;
            }
        };

        let text = |name: &str| claims.get(name).map_or_else(|| "<absent>".to_string(), render);

        debug!(
            presented_iss = %text("iss"),
            expected_iss = ?self.expected_issuers,
            presented_aud = %text("aud"),
            expected_aud = %self.expected_audience,
            presented_scp = %text("scp"),
            required_scp = %self.required_scopes,
            presented_exp = %text("exp"),
            "Token claims presented"
        );
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
