//! Bearer authentication middleware
//!
//! Every request to a protected route must carry `Authorization: Bearer <token>`
//! accepted by the configured [`TokenVerifier`](graphgate_auth::TokenVerifier).
//! Failures answer `401` with a `WWW-Authenticate` challenge pointing at the
//! protected resource metadata (RFC 9728 section 5.1). On success the
//! [`Principal`](graphgate_auth::Principal) is placed in the request extensions.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::debug;

use super::AppState;

const BEARER_SCHEME: &str = "bearer";

/// Token from an `Authorization: Bearer` header
///
/// The scheme is matched case-insensitively. Returns `None` for a missing,
/// non-UTF-8, non-bearer or empty credential.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// `401 Unauthorized` with a bearer challenge
#[derive(Debug)]
pub struct AuthRejection {
    resource_metadata: String,
    description: &'static str,
}

impl AuthRejection {
    /// No usable bearer credential on the request
    pub fn missing_token(resource_metadata: &str) -> Self {
        Self {
            resource_metadata: resource_metadata.to_string(),
            description: "Valid bearer token required",
        }
    }

    /// The verifier refused the token
    pub fn invalid_token(resource_metadata: &str) -> Self {
        Self {
            resource_metadata: resource_metadata.to_string(),
            description: "Bearer token is invalid, expired or lacks required scopes",
        }
    }

    /// `WWW-Authenticate` header value
    pub fn challenge(&self) -> String {
        format!(
            "Bearer error=\"invalid_token\", resource_metadata=\"{}\"",
            self.resource_metadata
        )
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let body = json!({
            "error": "invalid_token",
            "error_description": self.description,
        });
        let mut response = (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response();

        if let Ok(value) = HeaderValue::from_str(&self.challenge()) {
            response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
        }

        response
    }
}

/// Verify the bearer token and attach the principal
pub async fn require_bearer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()).map(str::to_owned) else {
        debug!(path = %request.uri().path(), "Request without bearer token");
        return AuthRejection::missing_token(state.resource_metadata_url()).into_response();
    };

    match state.verifier().verify(&token).await {
        Some(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        None => AuthRejection::invalid_token(state.resource_metadata_url()).into_response(),
    }
}
