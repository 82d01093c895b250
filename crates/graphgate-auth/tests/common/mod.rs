//! Common test utilities for integration tests
//!
//! A `wiremock` identity provider (discovery, key set, token endpoint) and
//! RS256 tokens signed with the fixture keys.

#![allow(dead_code)]

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};
use std::time::{SystemTime, UNIX_EPOCH};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub const TENANT: &str = "contoso-tenant";
pub const CLIENT_ID: &str = "11111111-2222-3333-4444-555555555555";
pub const KEY_ID: &str = "test-key-1";
pub const ROTATED_KEY_ID: &str = "test-key-2";

/// Private key whose public half is published by the mock provider
pub const SIGNING_KEY_PEM: &[u8] = include_bytes!("../fixtures/signing_key.pem");

/// Private key the provider never published
pub const ROGUE_KEY_PEM: &[u8] = include_bytes!("../fixtures/rogue_key.pem");

const SIGNING_KEY_MODULUS: &str = "j4sm9K3sqQljZEUKnO8O5u3-nT3FJzFjM6wGaEK6iDEP3Mn1F5ECYCoZlXqnuGznVpijeIVWQGn6pucfWRxk39xn56TAFRQevgsXJB0IBh2QvzeOnVK7st946T9EZwe3uBexz1I23RswEeGmTx-Bxs8PgLrjonr_5bpVlmn5q2L1WoD6HttnyEza1bJ9sjxl9UMj8wghXPbWOvirGCMATfxnF7IzCvs0h8ckS_5mkRfxZYlF-Vmsj3gPzNopz_AluUTSAfQXMtAl9tQ8PlqtbuxoFlbhpFtT25NtW8E14uwX1GhmsY4drOZB535gNW5EfK_huySG-g0BfnypqZUPWw";

const ROGUE_KEY_MODULUS: &str = "1xT5OHEw1RQ6TGirGJin404HJ7lbTQZox9em1BctUemwbR2hYS7lWyiBXZenwMXuoJ_S5-JvS0dcCghpJ4kAdkjxhOolNuVWP5-P7xZeaQri9leiYSWGH7pi8Ln-aZj42GcttcU_8HXF8B8QOS7TKV_96n_-luNYf9w8Us7A_UI_sIlKj3soVZb2FObwdjKrYaMhk7Rfium4aEmPiAj2VKb8b9gDmmj7ivms1_srQ7Sp907UeVh2E_wWYAJHtqTGzxSZjS_5-9PhSQiiwMectx_HBmyJTsApOdBIFMc_2L7g7xID3gGag-Ng34QKfyMO8uv8kAVf8cY8nwm4QBY0dw";

/// Public JWK for the signing key under a key id
pub fn signing_jwk(kid: &str) -> Value {
    rsa_jwk(kid, SIGNING_KEY_MODULUS)
}

/// Public JWK for the rogue key under a key id
pub fn rogue_jwk(kid: &str) -> Value {
    rsa_jwk(kid, ROGUE_KEY_MODULUS)
}

fn rsa_jwk(kid: &str, modulus: &str) -> Value {
    json!({
        "kty": "RSA",
        "use": "sig",
        "alg": "RS256",
        "kid": kid,
        "n": modulus,
        "e": "AQAB",
    })
}

/// Mock identity provider
pub struct MockIdentityProvider {
    pub server: MockServer,
    pub authority: String,
    pub issuer: String,
    pub jwks_uri: String,
    pub token_endpoint: String,
}

impl MockIdentityProvider {
    /// Start a provider with no routes mounted
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let authority = server.uri();

        Self {
            issuer: format!("{authority}/{TENANT}/v2.0"),
            jwks_uri: format!("{authority}/jwks"),
            token_endpoint: format!("{authority}/token"),
            authority,
            server,
        }
    }

    /// Start a provider serving discovery and the signing key
    pub async fn start_with_keys() -> Self {
        let provider = Self::start().await;
        provider.mock_discovery().await;
        provider.mock_jwks(vec![signing_jwk(KEY_ID)]).await;
        provider
    }

    /// Discovery document location
    pub fn discovery_path() -> String {
        format!("/{TENANT}/v2.0/.well-known/openid-configuration")
    }

    /// Mock the tenant discovery document
    pub async fn mock_discovery(&self) {
        Mock::given(method("GET"))
            .and(path(Self::discovery_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": self.issuer,
                "jwks_uri": self.jwks_uri,
                "token_endpoint": self.token_endpoint,
                "authorization_endpoint": format!("{}/authorize", self.authority),
                "id_token_signing_alg_values_supported": ["RS256"],
                "tenant_region_scope": "EU",
            })))
            .mount(&self.server)
            .await;
    }

    /// Mock the discovery endpoint with a raw response
    pub async fn mock_discovery_response(&self, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(Self::discovery_path()))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Mock the key set endpoint
    pub async fn mock_jwks(&self, keys: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
            .mount(&self.server)
            .await;
    }

    /// Mock a successful on-behalf-of exchange
    pub async fn mock_token_success(&self, access_token: &str) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "access_token": access_token,
                "expires_in": 3599,
                "ext_expires_in": 3599,
                "scope": "https://graph.microsoft.com/User.Read https://graph.microsoft.com/Mail.Read",
            })))
            .mount(&self.server)
            .await;
    }

    /// Mock a token endpoint error response
    pub async fn mock_token_error(&self, error: &str, description: &str) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": error,
                "error_description": description,
                "error_codes": [50013],
            })))
            .mount(&self.server)
            .await;
    }

    /// Mock the token endpoint with a raw response
    pub async fn mock_token_response(&self, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Number of requests received on a path
    pub async fn request_count(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == request_path)
            .count()
    }
}

/// Claims of a token this provider would issue for the gateway
pub fn valid_claims(issuer: &str) -> Value {
    let now = current_timestamp();
    json!({
        "iss": issuer,
        "aud": CLIENT_ID,
        "scp": "access_as_user",
        "exp": now + 3600,
        "nbf": now - 60,
        "iat": now - 60,
        "appid": "99999999-aaaa-bbbb-cccc-dddddddddddd",
        "oid": "user-object-id",
        "sub": "user-subject",
    })
}

/// Sign claims with RS256 using a PEM private key
pub fn sign_token(claims: &Value, kid: Option<&str>, private_key: &[u8]) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(private_key).expect("fixture key parses");
    jsonwebtoken::encode(&header, claims, &key).expect("token encodes")
}

/// Sign claims with the published signing key
pub fn signed_token(claims: &Value) -> String {
    sign_token(claims, Some(KEY_ID), SIGNING_KEY_PEM)
}

/// Compact token with an arbitrary header and no valid signature
pub fn unsigned_token(header: &Value, claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header).unwrap());
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

/// Current Unix timestamp in seconds
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}
