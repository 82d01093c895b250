//! Common test utilities for gateway tests
//!
//! A `wiremock` stand-in for Microsoft Graph and its token endpoint, a router
//! built over the claims-only verifier, and helpers to drive it with
//! `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header as header_matcher, method, path},
};

use graphgate::config::{GRAPH_APP_ID, PROTECTED_RESOURCE_PATH};
use graphgate::{
    AppState, DownstreamClient, DownstreamCredentials, ProtectedResourceMetadata, ToolRunner,
    router,
};
use graphgate_auth::{
    ClaimPolicy, ClaimsOnlyVerifier, ClientCredentials, OnBehalfOfExchange, ScopeSet,
    SharedHttpClient,
};

pub const TENANT: &str = "contoso";
pub const ISSUER: &str = "https://sts.windows.net/contoso/";
pub const CLIENT_ID: &str = "11111111-2222-3333-4444-555555555555";
pub const BASE_URL: &str = "https://gateway.example.com";
pub const REQUIRED_SCOPES: &str = "User.Read Mail.Read";
pub const TOKEN_PATH: &str = "/token";

/// Absolute metadata URL advertised in challenges
pub fn resource_metadata_url() -> String {
    format!("{BASE_URL}{PROTECTED_RESOURCE_PATH}")
}

pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Graph-shaped claims accepted by the test gateway
pub fn graph_claims() -> Value {
    json!({
        "aud": GRAPH_APP_ID,
        "iss": ISSUER,
        "scp": REQUIRED_SCOPES,
        "exp": current_timestamp() + 3600,
        "appid": "client-app",
        "oid": "user-object-id",
    })
}

/// Token with a proof-of-possession header and an opaque signature
pub fn graph_token(claims: &Value) -> String {
    let header = json!({"typ": "JWT", "alg": "RS256", "nonce": "pop-nonce", "kid": "graph"});
    let encode = |value: &Value| URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap());
    format!("{}.{}.c2lnbmF0dXJl", encode(&header), encode(claims))
}

pub fn valid_token() -> String {
    graph_token(&graph_claims())
}

/// Mock downstream API and token endpoint
pub struct MockGraph {
    pub server: MockServer,
}

impl MockGraph {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// `GET /me` answered for the given bearer token
    pub async fn mock_profile(&self, token: &str, display_name: &str) {
        Mock::given(method("GET"))
            .and(path("/me"))
            .and(header_matcher("authorization", format!("Bearer {token}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "displayName": display_name,
                "mail": "adele@contoso.example",
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_junk_emails(&self, messages: Value) {
        Mock::given(method("GET"))
            .and(path("/me/mailFolders/junkemail/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": messages })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_status(&self, request_path: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(request_path))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "error": {"code": "ServiceUnavailable", "message": "try later"}
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_token_success(&self, access_token: &str) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "access_token": access_token,
                "expires_in": 3599,
                "scope": "https://graph.microsoft.com/User.Read https://graph.microsoft.com/Mail.Read",
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_token_error(&self, error: &str, description: &str) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": error,
                "error_description": description,
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn request_count(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == request_path)
            .count()
    }

    /// Credentials exchanging against this server's token endpoint
    pub fn on_behalf_of(&self, http: SharedHttpClient) -> DownstreamCredentials {
        DownstreamCredentials::OnBehalfOf {
            exchange: OnBehalfOfExchange::new(
                format!("{}{TOKEN_PATH}", self.uri()),
                ClientCredentials::new(CLIENT_ID, SecretString::new("secret".to_string())),
                http,
            ),
            scopes: ScopeSet::parse("https://graph.microsoft.com/.default"),
        }
    }
}

pub fn metadata() -> ProtectedResourceMetadata {
    ProtectedResourceMetadata {
        resource: BASE_URL.to_string(),
        authorization_servers: vec![format!("https://login.microsoftonline.com/{TENANT}/v2.0")],
        scopes_supported: ScopeSet::parse(REQUIRED_SCOPES).to_strings(),
        bearer_methods_supported: vec!["header".to_string()],
        resource_name: "graphgate".to_string(),
    }
}

/// Router with claims-only verification over `graph`
pub fn gateway(
    graph: &MockGraph,
    credentials: DownstreamCredentials,
    http: SharedHttpClient,
) -> Router {
    let policy = ClaimPolicy::new(GRAPH_APP_ID, [ISSUER], ScopeSet::parse(REQUIRED_SCOPES));
    let state = AppState::new(
        Arc::new(ClaimsOnlyVerifier::new(policy)),
        ToolRunner::new(DownstreamClient::new(graph.uri(), http), credentials),
        metadata(),
        resource_metadata_url(),
    );
    router(state)
}

pub fn pass_through_gateway(graph: &MockGraph) -> Router {
    gateway(graph, DownstreamCredentials::PassThrough, SharedHttpClient::default())
}

/// `POST /mcp` with an optional bearer token
pub fn rpc_request(token: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(body.into()).unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Send a JSON-RPC call and return the parsed response
pub async fn call(app: Router, token: &str, message: Value) -> Value {
    let response = send(app, rpc_request(Some(token), message.to_string())).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

pub fn tool_call(name: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/call",
        "params": {"name": name, "arguments": {}},
    })
}

pub fn initialize(protocol_version: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": "init",
        "method": "initialize",
        "params": {
            "protocolVersion": protocol_version,
            "capabilities": {},
            "clientInfo": {"name": "gateway-tests", "version": "1.0.0"},
        },
    })
}

/// Text of the first content block of a `tools/call` result
pub fn result_text(response: &Value) -> &str {
    response["result"]["content"][0]["text"].as_str().unwrap()
}
